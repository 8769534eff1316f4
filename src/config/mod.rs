//! Configuration management
//!
//! This module handles loading and parsing configuration for the student portal.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Secret used when nothing is configured. Startup warns when it is still in use.
pub const DEFAULT_JWT_SECRET: &str = "change-this-secret";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication and session policy
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the browser client sends credentials)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Mark the auth cookie `Secure` (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            secure_cookies: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/student-portal.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing session tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Absolute session lifetime, also the token validity
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u64,
    /// Inactivity window; `0` disables the idle timeout
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u64,
    /// How often the background sweeper runs
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    /// Minimum accepted password length
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            session_ttl_minutes: default_session_ttl_minutes(),
            idle_timeout_minutes: default_idle_timeout_minutes(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            min_password_length: default_min_password_length(),
        }
    }
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_session_ttl_minutes() -> u64 {
    30
}

fn default_idle_timeout_minutes() -> u64 {
    15
}

fn default_sweep_interval_seconds() -> u64 {
    60
}

fn default_min_password_length() -> usize {
    8
}

impl AuthConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_minutes * 60)
    }

    /// `None` when idle expiry is disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// True while the built-in signing secret is in use.
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - PORTAL_SERVER_HOST
    /// - PORTAL_SERVER_PORT
    /// - PORTAL_SERVER_CORS_ORIGIN
    /// - PORTAL_SERVER_SECURE_COOKIES
    /// - PORTAL_DATABASE_DRIVER
    /// - PORTAL_DATABASE_URL
    /// - PORTAL_AUTH_JWT_SECRET
    /// - PORTAL_AUTH_SESSION_TTL_MINUTES
    /// - PORTAL_AUTH_IDLE_TIMEOUT_MINUTES
    /// - PORTAL_AUTH_SWEEP_INTERVAL_SECONDS
    /// - PORTAL_AUTH_MIN_PASSWORD_LENGTH
    ///
    /// Values that fail to parse are ignored.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the session machinery cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.session_ttl_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_ttl_minutes must be greater than 0".to_string(),
            ));
        }
        if self.auth.sweep_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "auth.sweep_interval_seconds must be greater than 0".to_string(),
            ));
        }
        if self.auth.min_password_length == 0 {
            return Err(ConfigError::ValidationError(
                "auth.min_password_length must be at least 1".to_string(),
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("PORTAL_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("PORTAL_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(cors_origin) = std::env::var("PORTAL_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Some(secure) = env_parse::<bool>("PORTAL_SERVER_SECURE_COOKIES") {
            self.server.secure_cookies = secure;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("PORTAL_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("PORTAL_DATABASE_URL") {
            self.database.url = url;
        }

        // Auth configuration
        if let Ok(secret) = std::env::var("PORTAL_AUTH_JWT_SECRET") {
            if !secret.is_empty() {
                self.auth.jwt_secret = secret;
            }
        }
        if let Some(ttl) = env_parse::<u64>("PORTAL_AUTH_SESSION_TTL_MINUTES") {
            self.auth.session_ttl_minutes = ttl;
        }
        if let Some(idle) = env_parse::<u64>("PORTAL_AUTH_IDLE_TIMEOUT_MINUTES") {
            self.auth.idle_timeout_minutes = idle;
        }
        if let Some(interval) = env_parse::<u64>("PORTAL_AUTH_SWEEP_INTERVAL_SECONDS") {
            self.auth.sweep_interval_seconds = interval;
        }
        if let Some(len) = env_parse::<usize>("PORTAL_AUTH_MIN_PASSWORD_LENGTH") {
            self.auth.min_password_length = len;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by both test modules; they mutate process-wide environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ALL_ENV_KEYS: &[&str] = &[
    "PORTAL_SERVER_HOST",
    "PORTAL_SERVER_PORT",
    "PORTAL_SERVER_CORS_ORIGIN",
    "PORTAL_SERVER_SECURE_COOKIES",
    "PORTAL_DATABASE_DRIVER",
    "PORTAL_DATABASE_URL",
    "PORTAL_AUTH_JWT_SECRET",
    "PORTAL_AUTH_SESSION_TTL_MINUTES",
    "PORTAL_AUTH_IDLE_TIMEOUT_MINUTES",
    "PORTAL_AUTH_SWEEP_INTERVAL_SECONDS",
    "PORTAL_AUTH_MIN_PASSWORD_LENGTH",
];

#[cfg(test)]
fn clear_env() {
    for key in ALL_ENV_KEYS {
        std::env::remove_var(key);
    }
}


/// Property-based tests for configuration parsing
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn valid_host_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..=255, 0u8..=255, 0u8..=255, 0u8..=255)
                .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d)),
            Just("localhost".to_string()),
            Just("0.0.0.0".to_string()),
            "[a-z][a-z0-9]{0,10}".prop_map(|s| s),
        ]
    }

    fn valid_database_config_strategy() -> impl Strategy<Value = DatabaseConfig> {
        prop_oneof![
            "[a-z][a-z0-9_/]{0,20}\\.db".prop_map(|url| DatabaseConfig {
                driver: DatabaseDriver::Sqlite,
                url,
            }),
            Just(DatabaseConfig {
                driver: DatabaseDriver::Mysql,
                url: "mysql://root@127.0.0.1:3306/portal".to_string(),
            }),
        ]
    }

    fn valid_auth_config_strategy() -> impl Strategy<Value = AuthConfig> {
        (
            "[A-Za-z0-9]{16,48}",
            1u64..=24 * 60,
            0u64..=120,
            1u64..=3600,
            1usize..=64,
        )
            .prop_map(|(secret, ttl, idle, sweep, min_len)| AuthConfig {
                jwt_secret: secret,
                session_ttl_minutes: ttl,
                idle_timeout_minutes: idle,
                sweep_interval_seconds: sweep,
                min_password_length: min_len,
            })
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            valid_host_strategy(),
            1u16..=65535,
            any::<bool>(),
            valid_database_config_strategy(),
            valid_auth_config_strategy(),
        )
            .prop_map(|(host, port, secure_cookies, database, auth)| Config {
                server: ServerConfig {
                    host,
                    port,
                    cors_origin: default_cors_origin(),
                    secure_cookies,
                },
                database,
                auth,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing any valid config to YAML and loading it back preserves every field.
        #[test]
        fn config_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.server.secure_cookies, parsed.server.secure_cookies);
            prop_assert_eq!(config.database.driver, parsed.database.driver);
            prop_assert_eq!(config.database.url, parsed.database.url);
            prop_assert_eq!(config.auth.jwt_secret, parsed.auth.jwt_secret);
            prop_assert_eq!(config.auth.session_ttl_minutes, parsed.auth.session_ttl_minutes);
            prop_assert_eq!(config.auth.idle_timeout_minutes, parsed.auth.idle_timeout_minutes);
            prop_assert_eq!(config.auth.sweep_interval_seconds, parsed.auth.sweep_interval_seconds);
            prop_assert_eq!(config.auth.min_password_length, parsed.auth.min_password_length);
        }

        /// Any positive TTL from the environment wins over the file value.
        #[test]
        fn env_ttl_takes_precedence(file_ttl in 1u64..500, env_ttl in 1u64..500) {
            let _guard = lock_env();
            clear_env();

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "auth:\n  session_ttl_minutes: {}\n", file_ttl).expect("Failed to write config");
            std::env::set_var("PORTAL_AUTH_SESSION_TTL_MINUTES", env_ttl.to_string());

            let config = Config::load_with_env(file.path());
            clear_env();

            let config = config.expect("Failed to load config");
            prop_assert_eq!(config.auth.session_ttl_minutes, env_ttl);
        }
    }
}
