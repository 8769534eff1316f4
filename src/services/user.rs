//! User service
//!
//! Implements the credential lifecycle of a student account:
//! - Registration with a generated external student id
//! - Login (opens a session) and logout (revokes it)
//! - Profile read and edit
//! - Password change, which signs out every other session of the user
//!
//! Plaintext passwords only ever live in the inputs; the store sees the
//! Argon2 hash.

use crate::db::is_unique_violation;
use crate::db::repositories::UserRepository;
use crate::models::{generate_student_id, Session, UpdateProfileInput, User};
use crate::services::password::{
    check_password_strength, hash_password, verify_dummy, verify_password,
};
use crate::services::session::SessionService;
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;

const STUDENT_ID_ATTEMPTS: usize = 5;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// A required field is missing or malformed
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Password rejected by the strength policy
    #[error("{0}")]
    WeakPassword(String),

    /// Another account already uses this email
    #[error("Email already registered")]
    DuplicateEmail,

    /// Unknown email or wrong password; the two are never distinguished
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("User not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    /// Signed token to hand to the client
    pub token: String,
    pub session: Session,
    /// Absolute lifetime of the new session
    pub session_duration: Duration,
}

/// User service for registration, login and account maintenance
pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionService>,
    min_password_length: usize,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<SessionService>,
        min_password_length: usize,
    ) -> Self {
        Self {
            users,
            sessions,
            min_password_length,
        }
    }

    /// Register a new student.
    ///
    /// # Arguments
    ///
    /// * `input` - Name, email and plaintext password
    ///
    /// # Returns
    ///
    /// The stored user, including its generated `student_id`.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if a field is empty or the email has no `@`
    /// - `WeakPassword` if the password is shorter than the configured minimum
    /// - `DuplicateEmail` if the email is taken, including a concurrent
    ///   registration that wins the race to the unique index
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let name = require_field(&input.name, "Name")?;
        let email = normalize_email(&input.email)?;
        check_password_strength(&input.password, self.min_password_length)
            .map_err(UserServiceError::WeakPassword)?;

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(UserServiceError::DuplicateEmail);
        }

        let password_hash = hash_password(&input.password)?;
        let mut user = User::new(name, email, password_hash);
        self.assign_free_student_id(&mut user).await?;

        let user = self.users.create(&user).await.map_err(|e| {
            if is_unique_violation(&e) {
                UserServiceError::DuplicateEmail
            } else {
                UserServiceError::InternalError(e)
            }
        })?;

        tracing::info!(user_id = user.id, student_id = %user.student_id, "Student registered");
        Ok(user)
    }

    /// Check credentials and open a new session.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` for an unknown email or a wrong password
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, UserServiceError> {
        let email = input.email.trim().to_lowercase();
        if email.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Email and password are required".to_string(),
            ));
        }

        let user = match self.users.get_by_email(&email).await? {
            Some(user) => user,
            None => {
                verify_dummy(&input.password);
                return Err(UserServiceError::InvalidCredentials);
            }
        };

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(UserServiceError::InvalidCredentials);
        }

        let issued = self.sessions.open(&user).await?;
        tracing::info!(user_id = user.id, session_id = %issued.session.id, "Student logged in");

        Ok(LoginOutcome {
            user,
            token: issued.token,
            session: issued.session,
            session_duration: self.sessions.policy().ttl,
        })
    }

    /// End the given session. Logging out twice is not an error.
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.sessions.revoke(session_id).await?;
        Ok(())
    }

    pub async fn profile(&self, user_id: i64) -> Result<User, UserServiceError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Change name and/or email.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if nothing to change or a provided field is invalid
    /// - `DuplicateEmail` if the new email belongs to another account
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        if input.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Nothing to update".to_string(),
            ));
        }

        let mut user = self.profile(user_id).await?;

        if let Some(name) = &input.name {
            user.name = require_field(name, "Name")?;
        }

        if let Some(email) = &input.email {
            let email = normalize_email(email)?;
            if email != user.email {
                if let Some(other) = self.users.get_by_email(&email).await? {
                    if other.id != user.id {
                        return Err(UserServiceError::DuplicateEmail);
                    }
                }
                user.email = email;
            }
        }

        user.updated_at = Utc::now();
        let user = self.users.update(&user).await.map_err(|e| {
            if is_unique_violation(&e) {
                UserServiceError::DuplicateEmail
            } else {
                UserServiceError::InternalError(e)
            }
        })?;

        Ok(user)
    }

    /// Replace the password after re-verifying the current one.
    ///
    /// The calling session stays signed in; every other active session of
    /// the user is revoked.
    ///
    /// # Errors
    ///
    /// - `IncorrectCurrentPassword` if `current` does not match
    /// - `WeakPassword` if `new` fails the strength policy
    pub async fn change_password(
        &self,
        user_id: i64,
        session_id: &str,
        current: &str,
        new: &str,
    ) -> Result<(), UserServiceError> {
        let mut user = self.profile(user_id).await?;

        if !verify_password(current, &user.password_hash)? {
            return Err(UserServiceError::IncorrectCurrentPassword);
        }
        check_password_strength(new, self.min_password_length)
            .map_err(UserServiceError::WeakPassword)?;

        user.password_hash = hash_password(new)?;
        user.updated_at = Utc::now();
        self.users
            .update(&user)
            .await
            .context("Failed to store new password hash")?;

        let revoked = self.sessions.revoke_others(user_id, session_id).await?;
        tracing::info!(user_id, revoked, "Password changed");
        Ok(())
    }
}

impl UserService {
    /// Re-roll `user.student_id` while it belongs to an existing account.
    async fn assign_free_student_id(&self, user: &mut User) -> Result<(), UserServiceError> {
        for _ in 0..STUDENT_ID_ATTEMPTS {
            if self.users.get_by_student_id(&user.student_id).await?.is_none() {
                return Ok(());
            }
            tracing::debug!(student_id = %user.student_id, "Student id taken, generating another");
            user.student_id = generate_student_id(Utc::now());
        }
        Err(UserServiceError::InternalError(anyhow::anyhow!(
            "Could not allocate a free student id"
        )))
    }
}

fn require_field(value: &str, field: &str) -> Result<String, UserServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(UserServiceError::ValidationError(format!(
            "{} is required",
            field
        )));
    }
    Ok(value.to_string())
}

fn normalize_email(email: &str) -> Result<String, UserServiceError> {
    let email = require_field(email, "Email")?.to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SessionRepository, SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::SessionPolicy;
    use crate::services::token::TokenCodec;

    struct Fixture {
        service: UserService,
        sessions: Arc<SessionService>,
        session_repo: Arc<dyn SessionRepository>,
    }

    async fn setup_test_service() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool);
        let sessions = Arc::new(SessionService::new(
            session_repo.clone(),
            users.clone(),
            TokenCodec::new("user-service-test-secret"),
            SessionPolicy {
                ttl: Duration::minutes(30),
                idle_timeout: Some(Duration::minutes(15)),
            },
        ));

        Fixture {
            service: UserService::new(users, sessions.clone(), 8),
            sessions,
            session_repo,
        }
    }

    async fn register_ada(service: &UserService) -> User {
        service
            .register(RegisterInput::new("Ada", "Ada@Example.com ", "correct-horse"))
            .await
            .expect("registration should succeed")
    }

    #[tokio::test]
    async fn test_register_normalizes_and_hashes() {
        let f = setup_test_service().await;
        let user = register_ada(&f.service).await;

        assert!(user.id > 0);
        assert_eq!(user.email, "ada@example.com");
        assert!(user.student_id.starts_with("STU"));
        assert_ne!(user.password_hash, "correct-horse");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_rerolls_taken_student_id() {
        let f = setup_test_service().await;
        let ada = register_ada(&f.service).await;

        let mut next = User::new("Bob".into(), "bob@example.com".into(), "hash".into());
        next.student_id = ada.student_id.clone();
        f.service.assign_free_student_id(&mut next).await.unwrap();

        assert_ne!(next.student_id, ada.student_id);
        assert!(next.student_id.starts_with("STU"));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let f = setup_test_service().await;

        let result = f
            .service
            .register(RegisterInput::new("  ", "a@b.c", "correct-horse"))
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));

        let result = f
            .service
            .register(RegisterInput::new("Ada", "not-an-email", "correct-horse"))
            .await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));

        let result = f
            .service
            .register(RegisterInput::new("Ada", "ada@example.com", "short"))
            .await;
        match result {
            Err(UserServiceError::WeakPassword(reason)) => {
                assert_eq!(reason, "Password must be at least 8 characters")
            }
            other => panic!("expected WeakPassword, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let f = setup_test_service().await;
        register_ada(&f.service).await;

        let result = f
            .service
            .register(RegisterInput::new("Other", "ADA@example.com", "another-pass"))
            .await;
        assert!(matches!(result, Err(UserServiceError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_login_roundtrip_embeds_identity() {
        let f = setup_test_service().await;
        let user = register_ada(&f.service).await;

        let outcome = f
            .service
            .login(LoginInput::new("ada@example.com", "correct-horse"))
            .await
            .expect("login should succeed");
        assert_eq!(outcome.user.id, user.id);
        assert_eq!(outcome.session_duration, Duration::minutes(30));

        let ctx = f
            .sessions
            .authenticate(Some(&outcome.token))
            .await
            .expect("token should authenticate");
        assert_eq!(ctx.user.student_id, user.student_id);
        assert_eq!(ctx.claims.sid, user.student_id);
        assert_eq!(ctx.session.id, outcome.session.id);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let f = setup_test_service().await;
        register_ada(&f.service).await;

        let wrong_password = f
            .service
            .login(LoginInput::new("ada@example.com", "wrong-password"))
            .await
            .unwrap_err();
        let unknown_email = f
            .service
            .login(LoginInput::new("nobody@example.com", "correct-horse"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, UserServiceError::InvalidCredentials));
        assert!(matches!(unknown_email, UserServiceError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_each_login_opens_distinct_session() {
        let f = setup_test_service().await;
        register_ada(&f.service).await;

        let a = f
            .service
            .login(LoginInput::new("ada@example.com", "correct-horse"))
            .await
            .unwrap();
        let b = f
            .service
            .login(LoginInput::new("ada@example.com", "correct-horse"))
            .await
            .unwrap();

        assert_ne!(a.token, b.token);
        assert_ne!(a.session.id, b.session.id);
        assert_eq!(f.session_repo.count_active().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_logout_is_final() {
        let f = setup_test_service().await;
        register_ada(&f.service).await;
        let outcome = f
            .service
            .login(LoginInput::new("ada@example.com", "correct-horse"))
            .await
            .unwrap();

        f.service.logout(&outcome.session.id).await.unwrap();
        f.service.logout(&outcome.session.id).await.unwrap();

        let result = f.sessions.authenticate(Some(&outcome.token)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let f = setup_test_service().await;
        let ada = register_ada(&f.service).await;
        f.service
            .register(RegisterInput::new("Bob", "bob@example.com", "bob-password"))
            .await
            .unwrap();

        let updated = f
            .service
            .update_profile(
                ada.id,
                UpdateProfileInput {
                    name: Some(" Ada Lovelace ".into()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ada Lovelace");
        assert_eq!(updated.email, "ada@example.com");

        let taken = f
            .service
            .update_profile(
                ada.id,
                UpdateProfileInput {
                    name: None,
                    email: Some("BOB@example.com".into()),
                },
            )
            .await;
        assert!(matches!(taken, Err(UserServiceError::DuplicateEmail)));

        let empty = f
            .service
            .update_profile(ada.id, UpdateProfileInput::default())
            .await;
        assert!(matches!(empty, Err(UserServiceError::ValidationError(_))));

        let missing = f
            .service
            .update_profile(
                9999,
                UpdateProfileInput {
                    name: Some("Ghost".into()),
                    email: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(UserServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_change_password_revokes_other_sessions() {
        let f = setup_test_service().await;
        let user = register_ada(&f.service).await;

        let current = f
            .service
            .login(LoginInput::new("ada@example.com", "correct-horse"))
            .await
            .unwrap();
        let other = f
            .service
            .login(LoginInput::new("ada@example.com", "correct-horse"))
            .await
            .unwrap();

        let wrong = f
            .service
            .change_password(user.id, &current.session.id, "nope", "new-password-1")
            .await;
        assert!(matches!(wrong, Err(UserServiceError::IncorrectCurrentPassword)));

        let weak = f
            .service
            .change_password(user.id, &current.session.id, "correct-horse", "short")
            .await;
        assert!(matches!(weak, Err(UserServiceError::WeakPassword(_))));

        f.service
            .change_password(user.id, &current.session.id, "correct-horse", "new-password-1")
            .await
            .unwrap();

        assert!(f.sessions.authenticate(Some(&current.token)).await.is_ok());
        assert!(f.sessions.authenticate(Some(&other.token)).await.is_err());

        let old = f
            .service
            .login(LoginInput::new("ada@example.com", "correct-horse"))
            .await;
        assert!(matches!(old, Err(UserServiceError::InvalidCredentials)));
        assert!(f
            .service
            .login(LoginInput::new("ada@example.com", "new-password-1"))
            .await
            .is_ok());
    }
}
