//! Session repository
//!
//! Persistence for the session registry. Sessions are soft-expired: every
//! write here either creates a row, refreshes `last_activity_at`, or flips
//! `is_active` from 1 to 0. Nothing is deleted.
//!
//! This module provides:
//! - `SessionRepository` trait defining the interface for session data access
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID, active or not
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Find the active session issued for this token and user
    async fn find_active(&self, token_hash: &str, user_id: i64) -> Result<Option<Session>>;

    /// Record activity on an active session
    async fn touch_last_activity(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Deactivate one session; false when it was already inactive
    async fn mark_inactive(&self, id: &str) -> Result<bool>;

    /// Deactivate every active session past its absolute expiry or, when
    /// `idle_cutoff` is set, with no activity since the cutoff.
    async fn deactivate_stale(
        &self,
        now: DateTime<Utc>,
        idle_cutoff: Option<DateTime<Utc>>,
    ) -> Result<u64>;

    /// Deactivate a user's active sessions, optionally sparing one
    async fn deactivate_by_user(&self, user_id: i64, except: Option<&str>) -> Result<u64>;

    /// Number of sessions still flagged active
    async fn count_active(&self) -> Result<i64>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

// Both drivers accept the same SQL for sessions.
const INSERT_SESSION: &str = r#"
    INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at, last_activity_at, is_active)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;
const SELECT_BY_ID: &str = r#"
    SELECT id, user_id, token_hash, created_at, expires_at, last_activity_at, is_active
    FROM sessions
    WHERE id = ?
"#;
const SELECT_ACTIVE: &str = r#"
    SELECT id, user_id, token_hash, created_at, expires_at, last_activity_at, is_active
    FROM sessions
    WHERE token_hash = ? AND user_id = ? AND is_active = 1
"#;
const TOUCH: &str = "UPDATE sessions SET last_activity_at = ? WHERE id = ? AND is_active = 1";
const MARK_INACTIVE: &str = "UPDATE sessions SET is_active = 0 WHERE id = ? AND is_active = 1";
const DEACTIVATE_EXPIRED: &str =
    "UPDATE sessions SET is_active = 0 WHERE is_active = 1 AND expires_at < ?";
const DEACTIVATE_EXPIRED_OR_IDLE: &str = r#"
    UPDATE sessions SET is_active = 0
    WHERE is_active = 1 AND (expires_at < ? OR last_activity_at < ?)
"#;
const DEACTIVATE_BY_USER: &str =
    "UPDATE sessions SET is_active = 0 WHERE user_id = ? AND is_active = 1";
const DEACTIVATE_BY_USER_EXCEPT: &str =
    "UPDATE sessions SET is_active = 0 WHERE user_id = ? AND is_active = 1 AND id <> ?";
const COUNT_ACTIVE: &str = "SELECT COUNT(*) AS count FROM sessions WHERE is_active = 1";

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_session_sqlite(self.pool.require_sqlite()?, session).await
            }
            DatabaseDriver::Mysql => create_session_mysql(self.pool.require_mysql()?, session).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_session_by_id_sqlite(self.pool.require_sqlite()?, id).await
            }
            DatabaseDriver::Mysql => get_session_by_id_mysql(self.pool.require_mysql()?, id).await,
        }
    }

    async fn find_active(&self, token_hash: &str, user_id: i64) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_active_session_sqlite(self.pool.require_sqlite()?, token_hash, user_id).await
            }
            DatabaseDriver::Mysql => {
                find_active_session_mysql(self.pool.require_mysql()?, token_hash, user_id).await
            }
        }
    }

    async fn touch_last_activity(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(TOUCH)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.require_sqlite()?)
                    .await
                    .map(|r| r.rows_affected())
            }
            DatabaseDriver::Mysql => {
                sqlx::query(TOUCH)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.require_mysql()?)
                    .await
                    .map(|r| r.rows_affected())
            }
        };
        affected.context("Failed to update session activity")?;
        Ok(())
    }

    async fn mark_inactive(&self, id: &str) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(MARK_INACTIVE)
                    .bind(id)
                    .execute(self.pool.require_sqlite()?)
                    .await
                    .map(|r| r.rows_affected())
            }
            DatabaseDriver::Mysql => {
                sqlx::query(MARK_INACTIVE)
                    .bind(id)
                    .execute(self.pool.require_mysql()?)
                    .await
                    .map(|r| r.rows_affected())
            }
        };
        Ok(affected.context("Failed to deactivate session")? > 0)
    }

    async fn deactivate_stale(
        &self,
        now: DateTime<Utc>,
        idle_cutoff: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                deactivate_stale_sqlite(self.pool.require_sqlite()?, now, idle_cutoff).await
            }
            DatabaseDriver::Mysql => {
                deactivate_stale_mysql(self.pool.require_mysql()?, now, idle_cutoff).await
            }
        }
    }

    async fn deactivate_by_user(&self, user_id: i64, except: Option<&str>) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                deactivate_by_user_sqlite(self.pool.require_sqlite()?, user_id, except).await
            }
            DatabaseDriver::Mysql => {
                deactivate_by_user_mysql(self.pool.require_mysql()?, user_id, except).await
            }
        }
    }

    async fn count_active(&self) -> Result<i64> {
        let row = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(COUNT_ACTIVE)
                    .fetch_one(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to count active sessions")?;
                row.try_get::<i64, _>("count")
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(COUNT_ACTIVE)
                    .fetch_one(self.pool.require_mysql()?)
                    .await
                    .context("Failed to count active sessions")?;
                row.try_get::<i64, _>("count")
            }
        };
        Ok(row?)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.last_activity_at)
        .bind(session.is_active)
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(SELECT_BY_ID)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    row.as_ref().map(row_to_session_sqlite).transpose()
}

async fn find_active_session_sqlite(
    pool: &SqlitePool,
    token_hash: &str,
    user_id: i64,
) -> Result<Option<Session>> {
    let row = sqlx::query(SELECT_ACTIVE)
        .bind(token_hash)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up active session")?;

    row.as_ref().map(row_to_session_sqlite).transpose()
}

async fn deactivate_stale_sqlite(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    idle_cutoff: Option<DateTime<Utc>>,
) -> Result<u64> {
    let result = match idle_cutoff {
        Some(cutoff) => {
            sqlx::query(DEACTIVATE_EXPIRED_OR_IDLE)
                .bind(now)
                .bind(cutoff)
                .execute(pool)
                .await
        }
        None => sqlx::query(DEACTIVATE_EXPIRED).bind(now).execute(pool).await,
    }
    .context("Failed to deactivate stale sessions")?;

    Ok(result.rows_affected())
}

async fn deactivate_by_user_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    except: Option<&str>,
) -> Result<u64> {
    let result = match except {
        Some(keep) => {
            sqlx::query(DEACTIVATE_BY_USER_EXCEPT)
                .bind(user_id)
                .bind(keep)
                .execute(pool)
                .await
        }
        None => sqlx::query(DEACTIVATE_BY_USER).bind(user_id).execute(pool).await,
    }
    .context("Failed to deactivate user sessions")?;

    Ok(result.rows_affected())
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token_hash: row.try_get("token_hash")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        last_activity_at: row.try_get("last_activity_at")?,
        is_active: row.try_get("is_active")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.last_activity_at)
        .bind(session.is_active)
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(SELECT_BY_ID)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    row.as_ref().map(row_to_session_mysql).transpose()
}

async fn find_active_session_mysql(
    pool: &MySqlPool,
    token_hash: &str,
    user_id: i64,
) -> Result<Option<Session>> {
    let row = sqlx::query(SELECT_ACTIVE)
        .bind(token_hash)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up active session")?;

    row.as_ref().map(row_to_session_mysql).transpose()
}

async fn deactivate_stale_mysql(
    pool: &MySqlPool,
    now: DateTime<Utc>,
    idle_cutoff: Option<DateTime<Utc>>,
) -> Result<u64> {
    let result = match idle_cutoff {
        Some(cutoff) => {
            sqlx::query(DEACTIVATE_EXPIRED_OR_IDLE)
                .bind(now)
                .bind(cutoff)
                .execute(pool)
                .await
        }
        None => sqlx::query(DEACTIVATE_EXPIRED).bind(now).execute(pool).await,
    }
    .context("Failed to deactivate stale sessions")?;

    Ok(result.rows_affected())
}

async fn deactivate_by_user_mysql(
    pool: &MySqlPool,
    user_id: i64,
    except: Option<&str>,
) -> Result<u64> {
    let result = match except {
        Some(keep) => {
            sqlx::query(DEACTIVATE_BY_USER_EXCEPT)
                .bind(user_id)
                .bind(keep)
                .execute(pool)
                .await
        }
        None => sqlx::query(DEACTIVATE_BY_USER).bind(user_id).execute(pool).await,
    }
    .context("Failed to deactivate user sessions")?;

    Ok(result.rows_affected())
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token_hash: row.try_get("token_hash")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        last_activity_at: row.try_get("last_activity_at")?,
        is_active: row.try_get("is_active")?,
    })
}
