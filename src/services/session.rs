//! Session service
//!
//! Owns the session registry policy and the auth gate:
//! - `open` mints a token and records a new active session (login)
//! - `authenticate` runs on every protected request
//! - `revoke` / `revoke_others` end sessions early (logout, password change)
//! - `sweep_expired` bulk-deactivates stale sessions for the background sweeper
//!
//! Expiry is enforced lazily when a request presents a stale session, and
//! periodically by the sweeper for sessions nobody presents again.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Liveness, Session, SessionPolicy, User};
use crate::services::token::{hash_token, Claims, TokenCodec, TokenError};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Rejections produced by the auth gate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token was presented
    #[error("Authentication required")]
    Unauthenticated,

    /// Signature, structure or token expiry check failed
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Token verifies but no active session was issued for it
    #[error("Session not found")]
    SessionNotFound,

    /// Session passed its absolute expiry or idle window
    #[error("Session expired")]
    SessionExpired,

    /// Session is live but its user no longer exists
    #[error("User not found")]
    UserNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What a successful login hands back.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
    pub claims: Claims,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub session: Session,
    pub claims: Claims,
}

/// Remaining lifetime of a session, for the session-check endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub expires_at: DateTime<Utc>,
    pub remaining: Duration,
    pub idle_remaining: Option<Duration>,
}

pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    tokens: TokenCodec,
    policy: SessionPolicy,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserRepository>,
        tokens: TokenCodec,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            sessions,
            users,
            tokens,
            policy,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Start a new session for `user`.
    ///
    /// Every login creates a fresh token and session row; earlier sessions of
    /// the same user are left alone.
    pub async fn open(&self, user: &User) -> Result<IssuedSession> {
        let now = Utc::now();
        let expires_at = now + self.policy.ttl;
        let (token, claims) = self.tokens.sign(user, now, expires_at)?;

        let session = Session::new(user.id, hash_token(&token), now, &self.policy);
        let session = self.sessions.create(&session).await?;

        tracing::debug!(user_id = user.id, session_id = %session.id, "Session opened");

        Ok(IssuedSession {
            token,
            session,
            claims,
        })
    }

    /// Resolve a presented token to an authenticated identity.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if no token was presented
    /// - `InvalidToken` if the token fails verification
    /// - `SessionNotFound` if no active session exists for the token and user
    /// - `SessionExpired` if the session just expired; it is deactivated first
    /// - `UserNotFound` if the session's user is gone
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthContext, AuthError> {
        self.authenticate_at(token, Utc::now()).await
    }

    pub(crate) async fn authenticate_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthContext, AuthError> {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(AuthError::Unauthenticated),
        };

        let claims = self.tokens.verify(token).map_err(|e| {
            match &e {
                TokenError::Expired => tracing::debug!("Rejected expired token"),
                TokenError::Invalid(reason) => tracing::debug!(%reason, "Rejected invalid token"),
            }
            AuthError::InvalidToken
        })?;

        let mut session = self
            .sessions
            .find_active(&hash_token(token), claims.sub)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        match session.liveness(now, &self.policy) {
            Liveness::Live => {}
            Liveness::Expired(reason) => {
                self.sessions.mark_inactive(&session.id).await?;
                tracing::info!(
                    user_id = session.user_id,
                    session_id = %session.id,
                    ?reason,
                    "Session expired"
                );
                return Err(AuthError::SessionExpired);
            }
            Liveness::Inactive => return Err(AuthError::SessionNotFound),
        }

        self.sessions.touch_last_activity(&session.id, now).await?;
        session.last_activity_at = now;

        let user = self
            .users
            .get_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(AuthContext {
            user,
            session,
            claims,
        })
    }

    /// End a session (logout). Returns false if it was already inactive.
    pub async fn revoke(&self, session_id: &str) -> Result<bool> {
        let revoked = self.sessions.mark_inactive(session_id).await?;
        if revoked {
            tracing::debug!(session_id, "Session revoked");
        }
        Ok(revoked)
    }

    /// End all of a user's sessions except `keep`.
    pub async fn revoke_others(&self, user_id: i64, keep: &str) -> Result<u64> {
        self.sessions.deactivate_by_user(user_id, Some(keep)).await
    }

    /// Deactivate every session past its absolute expiry or idle window.
    ///
    /// Safe to run repeatedly and concurrently with requests: only rows still
    /// active are touched, so a second pass finds nothing.
    pub async fn sweep_expired(&self) -> Result<u64> {
        self.sweep_expired_at(Utc::now()).await
    }

    pub(crate) async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<u64> {
        self.sessions
            .deactivate_stale(now, self.policy.idle_cutoff(now))
            .await
    }

    /// Number of sessions still marked active.
    pub async fn active_count(&self) -> Result<i64> {
        self.sessions.count_active().await
    }

    /// Remaining time on an authenticated session.
    pub fn status(&self, session: &Session) -> SessionStatus {
        let now = Utc::now();
        SessionStatus {
            expires_at: session.expires_at,
            remaining: session.remaining(now),
            idle_remaining: session.idle_remaining(now, &self.policy),
        }
    }
}
