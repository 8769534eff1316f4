//! Session model
//!
//! A session is the server-side half of a login. The signed token proves who
//! issued it; the session row decides whether it may still be used. Rows only
//! ever move from active to inactive and are kept for audit.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session entity for user authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: String,
    /// Associated user ID
    pub user_id: i64,
    /// SHA-256 hex digest of the issued token
    #[serde(skip_serializing)]
    pub token_hash: String,
    /// Creation timestamp (login time)
    pub created_at: DateTime<Utc>,
    /// Absolute expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Last authenticated request
    pub last_activity_at: DateTime<Utc>,
    /// False once logged out or expired
    pub is_active: bool,
}

/// Expiry rules applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Absolute lifetime measured from login
    pub ttl: Duration,
    /// Maximum gap between authenticated requests; `None` disables it
    pub idle_timeout: Option<Duration>,
}

impl SessionPolicy {
    pub fn new(ttl: std::time::Duration, idle_timeout: Option<std::time::Duration>) -> Self {
        Self {
            ttl: to_chrono(ttl),
            idle_timeout: idle_timeout.map(to_chrono),
        }
    }

    /// Sessions whose last activity is before this instant are idle-expired.
    pub fn idle_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.idle_timeout.map(|idle| now - idle)
    }
}

fn to_chrono(d: std::time::Duration) -> Duration {
    Duration::from_std(d).unwrap_or_else(|_| Duration::days(36_500))
}

/// Why a session stopped being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// Past `expires_at`
    Absolute,
    /// No activity within the idle window
    Idle,
}

/// Result of checking a session against the policy at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Live,
    Expired(ExpiryReason),
    Inactive,
}

impl Session {
    /// Build a fresh active session starting at `now`.
    pub fn new(user_id: i64, token_hash: String, now: DateTime<Utc>, policy: &SessionPolicy) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_id,
            token_hash,
            created_at: now,
            expires_at: now + policy.ttl,
            last_activity_at: now,
            is_active: true,
        }
    }

    /// Usable iff active, not past the absolute expiry and not idle too long.
    pub fn liveness(&self, now: DateTime<Utc>, policy: &SessionPolicy) -> Liveness {
        if !self.is_active {
            return Liveness::Inactive;
        }
        if now > self.expires_at {
            return Liveness::Expired(ExpiryReason::Absolute);
        }
        if let Some(idle) = policy.idle_timeout {
            if now - self.last_activity_at > idle {
                return Liveness::Expired(ExpiryReason::Idle);
            }
        }
        Liveness::Live
    }

    /// Time left before the absolute expiry, zero once passed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    /// Time left in the idle window, `None` when idle expiry is disabled.
    pub fn idle_remaining(&self, now: DateTime<Utc>, policy: &SessionPolicy) -> Option<Duration> {
        policy
            .idle_timeout
            .map(|idle| (self.last_activity_at + idle - now).max(Duration::zero()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(ttl_minutes: u64, idle_minutes: Option<u64>) -> SessionPolicy {
        SessionPolicy::new(
            std::time::Duration::from_secs(ttl_minutes * 60),
            idle_minutes.map(|m| std::time::Duration::from_secs(m * 60)),
        )
    }

    #[test]
    fn test_new_session_is_live() {
        let now = Utc::now();
        let policy = policy(30, Some(5));
        let session = Session::new(1, "hash".into(), now, &policy);

        assert!(session.is_active);
        assert_eq!(session.expires_at, now + Duration::minutes(30));
        assert_eq!(session.last_activity_at, now);
        assert_eq!(session.liveness(now, &policy), Liveness::Live);
        assert_eq!(session.id.len(), 32);
    }

    #[test]
    fn test_idle_timeout_expires_session() {
        let now = Utc::now();
        let policy = policy(30, Some(5));
        let mut session = Session::new(1, "hash".into(), now - Duration::minutes(10), &policy);
        session.last_activity_at = now - Duration::minutes(6);

        assert_eq!(
            session.liveness(now, &policy),
            Liveness::Expired(ExpiryReason::Idle)
        );
    }

    #[test]
    fn test_absolute_expiry_wins_over_recent_activity() {
        let now = Utc::now();
        let policy = policy(30, Some(5));
        let mut session = Session::new(1, "hash".into(), now - Duration::minutes(31), &policy);
        session.last_activity_at = now - Duration::seconds(10);

        assert_eq!(
            session.liveness(now, &policy),
            Liveness::Expired(ExpiryReason::Absolute)
        );
    }

    #[test]
    fn test_disabled_idle_timeout() {
        let now = Utc::now();
        let policy = policy(30, None);
        let mut session = Session::new(1, "hash".into(), now - Duration::minutes(20), &policy);
        session.last_activity_at = now - Duration::minutes(20);

        assert_eq!(session.liveness(now, &policy), Liveness::Live);
        assert_eq!(session.idle_remaining(now, &policy), None);
        assert_eq!(policy.idle_cutoff(now), None);
    }

    #[test]
    fn test_inactive_session() {
        let now = Utc::now();
        let policy = policy(30, Some(5));
        let mut session = Session::new(1, "hash".into(), now, &policy);
        session.is_active = false;

        assert_eq!(session.liveness(now, &policy), Liveness::Inactive);
    }

    #[test]
    fn test_remaining_clamps_at_zero() {
        let now = Utc::now();
        let policy = policy(30, Some(5));
        let session = Session::new(1, "hash".into(), now - Duration::hours(2), &policy);

        assert_eq!(session.remaining(now), Duration::zero());
        assert_eq!(session.idle_remaining(now, &policy), Some(Duration::zero()));
    }

    proptest! {
        /// Inside both windows the session is live; one second past either it is not.
        #[test]
        fn liveness_matches_windows(ttl in 1i64..240, idle in 1i64..60, age in 0i64..300, quiet in 0i64..120) {
            let now = Utc::now();
            let policy = SessionPolicy {
                ttl: Duration::minutes(ttl),
                idle_timeout: Some(Duration::minutes(idle)),
            };
            let mut session = Session::new(7, "h".into(), now - Duration::minutes(age), &policy);
            session.last_activity_at = now - Duration::minutes(quiet);

            let expected = if age > ttl {
                Liveness::Expired(ExpiryReason::Absolute)
            } else if quiet > idle {
                Liveness::Expired(ExpiryReason::Idle)
            } else {
                Liveness::Live
            };
            prop_assert_eq!(session.liveness(now, &policy), expected);
        }
    }
}
