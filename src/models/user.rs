//! User model
//!
//! A registered student. Accounts are never hard-deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity representing a registered student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// External student identifier (unique), e.g. `STU17180000000001234`
    pub student_id: String,
    /// Display name
    pub name: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with the given parameters.
    ///
    /// Note: The password should already be hashed before calling this function.
    /// Use `services::password::hash_password()` to hash the password.
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            student_id: generate_student_id(now),
            name,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `STU` + creation time in milliseconds + four random digits.
///
/// The random suffix keeps two registrations in the same millisecond apart;
/// the column's unique constraint catches anything that still collides.
pub fn generate_student_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().as_u128() % 10_000;
    format!("STU{}{:04}", now.timestamp_millis(), suffix)
}

/// Input for updating a user's profile
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    /// New display name (optional)
    pub name: Option<String>,
    /// New email (optional)
    pub email: Option<String>,
}

impl UpdateProfileInput {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}
