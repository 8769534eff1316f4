//! Enrollment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A student's membership in a course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enrollment {
    pub user_id: i64,
    pub course_id: i64,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(user_id: i64, course_id: i64) -> Self {
        Self {
            user_id,
            course_id,
            enrolled_at: Utc::now(),
        }
    }
}
