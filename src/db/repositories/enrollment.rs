//! Enrollment repository
//!
//! A single `enrollments` row links a user and a course. "Courses of a user"
//! and "students of a course" are both read from that row, so one insert or
//! delete updates both views at once.

use super::course::{row_to_course_mysql, row_to_course_sqlite, COURSE_COLUMNS};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Course, Enrollment};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Enrollment repository trait
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Insert the pair; a duplicate fails with a unique violation
    async fn enroll(&self, user_id: i64, course_id: i64) -> Result<Enrollment>;

    /// Remove the pair; false when it did not exist
    async fn unenroll(&self, user_id: i64, course_id: i64) -> Result<bool>;

    async fn is_enrolled(&self, user_id: i64, course_id: i64) -> Result<bool>;

    /// Courses the user is enrolled in, most recent enrollment first
    async fn courses_for_user(&self, user_id: i64) -> Result<Vec<Course>>;

    async fn course_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>>;

    /// External student IDs enrolled in the course
    async fn student_ids_for_course(&self, course_id: i64) -> Result<Vec<String>>;

    async fn count_for_course(&self, course_id: i64) -> Result<i64>;
}

/// SQLx-based enrollment repository implementation
pub struct SqlxEnrollmentRepository {
    pool: DynDatabasePool,
}

impl SqlxEnrollmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EnrollmentRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT: &str = "INSERT INTO enrollments (user_id, course_id, enrolled_at) VALUES (?, ?, ?)";
const DELETE: &str = "DELETE FROM enrollments WHERE user_id = ? AND course_id = ?";
const EXISTS: &str =
    "SELECT COUNT(*) AS count FROM enrollments WHERE user_id = ? AND course_id = ?";
const COURSE_IDS: &str =
    "SELECT course_id FROM enrollments WHERE user_id = ? ORDER BY enrolled_at DESC, course_id DESC";
const STUDENT_IDS: &str = r#"
    SELECT u.student_id
    FROM enrollments e JOIN users u ON u.id = e.user_id
    WHERE e.course_id = ?
    ORDER BY e.enrolled_at, u.id
"#;
const COUNT: &str = "SELECT COUNT(*) AS count FROM enrollments WHERE course_id = ?";

fn courses_for_user_sql() -> String {
    format!(
        "SELECT {} FROM enrollments e JOIN courses c ON c.id = e.course_id \
         WHERE e.user_id = ? ORDER BY e.enrolled_at DESC, c.id DESC",
        COURSE_COLUMNS
    )
}

#[async_trait]
impl EnrollmentRepository for SqlxEnrollmentRepository {
    async fn enroll(&self, user_id: i64, course_id: i64) -> Result<Enrollment> {
        let enrollment = Enrollment::new(user_id, course_id);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(INSERT)
                    .bind(enrollment.user_id)
                    .bind(enrollment.course_id)
                    .bind(enrollment.enrolled_at)
                    .execute(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to enroll")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(INSERT)
                    .bind(enrollment.user_id)
                    .bind(enrollment.course_id)
                    .bind(enrollment.enrolled_at)
                    .execute(self.pool.require_mysql()?)
                    .await
                    .context("Failed to enroll")?;
            }
        }
        Ok(enrollment)
    }

    async fn unenroll(&self, user_id: i64, course_id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(DELETE)
                    .bind(user_id)
                    .bind(course_id)
                    .execute(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to unenroll")?
                    .rows_affected()
            }
            DatabaseDriver::Mysql => {
                sqlx::query(DELETE)
                    .bind(user_id)
                    .bind(course_id)
                    .execute(self.pool.require_mysql()?)
                    .await
                    .context("Failed to unenroll")?
                    .rows_affected()
            }
        };
        Ok(affected > 0)
    }

    async fn is_enrolled(&self, user_id: i64, course_id: i64) -> Result<bool> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(EXISTS)
                    .bind(user_id)
                    .bind(course_id)
                    .fetch_one(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to check enrollment")?
                    .try_get("count")?
            }
            DatabaseDriver::Mysql => {
                sqlx::query(EXISTS)
                    .bind(user_id)
                    .bind(course_id)
                    .fetch_one(self.pool.require_mysql()?)
                    .await
                    .context("Failed to check enrollment")?
                    .try_get("count")?
            }
        };
        Ok(count > 0)
    }

    async fn courses_for_user(&self, user_id: i64) -> Result<Vec<Course>> {
        let sql = courses_for_user_sql();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to list enrolled courses")?;
                rows.iter().map(row_to_course_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(self.pool.require_mysql()?)
                    .await
                    .context("Failed to list enrolled courses")?;
                rows.iter().map(row_to_course_mysql).collect()
            }
        }
    }

    async fn course_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>> {
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(COURSE_IDS)
                    .bind(user_id)
                    .fetch_all(self.pool.require_sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(COURSE_IDS)
                    .bind(user_id)
                    .fetch_all(self.pool.require_mysql()?)
                    .await
            }
        };
        ids.context("Failed to list enrolled course IDs")
    }

    async fn student_ids_for_course(&self, course_id: i64) -> Result<Vec<String>> {
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, String>(STUDENT_IDS)
                    .bind(course_id)
                    .fetch_all(self.pool.require_sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, String>(STUDENT_IDS)
                    .bind(course_id)
                    .fetch_all(self.pool.require_mysql()?)
                    .await
            }
        };
        ids.context("Failed to list course roster")
    }

    async fn count_for_course(&self, course_id: i64) -> Result<i64> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(COUNT)
                    .bind(course_id)
                    .fetch_one(self.pool.require_sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(COUNT)
                    .bind(course_id)
                    .fetch_one(self.pool.require_mysql()?)
                    .await
            }
        };
        count.context("Failed to count enrollments")
    }
}
