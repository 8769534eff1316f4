//! Course repository
//!
//! Database operations for the course catalog.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Course, CourseLevel, CourseWithEnrollment};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Course repository trait
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Insert a course; fails on a duplicate code
    async fn create(&self, course: &Course) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn get_by_code(&self, code: &str) -> Result<Option<Course>>;

    /// Active courses, newest first, with their enrollment counts
    async fn list_active(&self) -> Result<Vec<CourseWithEnrollment>>;

    async fn update(&self, course: &Course) -> Result<Course>;

    /// Delete a course and, through the foreign key, its enrollments
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based course repository implementation
pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

pub(super) const COURSE_COLUMNS: &str = "c.id, c.code, c.title, c.description, c.level, c.semester, c.credits, \
     c.instructor, c.schedule, c.is_active, c.created_by, c.created_at, c.updated_at";

const INSERT_COURSE: &str = r#"
    INSERT INTO courses (code, title, description, level, semester, credits, instructor,
                         schedule, is_active, created_by, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_COURSE: &str = r#"
    UPDATE courses
    SET code = ?, title = ?, description = ?, level = ?, semester = ?, credits = ?,
        instructor = ?, schedule = ?, is_active = ?, updated_at = ?
    WHERE id = ?
"#;

fn select_one(filter: &str) -> String {
    format!("SELECT {} FROM courses c WHERE {}", COURSE_COLUMNS, filter)
}

fn select_active_with_counts() -> String {
    format!(
        "SELECT {}, COUNT(e.user_id) AS enrolled_count \
         FROM courses c LEFT JOIN enrollments e ON e.course_id = c.id \
         WHERE c.is_active = 1 \
         GROUP BY {} \
         ORDER BY c.created_at DESC, c.id DESC",
        COURSE_COLUMNS, COURSE_COLUMNS
    )
}

/// Bind the editable columns shared by insert and update, in table order.
macro_rules! bind_course {
    ($query:expr, $course:expr) => {
        $query
            .bind(&$course.code)
            .bind(&$course.title)
            .bind(&$course.description)
            .bind($course.level.to_string())
            .bind(&$course.semester)
            .bind($course.credits)
            .bind(&$course.instructor)
            .bind(&$course.schedule)
            .bind($course.is_active)
    };
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &Course) -> Result<Course> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let result = bind_course!(sqlx::query(INSERT_COURSE), course)
                    .bind(course.created_by)
                    .bind(course.created_at)
                    .bind(course.updated_at)
                    .execute(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to create course")?;
                result.last_insert_rowid()
            }
            DatabaseDriver::Mysql => {
                let result = bind_course!(sqlx::query(INSERT_COURSE), course)
                    .bind(course.created_by)
                    .bind(course.created_at)
                    .bind(course.updated_at)
                    .execute(self.pool.require_mysql()?)
                    .await
                    .context("Failed to create course")?;
                result.last_insert_id() as i64
            }
        };

        Ok(Course {
            id,
            ..course.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let sql = select_one("c.id = ?");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to get course by ID")?;
                row.as_ref().map(row_to_course_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.require_mysql()?)
                    .await
                    .context("Failed to get course by ID")?;
                row.as_ref().map(row_to_course_mysql).transpose()
            }
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Course>> {
        let sql = select_one("c.code = ?");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(code)
                    .fetch_optional(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to get course by code")?;
                row.as_ref().map(row_to_course_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(code)
                    .fetch_optional(self.pool.require_mysql()?)
                    .await
                    .context("Failed to get course by code")?;
                row.as_ref().map(row_to_course_mysql).transpose()
            }
        }
    }

    async fn list_active(&self) -> Result<Vec<CourseWithEnrollment>> {
        let sql = select_active_with_counts();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to list courses")?;
                rows.iter()
                    .map(|row| -> Result<CourseWithEnrollment> {
                        Ok(CourseWithEnrollment {
                            course: row_to_course_sqlite(row)?,
                            enrolled_count: row.try_get("enrolled_count")?,
                        })
                    })
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.require_mysql()?)
                    .await
                    .context("Failed to list courses")?;
                rows.iter()
                    .map(|row| -> Result<CourseWithEnrollment> {
                        Ok(CourseWithEnrollment {
                            course: row_to_course_mysql(row)?,
                            enrolled_count: row.try_get("enrolled_count")?,
                        })
                    })
                    .collect()
            }
        }
    }

    async fn update(&self, course: &Course) -> Result<Course> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                bind_course!(sqlx::query(UPDATE_COURSE), course)
                    .bind(course.updated_at)
                    .bind(course.id)
                    .execute(self.pool.require_sqlite()?)
                    .await
                    .context("Failed to update course")?;
            }
            DatabaseDriver::Mysql => {
                bind_course!(sqlx::query(UPDATE_COURSE), course)
                    .bind(course.updated_at)
                    .bind(course.id)
                    .execute(self.pool.require_mysql()?)
                    .await
                    .context("Failed to update course")?;
            }
        }
        Ok(course.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_course_sqlite(self.pool.require_sqlite()?, id).await?,
            DatabaseDriver::Mysql => delete_course_mysql(self.pool.require_mysql()?, id).await?,
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn delete_course_sqlite(pool: &SqlitePool, id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete course")?;
    Ok(result.rows_affected())
}

pub(super) fn row_to_course_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Course> {
    let level: String = row.try_get("level")?;
    Ok(Course {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        level: CourseLevel::from_str(&level)
            .with_context(|| format!("Invalid course level in database: {}", level))?,
        semester: row.try_get("semester")?,
        credits: row.try_get("credits")?,
        instructor: row.try_get("instructor")?,
        schedule: row.try_get("schedule")?,
        is_active: row.try_get("is_active")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn delete_course_mysql(pool: &MySqlPool, id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete course")?;
    Ok(result.rows_affected())
}

pub(super) fn row_to_course_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Course> {
    let level: String = row.try_get("level")?;
    Ok(Course {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        level: CourseLevel::from_str(&level)
            .with_context(|| format!("Invalid course level in database: {}", level))?,
        semester: row.try_get("semester")?,
        credits: row.try_get("credits")?,
        instructor: row.try_get("instructor")?,
        schedule: row.try_get("schedule")?,
        is_active: row.try_get("is_active")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
