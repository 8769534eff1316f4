//! Database layer
//!
//! Storage for users, sessions, courses and enrollments. Two backends are
//! supported:
//! - SQLite (default, single-file deployment)
//! - MySQL
//!
//! The driver is selected from configuration. Application code only sees the
//! `DatabasePool` trait and the repository traits built on top of it.
//!
//! # Usage
//!
//! ```ignore
//! use student_portal::config::DatabaseConfig;
//! use student_portal::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_lazy_pool, create_pool, create_test_pool, is_unique_violation, DatabasePool,
    DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
