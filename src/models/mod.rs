//! Data models
//!
//! This module contains the data structures shared by the repositories,
//! services and HTTP layer:
//! - Database entities (User, Session, Course, Enrollment)
//! - Input types passed from handlers to services

mod course;
mod enrollment;
mod session;
mod user;

pub use course::{Course, CourseLevel, CourseWithEnrollment, CreateCourseInput, UpdateCourseInput};
pub use enrollment::Enrollment;
pub use session::{ExpiryReason, Liveness, Session, SessionPolicy};
pub use user::{generate_student_id, UpdateProfileInput, User};
