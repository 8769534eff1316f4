//! Course service
//!
//! Business logic for the shared course catalog and for enrollment.
//! Enrollment is a single junction row, so a student's course list and a
//! course's roster can never disagree.

use crate::db::is_unique_violation;
use crate::db::repositories::{CourseRepository, EnrollmentRepository};
use crate::models::{Course, CourseWithEnrollment, CreateCourseInput, UpdateCourseInput};
use std::sync::Arc;

/// Error types for course service operations
#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Course code already exists: {0}")]
    DuplicateCode(String),

    #[error("Course not found")]
    NotFound,

    /// Actor is not the course's creator
    #[error("Only the course creator can modify this course")]
    Forbidden,

    #[error("Course is not open for enrollment")]
    CourseInactive,

    #[error("Already enrolled in this course")]
    AlreadyEnrolled,

    #[error("Not enrolled in this course")]
    NotEnrolled,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Course service for catalog management and enrollment
pub struct CourseService {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl CourseService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            courses,
            enrollments,
        }
    }

    /// Add a course to the catalog on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if code or title is empty or credits are negative
    /// - `DuplicateCode` if another course already uses the code
    pub async fn create(
        &self,
        actor: i64,
        mut input: CreateCourseInput,
    ) -> Result<Course, CourseServiceError> {
        input.code = normalize_code(&input.code)?;
        input.title = input.title.trim().to_string();
        if input.title.is_empty() {
            return Err(CourseServiceError::ValidationError(
                "Title is required".to_string(),
            ));
        }
        validate_credits(input.credits)?;

        if self.courses.get_by_code(&input.code).await?.is_some() {
            return Err(CourseServiceError::DuplicateCode(input.code));
        }

        let code = input.code.clone();
        let course = Course::new(input, Some(actor));
        let course = self
            .courses
            .create(&course)
            .await
            .map_err(|e| duplicate_code_or_internal(e, &code))?;

        tracing::info!(course_id = course.id, code = %course.code, actor, "Course created");
        Ok(course)
    }

    /// Active catalog, newest first, with enrollment counts.
    pub async fn list_active(&self) -> Result<Vec<CourseWithEnrollment>, CourseServiceError> {
        Ok(self.courses.list_active().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Course, CourseServiceError> {
        self.courses
            .get_by_id(id)
            .await?
            .ok_or(CourseServiceError::NotFound)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the course does not exist
    /// - `Forbidden` if `actor` did not create it
    /// - `ValidationError` for an empty code/title or negative credits
    /// - `DuplicateCode` if the new code is taken
    pub async fn update(
        &self,
        actor: i64,
        id: i64,
        mut input: UpdateCourseInput,
    ) -> Result<Course, CourseServiceError> {
        let mut course = self.get(id).await?;
        if !course.is_owned_by(actor) {
            return Err(CourseServiceError::Forbidden);
        }

        if let Some(code) = input.code.take() {
            let code = normalize_code(&code)?;
            if code != course.code {
                if self.courses.get_by_code(&code).await?.is_some() {
                    return Err(CourseServiceError::DuplicateCode(code));
                }
                input.code = Some(code);
            }
        }
        if let Some(title) = input.title.as_mut() {
            *title = title.trim().to_string();
            if title.is_empty() {
                return Err(CourseServiceError::ValidationError(
                    "Title is required".to_string(),
                ));
            }
        }
        validate_credits(input.credits)?;

        course.apply(input);
        let code = course.code.clone();
        let course = self
            .courses
            .update(&course)
            .await
            .map_err(|e| duplicate_code_or_internal(e, &code))?;

        Ok(course)
    }

    /// Remove a course together with its enrollments.
    pub async fn delete(&self, actor: i64, id: i64) -> Result<(), CourseServiceError> {
        let course = self.get(id).await?;
        if !course.is_owned_by(actor) {
            return Err(CourseServiceError::Forbidden);
        }

        if !self.courses.delete(id).await? {
            return Err(CourseServiceError::NotFound);
        }

        tracing::info!(course_id = id, actor, "Course deleted");
        Ok(())
    }

    /// Enroll `user_id` in a course, returning the course.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the course does not exist
    /// - `CourseInactive` if it is closed for enrollment
    /// - `AlreadyEnrolled` if the pair already exists, including a concurrent
    ///   request that inserted it first
    pub async fn enroll(&self, user_id: i64, course_id: i64) -> Result<Course, CourseServiceError> {
        let course = self.get(course_id).await?;
        if !course.is_active {
            return Err(CourseServiceError::CourseInactive);
        }
        if self.enrollments.is_enrolled(user_id, course_id).await? {
            return Err(CourseServiceError::AlreadyEnrolled);
        }

        self.enrollments
            .enroll(user_id, course_id)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CourseServiceError::AlreadyEnrolled
                } else {
                    CourseServiceError::InternalError(e)
                }
            })?;

        tracing::debug!(user_id, course_id, "Enrolled");
        Ok(course)
    }

    pub async fn unenroll(&self, user_id: i64, course_id: i64) -> Result<(), CourseServiceError> {
        self.get(course_id).await?;
        if !self.enrollments.unenroll(user_id, course_id).await? {
            return Err(CourseServiceError::NotEnrolled);
        }
        tracing::debug!(user_id, course_id, "Unenrolled");
        Ok(())
    }

    /// Courses the user is enrolled in.
    pub async fn my_courses(&self, user_id: i64) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self.enrollments.courses_for_user(user_id).await?)
    }

    pub async fn enrolled_course_ids(&self, user_id: i64) -> Result<Vec<i64>, CourseServiceError> {
        Ok(self.enrollments.course_ids_for_user(user_id).await?)
    }

    /// Student ids enrolled in a course.
    pub async fn roster(&self, course_id: i64) -> Result<Vec<String>, CourseServiceError> {
        self.get(course_id).await?;
        Ok(self.enrollments.student_ids_for_course(course_id).await?)
    }
}

fn normalize_code(code: &str) -> Result<String, CourseServiceError> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(CourseServiceError::ValidationError(
            "Course code is required".to_string(),
        ));
    }
    Ok(code)
}

fn validate_credits(credits: Option<i32>) -> Result<(), CourseServiceError> {
    match credits {
        Some(c) if c < 0 => Err(CourseServiceError::ValidationError(
            "Credits cannot be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

fn duplicate_code_or_internal(e: anyhow::Error, code: &str) -> CourseServiceError {
    if is_unique_violation(&e) {
        CourseServiceError::DuplicateCode(code.to_string())
    } else {
        CourseServiceError::InternalError(e)
    }
}
