//! Course model
//!
//! Courses make up the shared catalog that students enroll in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Course entity in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    /// Unique identifier
    pub id: i64,
    /// Course code (unique, upper-case), e.g. `CS101`
    pub code: String,
    /// Course title
    pub title: String,
    /// Course description
    pub description: String,
    /// Difficulty level
    pub level: CourseLevel,
    /// Semester label, e.g. `Fall 2024`
    pub semester: Option<String>,
    /// Credit hours
    pub credits: i32,
    /// Instructor name
    pub instructor: String,
    /// Free-form schedule, e.g. `Mon/Wed 10:00`
    pub schedule: String,
    /// Whether the course accepts enrollments
    pub is_active: bool,
    /// User who created the course (None once that user is gone)
    pub created_by: Option<i64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Build a new active course from validated input.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new(input: CreateCourseInput, created_by: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            code: input.code,
            title: input.title,
            description: input.description.unwrap_or_default(),
            level: input.level.unwrap_or_default(),
            semester: input.semester,
            credits: input.credits.unwrap_or(0),
            instructor: input.instructor.unwrap_or_default(),
            schedule: input.schedule.unwrap_or_default(),
            is_active: true,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Only the creator may edit or delete a course.
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.created_by == Some(user_id)
    }

    /// Apply the fields present in `input`.
    pub fn apply(&mut self, input: UpdateCourseInput) {
        if let Some(code) = input.code {
            self.code = code;
        }
        if let Some(title) = input.title {
            self.title = title;
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(level) = input.level {
            self.level = level;
        }
        if let Some(semester) = input.semester {
            self.semester = Some(semester);
        }
        if let Some(credits) = input.credits {
            self.credits = credits;
        }
        if let Some(instructor) = input.instructor {
            self.instructor = instructor;
        }
        if let Some(schedule) = input.schedule {
            self.schedule = schedule;
        }
        if let Some(is_active) = input.is_active {
            self.is_active = is_active;
        }
        self.updated_at = Utc::now();
    }
}

/// Course difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for CourseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseLevel::Beginner => write!(f, "Beginner"),
            CourseLevel::Intermediate => write!(f, "Intermediate"),
            CourseLevel::Advanced => write!(f, "Advanced"),
        }
    }
}

impl FromStr for CourseLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "beginner" => Ok(CourseLevel::Beginner),
            "intermediate" => Ok(CourseLevel::Intermediate),
            "advanced" => Ok(CourseLevel::Advanced),
            _ => Err(anyhow::anyhow!("Invalid course level: {}", s)),
        }
    }
}

/// Input for creating a course
#[derive(Debug, Clone, Default)]
pub struct CreateCourseInput {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub level: Option<CourseLevel>,
    pub semester: Option<String>,
    pub credits: Option<i32>,
    pub instructor: Option<String>,
    pub schedule: Option<String>,
}

/// Input for updating a course; absent fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateCourseInput {
    pub code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<CourseLevel>,
    pub semester: Option<String>,
    pub credits: Option<i32>,
    pub instructor: Option<String>,
    pub schedule: Option<String>,
    pub is_active: Option<bool>,
}

/// A catalog entry together with its current enrollment count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseWithEnrollment {
    #[serde(flatten)]
    pub course: Course,
    pub enrolled_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateCourseInput {
        CreateCourseInput {
            code: "CS101".into(),
            title: "Intro to Computing".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_course_defaults() {
        let course = Course::new(input(), Some(3));
        assert_eq!(course.level, CourseLevel::Beginner);
        assert_eq!(course.credits, 0);
        assert!(course.is_active);
        assert!(course.is_owned_by(3));
        assert!(!course.is_owned_by(4));
    }

    #[test]
    fn test_apply_only_changes_present_fields() {
        let mut course = Course::new(input(), Some(3));
        course.apply(UpdateCourseInput {
            title: Some("Computing I".into()),
            credits: Some(4),
            is_active: Some(false),
            ..Default::default()
        });

        assert_eq!(course.code, "CS101");
        assert_eq!(course.title, "Computing I");
        assert_eq!(course.credits, 4);
        assert!(!course.is_active);
    }

    #[test]
    fn test_level_parse_and_display() {
        assert_eq!("ADVANCED".parse::<CourseLevel>().unwrap(), CourseLevel::Advanced);
        assert_eq!("intermediate".parse::<CourseLevel>().unwrap(), CourseLevel::Intermediate);
        assert!("expert".parse::<CourseLevel>().is_err());
        assert_eq!(CourseLevel::Beginner.to_string(), "Beginner");
    }

    #[test]
    fn test_level_serializes_capitalized() {
        let json = serde_json::to_string(&CourseLevel::Intermediate).unwrap();
        assert_eq!(json, "\"Intermediate\"");
    }
}
