//! Course API endpoints
//!
//! All routes require authentication:
//! - GET /api/courses - Active catalog with enrollment counts
//! - POST /api/courses - Create a course
//! - GET /api/courses/my - Courses the caller is enrolled in
//! - GET /api/courses/{id} - Single course with its roster
//! - PUT/DELETE /api/courses/{id} - Creator only
//! - POST /api/courses/enroll, /api/courses/unenroll

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::auth::MessageResponse;
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{Course, CourseLevel, CourseWithEnrollment, CreateCourseInput, UpdateCourseInput};

/// Request body for creating a course
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[serde(default, alias = "courseCode")]
    pub code: String,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub level: Option<String>,
    pub semester: Option<String>,
    pub credits: Option<i32>,
    pub instructor: Option<String>,
    pub schedule: Option<String>,
}

/// Request body for updating a course; absent fields are unchanged
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    #[serde(alias = "courseCode")]
    pub code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<String>,
    pub semester: Option<String>,
    pub credits: Option<i32>,
    pub instructor: Option<String>,
    pub schedule: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub course_id: Option<i64>,
}

/// Course as returned to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub description: String,
    pub level: CourseLevel,
    pub semester: Option<String>,
    pub credits: i32,
    pub instructor: String,
    pub schedule: String,
    pub is_active: bool,
    pub created_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrolled_count: Option<i64>,
    /// Student ids on the roster; only on the single-course view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrolled_students: Option<Vec<String>>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            code: course.code,
            title: course.title,
            description: course.description,
            level: course.level,
            semester: course.semester,
            credits: course.credits,
            instructor: course.instructor,
            schedule: course.schedule,
            is_active: course.is_active,
            created_by: course.created_by,
            enrolled_count: None,
            enrolled_students: None,
            created_at: course.created_at.to_rfc3339(),
            updated_at: course.updated_at.to_rfc3339(),
        }
    }
}

impl From<CourseWithEnrollment> for CourseResponse {
    fn from(entry: CourseWithEnrollment) -> Self {
        let mut response = CourseResponse::from(entry.course);
        response.enrolled_count = Some(entry.enrolled_count);
        response
    }
}

#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub courses: Vec<CourseResponse>,
}

#[derive(Debug, Serialize)]
pub struct CourseEnvelope {
    pub course: CourseResponse,
}

#[derive(Debug, Serialize)]
pub struct CourseMessageResponse {
    pub message: String,
    pub course: CourseResponse,
}

/// Build the course router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/my", get(my_courses))
        .route("/enroll", post(enroll))
        .route("/unenroll", post(unenroll))
        .route(
            "/{id}",
            get(get_course).put(update_course).delete(delete_course),
        )
}

fn parse_level(level: Option<String>) -> Result<Option<CourseLevel>, ApiError> {
    level
        .map(|l| l.parse::<CourseLevel>())
        .transpose()
        .map_err(|e| ApiError::validation_error(e.to_string()))
}

fn require_course_id(body: &EnrollmentRequest) -> Result<i64, ApiError> {
    body.course_id
        .ok_or_else(|| ApiError::validation_error("Course ID is required"))
}

/// GET /api/courses - Active catalog
async fn list_courses(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<CourseListResponse>, ApiError> {
    let courses = state.course_service.list_active().await?;
    Ok(Json(CourseListResponse {
        courses: courses.into_iter().map(Into::into).collect(),
    }))
}

/// POST /api/courses - Create a course owned by the caller
async fn create_course(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = CreateCourseInput {
        code: body.code,
        title: body.title,
        description: body.description,
        level: parse_level(body.level)?,
        semester: body.semester,
        credits: body.credits,
        instructor: body.instructor,
        schedule: body.schedule,
    };

    let course = state.course_service.create(ctx.user.id, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(CourseMessageResponse {
            message: "Course created successfully".to_string(),
            course: course.into(),
        }),
    ))
}

/// GET /api/courses/my - Caller's enrolled courses
async fn my_courses(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
) -> Result<Json<CourseListResponse>, ApiError> {
    let courses = state.course_service.my_courses(ctx.user.id).await?;
    Ok(Json(CourseListResponse {
        courses: courses.into_iter().map(Into::into).collect(),
    }))
}

async fn get_course(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseEnvelope>, ApiError> {
    let course = state.course_service.get(id).await?;
    let roster = state.course_service.roster(id).await?;

    let mut course = CourseResponse::from(course);
    course.enrolled_count = Some(roster.len() as i64);
    course.enrolled_students = Some(roster);
    Ok(Json(CourseEnvelope { course }))
}

/// PUT /api/courses/{id} - Partial update, creator only
async fn update_course(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateCourseRequest>,
) -> Result<Json<CourseEnvelope>, ApiError> {
    let input = UpdateCourseInput {
        code: body.code,
        title: body.title,
        description: body.description,
        level: parse_level(body.level)?,
        semester: body.semester,
        credits: body.credits,
        instructor: body.instructor,
        schedule: body.schedule,
        is_active: body.is_active,
    };

    let course = state.course_service.update(ctx.user.id, id, input).await?;
    Ok(Json(CourseEnvelope {
        course: course.into(),
    }))
}

/// DELETE /api/courses/{id} - Creator only
async fn delete_course(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.course_service.delete(ctx.user.id, id).await?;
    Ok(Json(MessageResponse::new("Course deleted successfully")))
}

/// POST /api/courses/enroll
async fn enroll(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    ApiJson(body): ApiJson<EnrollmentRequest>,
) -> Result<Json<CourseMessageResponse>, ApiError> {
    let course_id = require_course_id(&body)?;
    let course = state.course_service.enroll(ctx.user.id, course_id).await?;

    Ok(Json(CourseMessageResponse {
        message: "Successfully enrolled in course".to_string(),
        course: course.into(),
    }))
}

/// POST /api/courses/unenroll
async fn unenroll(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    ApiJson(body): ApiJson<EnrollmentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let course_id = require_course_id(&body)?;
    state.course_service.unenroll(ctx.user.id, course_id).await?;
    Ok(Json(MessageResponse::new("Successfully unenrolled from course")))
}
