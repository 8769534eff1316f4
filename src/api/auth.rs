//! Authentication API endpoints
//!
//! Handles HTTP requests for the account lifecycle:
//! - POST /api/auth/register - Student registration
//! - POST /api/auth/login - Login, sets the `auth_token` cookie
//! - POST /api/auth/logout - Logout, clears the cookie
//! - GET /api/auth/me - Current student with enrolled course ids
//! - PUT /api/auth/profile - Edit name / email
//! - PUT /api/auth/password - Change password
//! - GET /api/session/check - Remaining session lifetime

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{UpdateProfileInput, User};
use crate::services::user::{LoginInput, RegisterInput};

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub student_id: String,
}

/// Public view of a student
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub enrolled_courses: Vec<i64>,
}

impl UserResponse {
    fn new(user: User, enrolled_courses: Vec<i64>) -> Self {
        Self {
            student_id: user.student_id,
            name: user.name,
            email: user.email,
            enrolled_courses,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub user: UserResponse,
    /// Session lifetime in milliseconds
    pub session_duration: i64,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCheckResponse {
    pub active: bool,
    pub expires_at: String,
    pub remaining_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_remaining_ms: Option<i64>,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

/// Build the session routes (requires auth middleware)
pub fn session_router() -> Router<AppState> {
    Router::new().route("/check", get(check_session))
}

fn cookie_header(value: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(value).map_err(ApiError::internal)?,
    );
    Ok(headers)
}

/// POST /api/auth/register - Student registration
///
/// Registration does not log the student in.
async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = RegisterInput::new(body.name, body.email, body.password);
    let user = state.user_service.register(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful".to_string(),
            student_id: user.student_id,
        }),
    ))
}

/// POST /api/auth/login - Student login
async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .user_service
        .login(LoginInput::new(body.email, body.password))
        .await?;

    let enrolled = state
        .course_service
        .enrolled_course_ids(outcome.user.id)
        .await?;
    let headers = cookie_header(&state.cookies.issue(&outcome.token))?;

    Ok((
        headers,
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user: UserResponse::new(outcome.user, enrolled),
            session_duration: outcome.session_duration.num_milliseconds(),
        }),
    ))
}

/// POST /api/auth/logout - Logout
///
/// Requires authentication.
async fn logout(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.logout(&ctx.session.id).await?;

    let headers = cookie_header(&state.cookies.clear())?;
    Ok((headers, Json(MessageResponse::new("Logged out successfully"))))
}

/// GET /api/auth/me - Get current student
async fn get_current_user(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
) -> Result<Json<UserEnvelope>, ApiError> {
    let enrolled = state.course_service.enrolled_course_ids(ctx.user.id).await?;
    Ok(Json(UserEnvelope {
        user: UserResponse::new(ctx.user, enrolled),
    }))
}

/// PUT /api/auth/profile - Update current student's profile
async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let input = UpdateProfileInput {
        name: body.name,
        email: body.email,
    };
    let user = state.user_service.update_profile(ctx.user.id, input).await?;
    let enrolled = state.course_service.enrolled_course_ids(user.id).await?;

    Ok(Json(UserEnvelope {
        user: UserResponse::new(user, enrolled),
    }))
}

/// PUT /api/auth/password - Change password
///
/// Other sessions of the student are signed out; this one stays valid.
async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if body.current_password.is_empty() || body.new_password.is_empty() {
        return Err(ApiError::validation_error(
            "Current and new password are required",
        ));
    }

    state
        .user_service
        .change_password(
            ctx.user.id,
            &ctx.session.id,
            &body.current_password,
            &body.new_password,
        )
        .await?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// GET /api/session/check - Remaining lifetime of the current session
///
/// Reaching this handler already refreshed the idle window.
async fn check_session(
    State(state): State<AppState>,
    AuthenticatedUser(ctx): AuthenticatedUser,
) -> Json<SessionCheckResponse> {
    let status = state.sessions.status(&ctx.session);
    Json(SessionCheckResponse {
        active: true,
        expires_at: status.expires_at.to_rfc3339(),
        remaining_ms: status.remaining.num_milliseconds(),
        idle_remaining_ms: status.idle_remaining.map(|d| d.num_milliseconds()),
    })
}
