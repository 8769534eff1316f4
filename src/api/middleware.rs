//! API middleware
//!
//! Contains:
//! - Shared application state handed to every handler
//! - The uniform JSON error type and its status mapping
//! - The auth gate (`require_auth`) and the `AuthenticatedUser` extractor

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxCourseRepository, SqlxEnrollmentRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::SessionPolicy;
use crate::services::course::{CourseService, CourseServiceError};
use crate::services::session::{AuthContext, AuthError, SessionService};
use crate::services::token::TokenCodec;
use crate::services::user::{UserService, UserServiceError};

/// Name of the cookie that carries the session token.
pub const AUTH_COOKIE: &str = "auth_token";

/// How the session cookie is written.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    /// Add the `Secure` attribute
    pub secure: bool,
    /// `Max-Age` in seconds; matches the session lifetime
    pub max_age_secs: i64,
}

impl CookiePolicy {
    /// `Set-Cookie` value carrying a freshly issued token.
    pub fn issue(&self, token: &str) -> String {
        self.render(token, self.max_age_secs)
    }

    /// `Set-Cookie` value that makes the browser drop the token.
    pub fn clear(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
            AUTH_COOKIE, value, max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub sessions: Arc<SessionService>,
    pub user_service: Arc<UserService>,
    pub course_service: Arc<CourseService>,
    pub cookies: CookiePolicy,
}

impl AppState {
    /// Wire repositories and services over `pool`.
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let users = SqlxUserRepository::boxed(pool.clone());
        let policy = SessionPolicy::new(config.auth.session_ttl(), config.auth.idle_timeout());

        let sessions = Arc::new(SessionService::new(
            SqlxSessionRepository::boxed(pool.clone()),
            users.clone(),
            TokenCodec::new(&config.auth.jwt_secret),
            policy,
        ));
        let user_service = Arc::new(UserService::new(
            users,
            sessions.clone(),
            config.auth.min_password_length,
        ));
        let course_service = Arc::new(CourseService::new(
            SqlxCourseRepository::boxed(pool.clone()),
            SqlxEnrollmentRepository::boxed(pool.clone()),
        ));

        Self {
            pool,
            sessions,
            user_service,
            course_service,
            cookies: CookiePolicy {
                secure: config.server.secure_cookies,
                max_age_secs: policy.ttl.num_seconds(),
            },
        }
    }
}

/// Authenticated identity extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AuthContext);

/// Error response for API errors: `{"error": "...", "code": "..."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the cause and hide it from the client.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "Request failed");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

/// JSON body extractor whose rejections use the `ApiError` body.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InternalError(inner) => ApiError::internal(inner),
            AuthError::Unauthenticated => ApiError::unauthorized("Authentication required"),
            other => ApiError::unauthorized(other.to_string()),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::ValidationError(msg) | UserServiceError::WeakPassword(msg) => {
                ApiError::validation_error(msg)
            }
            UserServiceError::DuplicateEmail => ApiError::conflict(e.to_string()),
            UserServiceError::InvalidCredentials | UserServiceError::IncorrectCurrentPassword => {
                ApiError::unauthorized(e.to_string())
            }
            UserServiceError::NotFound => ApiError::not_found(e.to_string()),
            UserServiceError::InternalError(inner) => ApiError::internal(inner),
        }
    }
}

impl From<CourseServiceError> for ApiError {
    fn from(e: CourseServiceError) -> Self {
        match e {
            CourseServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CourseServiceError::CourseInactive | CourseServiceError::NotEnrolled => {
                ApiError::validation_error(e.to_string())
            }
            CourseServiceError::DuplicateCode(_) | CourseServiceError::AlreadyEnrolled => {
                ApiError::conflict(e.to_string())
            }
            CourseServiceError::NotFound => ApiError::not_found(e.to_string()),
            CourseServiceError::Forbidden => ApiError::forbidden(e.to_string()),
            CourseServiceError::InternalError(inner) => ApiError::internal(inner),
        }
    }
}

/// Extract the session token from the `auth_token` cookie
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Authentication middleware
///
/// Every request through here is checked against the session registry; a
/// live session has its activity timestamp refreshed.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers());

    let ctx = state.sessions.authenticate(token.as_deref()).await?;

    request.extensions_mut().insert(AuthenticatedUser(ctx));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
