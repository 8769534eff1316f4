//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints of the student portal:
//! - Auth endpoints (register, login, logout, profile, password)
//! - Session check endpoint
//! - Course catalog and enrollment endpoints

pub mod auth;
pub mod courses;
pub mod middleware;

#[cfg(test)]
mod tests;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, ApiJson, AppState, AuthenticatedUser, CookiePolicy, AUTH_COOKIE};

/// Build the API router (mounted under `/api`)
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a live session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/session", auth::session_router())
        .nest("/courses", courses::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // Cookie auth needs credentials, which rules out a wildcard origin
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => tracing::warn!(cors_origin, error = %e, "Ignoring unparsable CORS origin"),
    }

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
