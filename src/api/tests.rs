//! Router-level tests driving the full middleware stack.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::{build_router, AppState};
use crate::config::Config;
use crate::db::{create_test_pool, migrations};

async fn test_app() -> Router {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let mut config = Config::default();
    config.auth.jwt_secret = "api-test-secret".to_string();
    build_router(AppState::new(pool, &config), &config.server.cors_origin)
}

struct TestResponse {
    status: StatusCode,
    set_cookie: Option<String>,
    body: Value,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        set_cookie,
        body,
    }
}

/// Register and log in, returning the `auth_token=...` pair for later requests.
async fn login_as(app: &Router, name: &str, email: &str) -> String {
    let res = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": name, "email": email, "password": "password123"})),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": email, "password": "password123"})),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);

    let set_cookie = res.set_cookie.expect("login should set a cookie");
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

#[tokio::test]
async fn test_register_returns_student_id() {
    let app = test_app().await;
    let res = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "password123"})),
    )
    .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert!(res.body["studentId"].as_str().unwrap().starts_with("STU"));
    assert!(res.set_cookie.is_none());
}

#[tokio::test]
async fn test_register_errors() {
    let app = test_app().await;
    let weak = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "short"})),
    )
    .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(weak.body["code"], "VALIDATION_ERROR");

    login_as(&app, "Ada", "ada@example.com").await;
    let duplicate = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "password123"})),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_login_sets_cookie_and_returns_user() {
    let app = test_app().await;
    send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "password123"})),
    )
    .await;

    let res = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "ada@example.com", "password": "password123"})),
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["email"], "ada@example.com");
    assert_eq!(res.body["user"]["enrolledCourses"], json!([]));
    assert_eq!(res.body["sessionDuration"], 30 * 60 * 1000);

    let cookie = res.set_cookie.unwrap();
    assert!(cookie.starts_with("auth_token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=1800"));
}

#[tokio::test]
async fn test_login_failure_is_generic() {
    let app = test_app().await;
    login_as(&app, "Ada", "ada@example.com").await;

    let wrong = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "ada@example.com", "password": "wrong-password"})),
    )
    .await;
    let unknown = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "ghost@example.com", "password": "password123"})),
    )
    .await;

    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body, unknown.body);
    assert!(wrong.set_cookie.is_none());
}

#[tokio::test]
async fn test_protected_routes_require_cookie() {
    let app = test_app().await;
    for uri in ["/api/auth/me", "/api/session/check", "/api/courses"] {
        let res = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(res.body["code"], "UNAUTHORIZED");
    }

    let forged = send(
        &app,
        Method::GET,
        "/api/auth/me",
        Some("auth_token=not.a.token"),
        None,
    )
    .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_and_session_check() {
    let app = test_app().await;
    let cookie = login_as(&app, "Ada", "ada@example.com").await;

    let me = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["name"], "Ada");
    assert!(me.body["user"].get("passwordHash").is_none());

    let check = send(&app, Method::GET, "/api/session/check", Some(&cookie), None).await;
    assert_eq!(check.status, StatusCode::OK);
    assert_eq!(check.body["active"], true);
    let remaining = check.body["remainingMs"].as_i64().unwrap();
    assert!(remaining > 0 && remaining <= 30 * 60 * 1000);
    let idle = check.body["idleRemainingMs"].as_i64().unwrap();
    assert!(idle > 0 && idle <= 15 * 60 * 1000);
}

#[tokio::test]
async fn test_logout_is_final() {
    let app = test_app().await;
    let cookie = login_as(&app, "Ada", "ada@example.com").await;

    let res = send(&app, Method::POST, "/api/auth/logout", Some(&cookie), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.set_cookie.unwrap().contains("Max-Age=0"));

    let after = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_profile_and_change_password() {
    let app = test_app().await;
    let cookie = login_as(&app, "Ada", "ada@example.com").await;

    let res = send(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Some(&cookie),
        Some(json!({"name": "Ada Lovelace"})),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["name"], "Ada Lovelace");

    let wrong = send(
        &app,
        Method::PUT,
        "/api/auth/password",
        Some(&cookie),
        Some(json!({"currentPassword": "nope", "newPassword": "new-password-1"})),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let ok = send(
        &app,
        Method::PUT,
        "/api/auth/password",
        Some(&cookie),
        Some(json!({"currentPassword": "password123", "newPassword": "new-password-1"})),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);

    let still_in = send(&app, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(still_in.status, StatusCode::OK);
}

#[tokio::test]
async fn test_course_lifecycle_and_enrollment() {
    let app = test_app().await;
    let owner = login_as(&app, "Owner", "owner@example.com").await;
    let student = login_as(&app, "Ada", "ada@example.com").await;

    let created = send(
        &app,
        Method::POST,
        "/api/courses",
        Some(&owner),
        Some(json!({
            "courseCode": "cs101",
            "title": "Intro to Computing",
            "level": "intermediate",
            "credits": 3
        })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["course"]["code"], "CS101");
    assert_eq!(created.body["course"]["level"], "Intermediate");
    let id = created.body["course"]["id"].as_i64().unwrap();

    let enroll = send(
        &app,
        Method::POST,
        "/api/courses/enroll",
        Some(&student),
        Some(json!({"courseId": id})),
    )
    .await;
    assert_eq!(enroll.status, StatusCode::OK);
    assert_eq!(enroll.body["course"]["id"], id);

    let again = send(
        &app,
        Method::POST,
        "/api/courses/enroll",
        Some(&student),
        Some(json!({"courseId": id})),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let detail = send(
        &app,
        Method::GET,
        &format!("/api/courses/{}", id),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(detail.status, StatusCode::OK);
    assert_eq!(detail.body["course"]["enrolledCount"], 1);
    let roster = detail.body["course"]["enrolledStudents"].as_array().unwrap();
    assert_eq!(roster.len(), 1);
    assert!(roster[0].as_str().unwrap().starts_with("STU"));

    let mine = send(&app, Method::GET, "/api/courses/my", Some(&student), None).await;
    assert_eq!(mine.body["courses"].as_array().unwrap().len(), 1);

    let me = send(&app, Method::GET, "/api/auth/me", Some(&student), None).await;
    assert_eq!(me.body["user"]["enrolledCourses"], json!([id]));

    let catalog = send(&app, Method::GET, "/api/courses", Some(&student), None).await;
    assert_eq!(catalog.body["courses"][0]["enrolledCount"], 1);

    let forbidden = send(
        &app,
        Method::PUT,
        &format!("/api/courses/{}", id),
        Some(&student),
        Some(json!({"title": "Mine now"})),
    )
    .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let unenroll = send(
        &app,
        Method::POST,
        "/api/courses/unenroll",
        Some(&student),
        Some(json!({"courseId": id})),
    )
    .await;
    assert_eq!(unenroll.status, StatusCode::OK);

    let deleted = send(
        &app,
        Method::DELETE,
        &format!("/api/courses/{}", id),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(deleted.status, StatusCode::OK);

    let gone = send(
        &app,
        Method::GET,
        &format!("/api/courses/{}", id),
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_enroll_requires_course_id() {
    let app = test_app().await;
    let cookie = login_as(&app, "Ada", "ada@example.com").await;

    let res = send(
        &app,
        Method::POST,
        "/api/courses/enroll",
        Some(&cookie),
        Some(json!({})),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Course ID is required");

    let missing = send(
        &app,
        Method::POST,
        "/api/courses/enroll",
        Some(&cookie),
        Some(json!({"courseId": 9999})),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_returns_json_error() {
    let app = test_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).expect("error body should be JSON");
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].is_string());

    let cookie = login_as(&app, "Ada", "ada@example.com").await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/courses/enroll")
        .header(header::COOKIE, &cookie)
        .body(Body::from(r#"{"courseId": 1}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
