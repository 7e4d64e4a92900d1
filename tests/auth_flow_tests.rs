//! Auth endpoint integration tests
//!
//! Covers:
//! - `POST /auth/register` — public registration with the civilian role
//! - `POST /auth/login` — session cookie issuance
//! - `POST /auth/logout` — cookie clearing
//! - `POST /auth/refresh` — session renewal
//! - auth middleware enforcement on `/api/*`

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

mod common;
use common::{
    build_test_app_state_with_db, create_test_db, create_test_user, create_test_user_with_role,
    unique_client_ip,
};

use mailcove::endpoints::create_router;

// ============================================================================
// Helpers
// ============================================================================

/// POST /auth/login and return (status, Set-Cookie header value).
async fn do_login(
    app: axum::Router,
    username: &str,
    password: &str,
) -> (StatusCode, Option<String>) {
    let body = serde_json::json!({
        "username": username,
        "password": password
    })
    .to_string();

    let request = Request::builder()
        .uri("/auth/login")
        .method("POST")
        .header("content-type", "application/json")
        .header("x-forwarded-for", unique_client_ip())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();

    let cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|v| {
            let s = v.to_str().ok()?;
            if s.starts_with("mailcove_session=") {
                Some(s.split(';').next().unwrap().to_string())
            } else {
                None
            }
        });

    (status, cookie)
}

async fn post_json(app: axum::Router, uri: &str, json_body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .header("x-forwarded-for", unique_client_ip())
        .body(Body::from(json_body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).to_string())
}

// ============================================================================
// POST /auth/register
// ============================================================================

#[tokio::test]
async fn test_register_creates_civilian() {
    let db = create_test_db().await;
    let state = build_test_app_state_with_db(db.clone());
    let app = create_router(state);

    let (status, body) = post_json(
        app.clone(),
        "/auth/register",
        r#"{"username": "newbie", "password": "password123"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "register failed: {}", body);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["username"], "newbie");

    // The new account can log in and sees the civilian permission set
    let (login_status, cookie) = do_login(app.clone(), "newbie", "password123").await;
    assert_eq!(login_status, StatusCode::OK);
    let cookie = cookie.expect("login must set a session cookie");

    let request = Request::builder()
        .uri("/api/users/me")
        .method("GET")
        .header("Cookie", &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let me: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let roles: Vec<&str> = me["roles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["civilian"]);

    let perms: Vec<&str> = me["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert!(perms.contains(&"mail.create"));
    assert!(!perms.contains(&"mail.promote"));
}

#[tokio::test]
async fn test_register_duplicate_username_conflicts() {
    let db = create_test_db().await;
    create_test_user(&db, "taken", "password123", true).await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);

    let (status, _) = post_json(
        app,
        "/auth/register",
        r#"{"username": "taken", "password": "password123"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_short_password_rejected() {
    let state = common::build_test_app_state().await;
    let app = create_router(state);

    let (status, _) = post_json(
        app,
        "/auth/register",
        r#"{"username": "shorty", "password": "short"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_honors_disabled_setting() {
    use mailcove::models::prelude::*;
    use mailcove::models::system_setting;
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    let db = create_test_db().await;

    let setting = SystemSetting::find_by_id("registration_enabled")
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let mut setting: system_setting::ActiveModel = setting.into();
    setting.value = Set("false".to_string());
    setting.update(&db).await.unwrap();

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);

    let (status, _) = post_json(
        app,
        "/auth/register",
        r#"{"username": "blocked", "password": "password123"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// POST /auth/login
// ============================================================================

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "alice", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);

    let (status, cookie) = do_login(app, "alice", "password123").await;

    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some(), "login must set a session cookie");
}

#[tokio::test]
async fn test_login_wrong_password_unauthorized() {
    let db = create_test_db().await;
    create_test_user(&db, "bob", "password123", true).await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);

    let (status, cookie) = do_login(app, "bob", "wrong-password").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());
}

#[tokio::test]
async fn test_login_disabled_account_rejected() {
    let db = create_test_db().await;
    create_test_user(&db, "ghost", "password123", false).await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);

    let (status, _) = do_login(app, "ghost", "password123").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_unknown_user_unauthorized() {
    let state = common::build_test_app_state().await;
    let app = create_router(state);

    let (status, _) = do_login(app, "nobody", "password123").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_refresh_renews_session() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "carol", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);

    let (_, cookie) = do_login(app.clone(), "carol", "password123").await;
    let cookie = cookie.unwrap();

    let request = Request::builder()
        .uri("/auth/refresh")
        .method("POST")
        .header("content-type", "application/json")
        .header("Cookie", &cookie)
        .header("x-forwarded-for", unique_client_ip())
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(set_cookie.starts_with("mailcove_session="));
}

#[tokio::test]
async fn test_refresh_without_session_unauthorized() {
    let state = common::build_test_app_state().await;
    let app = create_router(state);

    let (status, _) = post_json(app, "/auth/refresh", "{}").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let state = common::build_test_app_state().await;
    let app = create_router(state);

    let request = Request::builder()
        .uri("/auth/logout")
        .method("POST")
        .header("x-forwarded-for", unique_client_ip())
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(set_cookie.contains("Max-Age=0"));
}

// ============================================================================
// Middleware enforcement
// ============================================================================

#[tokio::test]
async fn test_protected_route_requires_auth() {
    let state = common::build_test_app_state().await;
    let app = create_router(state);

    let request = Request::builder()
        .uri("/api/users/me")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let state = common::build_test_app_state().await;
    let app = create_router(state);

    let request = Request::builder()
        .uri("/api/health")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_garbage_cookie_rejected() {
    let state = common::build_test_app_state().await;
    let app = create_router(state);

    let request = Request::builder()
        .uri("/api/users/me")
        .method("GET")
        .header("Cookie", "mailcove_session=not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_key_authenticates() {
    use mailcove::models::api_key;
    use mailcove::services::generate_api_key;
    use sea_orm::{ActiveModelTrait, Set};

    let db = create_test_db().await;
    let user = create_test_user_with_role(&db, "keyuser", "password123", "civilian").await;

    let (secret, key_hash) = generate_api_key();
    let new_key = api_key::ActiveModel {
        user_id: Set(user.id),
        name: Set("ci".to_string()),
        key_hash: Set(key_hash),
        created_at: Set(chrono::Utc::now()),
        last_used_at: Set(None),
        ..Default::default()
    };
    new_key.insert(&db).await.unwrap();

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);

    let request = Request::builder()
        .uri("/api/users/me")
        .method("GET")
        .header("Authorization", format!("Bearer {}", secret))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let me: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(me["username"], "keyuser");
}
