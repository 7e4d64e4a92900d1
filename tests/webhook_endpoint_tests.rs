//! Webhook configuration endpoint integration tests
//!
//! Covers:
//! - `GET /api/webhook` — fetch own configuration
//! - `PUT /api/webhook` — upsert with URL validation
//! - `DELETE /api/webhook` — removal
//! - `POST /api/webhook/test` — test delivery without a configured hook

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use sea_orm::EntityTrait;
use tower::util::ServiceExt;

mod common;
use common::{build_test_app_state_with_db, create_test_db, create_test_user_with_role, unique_client_ip};

use mailcove::endpoints::create_router;
use mailcove::models::prelude::*;

async fn do_login(app: axum::Router, username: &str, password: &str) -> String {
    let body = serde_json::json!({"username": username, "password": password}).to_string();
    let request = Request::builder()
        .uri("/auth/login")
        .method("POST")
        .header("content-type", "application/json")
        .header("x-forwarded-for", unique_client_ip())
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "login failed");

    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|v| {
            let s = v.to_str().ok()?;
            s.starts_with("mailcove_session=")
                .then(|| s.split(';').next().unwrap().to_string())
        })
        .expect("session cookie")
}

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    cookie: &str,
    json_body: Option<&str>,
) -> (StatusCode, String) {
    let mut builder = Request::builder().uri(uri).method(method).header("Cookie", cookie);
    let body = match json_body {
        Some(b) => {
            builder = builder.header("content-type", "application/json");
            Body::from(b.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn test_get_webhook_when_none_configured() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "hooker", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "hooker", "password123").await;

    let (status, body) = send(app, "GET", "/api/webhook", &cookie, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "null");
}

#[tokio::test]
async fn test_put_webhook_upserts() {
    let db = create_test_db().await;
    let owner = create_test_user_with_role(&db, "hooker", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db.clone());
    let app = create_router(state);
    let cookie = do_login(app.clone(), "hooker", "password123").await;

    let (status, body) = send(
        app.clone(),
        "PUT",
        "/api/webhook",
        &cookie,
        Some(r#"{"url": "https://example.com/notify"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "put failed: {}", body);
    let saved: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(saved["url"], "https://example.com/notify");
    assert_eq!(saved["enabled"], true);

    // Second PUT replaces the URL rather than creating another row
    let (status, body) = send(
        app.clone(),
        "PUT",
        "/api/webhook",
        &cookie,
        Some(r#"{"url": "https://example.com/elsewhere", "enabled": false}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(updated["url"], "https://example.com/elsewhere");
    assert_eq!(updated["enabled"], false);

    let row = Webhook::find_by_id(owner.id).one(&db).await.unwrap().unwrap();
    assert_eq!(row.url, "https://example.com/elsewhere");
    assert!(!row.enabled);
}

#[tokio::test]
async fn test_put_webhook_rejects_bad_url() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "hooker", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "hooker", "password123").await;

    let (status, _) = send(
        app,
        "PUT",
        "/api/webhook",
        &cookie,
        Some(r#"{"url": "ftp://example.com/files"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_webhook() {
    let db = create_test_db().await;
    let owner = create_test_user_with_role(&db, "hooker", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db.clone());
    let app = create_router(state);
    let cookie = do_login(app.clone(), "hooker", "password123").await;

    send(
        app.clone(),
        "PUT",
        "/api/webhook",
        &cookie,
        Some(r#"{"url": "https://example.com/notify"}"#),
    )
    .await;

    let (status, _) = send(app.clone(), "DELETE", "/api/webhook", &cookie, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(Webhook::find_by_id(owner.id).one(&db).await.unwrap().is_none());

    // Deleting again is a 404
    let (status, _) = send(app, "DELETE", "/api/webhook", &cookie, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_test_delivery_without_webhook_rejected() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "hooker", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "hooker", "password123").await;

    let (status, body) = send(app, "POST", "/api/webhook/test", &cookie, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No enabled webhook"));
}

#[tokio::test]
async fn test_webhook_requires_auth() {
    let state = common::build_test_app_state().await;
    let app = create_router(state);

    let request = Request::builder()
        .uri("/api/webhook")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
