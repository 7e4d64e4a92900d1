//! Email lifecycle integration tests
//!
//! Covers:
//! - `GET /api/emails` — list own emails, expired filtering
//! - `POST /api/emails` — create temporary email (mail.create, per-user cap)
//! - `DELETE /api/emails/{id}` — owner delete, message cascade
//! - `POST /api/emails/{id}/promote` — permanent promotion rules
//! - `GET /api/emails/{id}/messages` — ownership enforcement

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tower::util::ServiceExt;

mod common;
use common::{
    build_test_app_state_with_db, create_test_db, create_test_email, create_test_message,
    create_test_user_with_role, unique_client_ip,
};

use mailcove::endpoints::create_router;
use mailcove::models::prelude::*;
use mailcove::models::message;

// ============================================================================
// Helpers
// ============================================================================

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

// ============================================================================
// POST /api/emails
// ============================================================================

#[tokio::test]
async fn test_create_email_with_random_address() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "maker", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "maker", "password123").await;

    let (status, body) = send(app, "POST", "/api/emails", &cookie, Some("{}")).await;

    assert_eq!(status, StatusCode::OK, "create failed: {}", body);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(parsed["address"]
        .as_str()
        .unwrap()
        .contains('@'));
    assert_eq!(parsed["is_permanent"], false);
    assert_eq!(parsed["is_expired"], false);
}

#[tokio::test]
async fn test_create_email_with_requested_local_part() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "chooser", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "chooser", "password123").await;

    let (status, body) = send(
        app,
        "POST",
        "/api/emails",
        &cookie,
        Some(r#"{"local_part": "my.inbox"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(parsed["address"].as_str().unwrap().starts_with("my.inbox@"));
}

#[tokio::test]
async fn test_create_email_taken_address_conflicts() {
    let db = create_test_db().await;
    let other = create_test_user_with_role(&db, "other", "password123", "civilian").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    create_test_email(
        &db,
        other.id,
        &format!("grabbed@{}", domain),
        false,
        Utc::now() + Duration::hours(24),
    )
    .await;
    create_test_user_with_role(&db, "wanter", "password123", "civilian").await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "wanter", "password123").await;

    let (status, _) = send(
        app,
        "POST",
        "/api/emails",
        &cookie,
        Some(r#"{"local_part": "grabbed"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_email_invalid_local_part_rejected() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "odd", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "odd", "password123").await;

    let (status, _) = send(
        app,
        "POST",
        "/api/emails",
        &cookie,
        Some(r#"{"local_part": "NOT OK"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_email_respects_per_user_cap() {
    use mailcove::models::system_setting;
    use sea_orm::{ActiveModelTrait, Set};

    let db = create_test_db().await;
    create_test_user_with_role(&db, "capped", "password123", "civilian").await;

    let setting = SystemSetting::find_by_id("max_emails_per_user")
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let mut setting: system_setting::ActiveModel = setting.into();
    setting.value = Set("2".to_string());
    setting.update(&db).await.unwrap();

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "capped", "password123").await;

    for _ in 0..2 {
        let (status, _) = send(app.clone(), "POST", "/api/emails", &cookie, Some("{}")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(app, "POST", "/api/emails", &cookie, Some("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("limit"));
}

// ============================================================================
// GET /api/emails
// ============================================================================

#[tokio::test]
async fn test_list_hides_expired_unless_requested() {
    let db = create_test_db().await;
    let owner = create_test_user_with_role(&db, "lister", "password123", "civilian").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    create_test_email(
        &db,
        owner.id,
        &format!("live@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;
    create_test_email(
        &db,
        owner.id,
        &format!("stale@{}", domain),
        false,
        Utc::now() - Duration::hours(1),
    )
    .await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "lister", "password123").await;

    let (status, body) = send(app.clone(), "GET", "/api/emails", &cookie, None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(listed.len(), 1);

    let (status, body) = send(
        app,
        "GET",
        "/api/emails?include_expired=true",
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn test_list_only_shows_own_emails() {
    let db = create_test_db().await;
    let other = create_test_user_with_role(&db, "neighbor", "password123", "civilian").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    create_test_email(
        &db,
        other.id,
        &format!("private@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;
    create_test_user_with_role(&db, "snoop", "password123", "civilian").await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "snoop", "password123").await;

    let (status, body) = send(app, "GET", "/api/emails", &cookie, None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert!(listed.is_empty());
}

// ============================================================================
// DELETE /api/emails/{id}
// ============================================================================

#[tokio::test]
async fn test_delete_email_cascades_messages() {
    let db = create_test_db().await;
    let owner = create_test_user_with_role(&db, "deleter", "password123", "civilian").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    let mailbox = create_test_email(
        &db,
        owner.id,
        &format!("doomed@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;
    create_test_message(&db, mailbox.id, "first").await;
    create_test_message(&db, mailbox.id, "second").await;

    let state = build_test_app_state_with_db(db.clone());
    let app = create_router(state);
    let cookie = do_login(app.clone(), "deleter", "password123").await;

    let (status, _) = send(
        app,
        "DELETE",
        &format!("/api/emails/{}", mailbox.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert!(Email::find_by_id(mailbox.id)
        .one(&db)
        .await
        .unwrap()
        .is_none());
    let leftover = Message::find()
        .filter(message::Column::EmailId.eq(mailbox.id))
        .all(&db)
        .await
        .unwrap();
    assert!(leftover.is_empty(), "messages must cascade");
}

#[tokio::test]
async fn test_delete_other_users_email_not_found() {
    let db = create_test_db().await;
    let other = create_test_user_with_role(&db, "victim", "password123", "civilian").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    let mailbox = create_test_email(
        &db,
        other.id,
        &format!("mine@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;
    create_test_user_with_role(&db, "attacker", "password123", "civilian").await;

    let state = build_test_app_state_with_db(db.clone());
    let app = create_router(state);
    let cookie = do_login(app.clone(), "attacker", "password123").await;

    let (status, _) = send(
        app,
        "DELETE",
        &format!("/api/emails/{}", mailbox.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(Email::find_by_id(mailbox.id)
        .one(&db)
        .await
        .unwrap()
        .is_some());
}

// ============================================================================
// POST /api/emails/{id}/promote
// ============================================================================

#[tokio::test]
async fn test_promote_flips_flag_and_expiry() {
    let db = create_test_db().await;
    let owner = create_test_user_with_role(&db, "climber", "password123", "student").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    let mailbox = create_test_email(
        &db,
        owner.id,
        &format!("upgrade@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;

    let state = build_test_app_state_with_db(db.clone());
    let app = create_router(state);
    let cookie = do_login(app.clone(), "climber", "password123").await;

    let (status, body) = send(
        app,
        "POST",
        &format!("/api/emails/{}/promote", mailbox.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "promotion failed: {}", body);

    let updated = Email::find_by_id(mailbox.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(updated.is_permanent);
    assert!(updated.expires_at > Utc::now() + Duration::days(365 * 100));
}

#[tokio::test]
async fn test_promote_second_permanent_conflicts() {
    let db = create_test_db().await;
    let owner = create_test_user_with_role(&db, "greedy", "password123", "student").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    create_test_email(
        &db,
        owner.id,
        &format!("forever@{}", domain),
        true,
        Utc::now() + Duration::days(365 * 1000),
    )
    .await;
    let second = create_test_email(
        &db,
        owner.id,
        &format!("another@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "greedy", "password123").await;

    let (status, body) = send(
        app,
        "POST",
        &format!("/api/emails/{}/promote", second.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("permanent email already exists"));
}

#[tokio::test]
async fn test_promote_already_permanent_rejected() {
    let db = create_test_db().await;
    let owner = create_test_user_with_role(&db, "redundant", "password123", "student").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    let mailbox = create_test_email(
        &db,
        owner.id,
        &format!("done@{}", domain),
        true,
        Utc::now() + Duration::days(365 * 1000),
    )
    .await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "redundant", "password123").await;

    let (status, _) = send(
        app,
        "POST",
        &format!("/api/emails/{}/promote", mailbox.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_promote_expired_email_rejected() {
    let db = create_test_db().await;
    let owner = create_test_user_with_role(&db, "tardy", "password123", "student").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    let mailbox = create_test_email(
        &db,
        owner.id,
        &format!("gone@{}", domain),
        false,
        Utc::now() - Duration::hours(1),
    )
    .await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "tardy", "password123").await;

    let (status, _) = send(
        app,
        "POST",
        &format!("/api/emails/{}/promote", mailbox.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_promote_requires_permission() {
    let db = create_test_db().await;
    // Civilians hold mail.create but not mail.promote
    let owner = create_test_user_with_role(&db, "plain", "password123", "civilian").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    let mailbox = create_test_email(
        &db,
        owner.id,
        &format!("hopeful@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "plain", "password123").await;

    let (status, _) = send(
        app,
        "POST",
        &format!("/api/emails/{}/promote", mailbox.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ============================================================================
// Messages
// ============================================================================

#[tokio::test]
async fn test_list_and_get_messages() {
    let db = create_test_db().await;
    let owner = create_test_user_with_role(&db, "reader", "password123", "civilian").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    let mailbox = create_test_email(
        &db,
        owner.id,
        &format!("inbox@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;
    let msg = create_test_message(&db, mailbox.id, "hello there").await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "reader", "password123").await;

    let (status, body) = send(
        app.clone(),
        "GET",
        &format!("/api/emails/{}/messages", mailbox.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["subject"], "hello there");

    let (status, body) = send(
        app,
        "GET",
        &format!("/api/emails/{}/messages/{}", mailbox.id, msg.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let fetched: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(fetched["subject"], "hello there");
}

#[tokio::test]
async fn test_messages_of_foreign_email_hidden() {
    let db = create_test_db().await;
    let other = create_test_user_with_role(&db, "holder", "password123", "civilian").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    let mailbox = create_test_email(
        &db,
        other.id,
        &format!("sealed@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;
    create_test_message(&db, mailbox.id, "secret").await;
    create_test_user_with_role(&db, "curious", "password123", "civilian").await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "curious", "password123").await;

    let (status, _) = send(
        app,
        "GET",
        &format!("/api/emails/{}/messages", mailbox.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_with_emails_view_reads_any_mailbox() {
    let db = create_test_db().await;
    let other = create_test_user_with_role(&db, "subject", "password123", "civilian").await;
    let domain = mailcove::config::CONFIG.mail.domain.clone();
    let mailbox = create_test_email(
        &db,
        other.id,
        &format!("audited@{}", domain),
        false,
        Utc::now() + Duration::hours(1),
    )
    .await;
    create_test_message(&db, mailbox.id, "visible to admins").await;
    create_test_user_with_role(&db, "overseer", "password123", "knight").await;

    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "overseer", "password123").await;

    let (status, body) = send(
        app,
        "GET",
        &format!("/api/emails/{}/messages", mailbox.id),
        &cookie,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(listed.len(), 1);
}
