//! Roles endpoint integration tests
//!
//! Covers:
//! - `GET /api/roles` — seeded role set with permissions (roles.view)
//! - `GET /api/roles/permissions` — the permission catalog

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

mod common;
use common::{build_test_app_state_with_db, create_test_db, create_test_user_with_role, unique_client_ip};

use mailcove::endpoints::create_router;

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

async fn authenticated_get(app: axum::Router, uri: &str, cookie: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .uri(uri)
        .method("GET")
        .header("Cookie", cookie)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn test_list_roles_returns_seeded_set() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "watcher", "password123", "knight").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "watcher", "password123").await;

    let (status, body) = authenticated_get(app, "/api/roles", &cookie).await;
    assert_eq!(status, StatusCode::OK);

    let roles: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    let names: Vec<&str> = roles.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["emperor", "duke", "knight", "student", "civilian"]
    );

    // The emperor carries the full permission set, civilians the smallest
    let emperor = &roles[0];
    let civilian = &roles[4];
    assert!(emperor["permissions"].as_array().unwrap().len() > 10);
    assert_eq!(civilian["permissions"].as_array().unwrap().len(), 2);
    assert!(emperor["is_system"].as_bool().unwrap());
}

#[tokio::test]
async fn test_permission_catalog_covers_seeded_permissions() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "watcher", "password123", "knight").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "watcher", "password123").await;

    let (status, body) = authenticated_get(app.clone(), "/api/roles/permissions", &cookie).await;
    assert_eq!(status, StatusCode::OK);
    let catalog: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    let keys: Vec<&str> = catalog
        .iter()
        .map(|p| p["key"].as_str().unwrap())
        .collect();

    // Every permission attached to a seeded role appears in the catalog
    let (_, body) = authenticated_get(app, "/api/roles", &cookie).await;
    let roles: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    for role in roles {
        for perm in role["permissions"].as_array().unwrap() {
            assert!(
                keys.contains(&perm.as_str().unwrap()),
                "catalog is missing {}",
                perm
            );
        }
    }
}

#[tokio::test]
async fn test_roles_require_view_permission() {
    let db = create_test_db().await;
    create_test_user_with_role(&db, "pleb", "password123", "civilian").await;
    let state = build_test_app_state_with_db(db);
    let app = create_router(state);
    let cookie = do_login(app.clone(), "pleb", "password123").await;

    let (status, _) = authenticated_get(app, "/api/roles", &cookie).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
