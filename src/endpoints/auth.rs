use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::CONFIG;
use crate::endpoints::extractors::get_user_permissions;
use crate::error::{AppError, Result};
use crate::middleware::{rate_limit, SESSION_COOKIE_NAME};
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::prelude::*;
use crate::models::{role, user, user_role};
use crate::services::webhook::WebhookEvent;
use crate::services::{activation, create_access_token, hash_password, settings, verify_password};
use crate::state::AppState;

const CIVILIAN_ROLE: &str = "civilian";

/// Create auth routes for registration, login and activation.
/// All of them sit behind the per-IP rate limiter.
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh_session))
        .route("/activate", post(activate))
        .layer(axum_middleware::from_fn(rate_limit))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ActivateRequest {
    pub code: String,
    #[validate(length(min = 3, max = 32, message = "Username must be 3-32 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub email_local_part: String,
}

#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    pub user_id: i64,
    pub username: String,
    pub email_address: String,
}

// ============================================================================
// Session Cookie Helpers
// ============================================================================

/// Create a session cookie with the given token
fn create_session_cookie(token: &str, secure: bool) -> HeaderValue {
    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        SESSION_COOKIE_NAME,
        token,
        CONFIG.auth.session_ttl_secs,
        if secure { "; Secure" } else { "" }
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Create a cookie that clears the session
fn clear_session_cookie() -> HeaderValue {
    let cookie = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE_NAME
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn validate_username_charset(username: &str) -> Result<()> {
    let ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !ok {
        return Err(AppError::BadRequest(
            "Username may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// Register a new account with the civilian role
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    validate_username_charset(&request.username)?;

    if !settings::registration_enabled(&state.db).await? {
        return Err(AppError::Forbidden(
            "Registration is currently disabled".to_string(),
        ));
    }

    let existing = User::find()
        .filter(user::Column::Username.eq(&request.username))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let hashed = hash_password(&request.password)?;
    let now = Utc::now();

    let new_user = user::ActiveModel {
        username: Set(request.username.clone()),
        password_hash: Set(Some(hashed)),
        enabled: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created_user = new_user.insert(&state.db).await?;

    // The civilian role is seeded, but tolerate a pruned roles table
    let civilian_role = match Role::find()
        .filter(role::Column::Name.eq(CIVILIAN_ROLE))
        .one(&state.db)
        .await?
    {
        Some(r) => r,
        None => {
            let new_role = role::ActiveModel {
                name: Set(CIVILIAN_ROLE.to_string()),
                description: Set(Some("Temporary mailbox access only".to_string())),
                is_system: Set(true),
                created_at: Set(now),
                ..Default::default()
            };
            new_role.insert(&state.db).await?
        }
    };

    let assignment = user_role::ActiveModel {
        user_id: Set(created_user.id),
        role_id: Set(civilian_role.id),
    };
    assignment.insert(&state.db).await?;

    state
        .audit
        .log_success(
            AuditAction::Registered,
            ResourceType::User,
            Some(created_user.id.to_string()),
            Some(&created_user),
            None,
        )
        .await;

    Ok(Json(serde_json::json!({
        "user_id": created_user.id,
        "username": created_user.username,
    })))
}

/// Login with username and password, returns session cookie
async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Response> {
    let found_user = User::find()
        .filter(user::Column::Username.eq(&request.username))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    if !found_user.enabled {
        state
            .audit
            .log_failure(
                AuditAction::LoginFailed,
                ResourceType::User,
                Some(found_user.id.to_string()),
                Some(&found_user),
                "Account is disabled",
            )
            .await;
        return Err(AppError::Unauthorized("Account is disabled".to_string()));
    }

    let password_ok = found_user
        .password_hash
        .as_deref()
        .map(|hash| verify_password(&request.password, hash))
        .unwrap_or(false);

    if !password_ok {
        state
            .audit
            .log_failure(
                AuditAction::LoginFailed,
                ResourceType::User,
                Some(found_user.id.to_string()),
                Some(&found_user),
                "Bad password",
            )
            .await;
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    // Permissions are embedded in the token for observability; authorization
    // always re-reads them from the database.
    let permissions = get_user_permissions(&state.db, found_user.id).await;

    let access_token =
        create_access_token(&found_user.id.to_string(), None, Some(permissions))?;

    state
        .audit
        .log_success(
            AuditAction::Login,
            ResourceType::User,
            Some(found_user.id.to_string()),
            Some(&found_user),
            None,
        )
        .await;

    let response = Json(LoginResponse {
        user_id: found_user.id,
        username: found_user.username,
    });

    Ok((
        [(
            header::SET_COOKIE,
            create_session_cookie(&access_token, CONFIG.server.cookie_secure),
        )],
        response,
    )
        .into_response())
}

/// Logout - clears the session cookie
async fn logout() -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({"message": "Logged out"})),
    )
        .into_response()
}

/// Refresh the session token
async fn refresh_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<Response> {
    use crate::services::security::decode_token;

    // Get current token from cookie or request body
    let current_token = extract_session_token(&headers)
        .or(request.refresh_token)
        .ok_or_else(|| AppError::Unauthorized("No session to refresh".to_string()))?;

    let claims = decode_token(&current_token)
        .map_err(|_| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid session".to_string()))?;

    // Verify user still exists and is enabled
    let found_user = User::find_by_id(user_id)
        .filter(user::Column::Enabled.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found or disabled".to_string()))?;

    let permissions = get_user_permissions(&state.db, found_user.id).await;

    let new_token = create_access_token(&found_user.id.to_string(), None, Some(permissions))?;

    state
        .audit
        .log_success(
            AuditAction::TokenRefresh,
            ResourceType::User,
            Some(found_user.id.to_string()),
            Some(&found_user),
            None,
        )
        .await;

    Ok((
        [(
            header::SET_COOKIE,
            create_session_cookie(&new_token, CONFIG.server.cookie_secure),
        )],
        Json(serde_json::json!({"message": "Session refreshed"})),
    )
        .into_response())
}

/// Redeem an activation code: provisions a student account with a permanent
/// email in one transaction
async fn activate(
    State(state): State<AppState>,
    Json(request): Json<ActivateRequest>,
) -> Result<Json<ActivateResponse>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    validate_username_charset(&request.username)?;

    let redemption = activation::redeem_code(
        &state.db,
        &request.code,
        &request.username,
        &request.password,
        &request.email_local_part,
    )
    .await?;

    state
        .audit
        .log_success(
            AuditAction::CodeRedeemed,
            ResourceType::ActivationCode,
            Some(request.code.clone()),
            Some(&redemption.user),
            Some(serde_json::json!({ "email": redemption.email.address })),
        )
        .await;

    state.webhooks.notify(
        redemption.user.id,
        WebhookEvent::AccountActivated,
        serde_json::json!({
            "username": redemption.user.username,
            "email": redemption.email.address,
        }),
    );

    Ok(Json(ActivateResponse {
        user_id: redemption.user.id,
        username: redemption.user.username.clone(),
        email_address: redemption.email.address.clone(),
    }))
}

/// Extract session token from cookie header
fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?;
    let cookie_str = cookies.to_str().ok()?;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(&format!("{}=", SESSION_COOKIE_NAME)) {
            return Some(value.to_string());
        }
    }
    None
}
