//! Authentication middleware for API routes
//!
//! Resolves the session cookie (JWT) or an `Authorization: Bearer` API key
//! into an [`AuthenticatedUser`] request extension. Returns 401 when neither
//! credential is present and valid.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use crate::endpoints::extractors::get_user_permissions;
use crate::models::prelude::*;
use crate::models::{api_key, user};
use crate::services::security::{decode_token, hash_api_key, API_KEY_PREFIX};
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "mailcove_session";

/// Authenticated user stored in request extensions, with the effective
/// permission set resolved from all of the user's roles.
#[derive(Clone)]
pub struct AuthenticatedUser {
    pub user: user::Model,
    pub permissions: Vec<String>,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.iter().any(|p| p == name)
    }
}

/// Auth middleware that validates the session cookie or an API key
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let user = if let Some(token) = extract_session_token(&req) {
        match validate_token_and_get_user(&state, &token).await {
            Ok(u) => u,
            Err(msg) => return unauthorized_response(&msg),
        }
    } else if let Some(secret) = extract_bearer_token(&req) {
        if secret.starts_with(API_KEY_PREFIX) {
            match validate_api_key_and_get_user(&state, &secret).await {
                Ok(u) => u,
                Err(msg) => return unauthorized_response(&msg),
            }
        } else {
            // A bare JWT in the Authorization header also works
            match validate_token_and_get_user(&state, &secret).await {
                Ok(u) => u,
                Err(msg) => return unauthorized_response(&msg),
            }
        }
    } else {
        return unauthorized_response("Missing session cookie or Authorization header");
    };

    let permissions = get_user_permissions(&state.db, user.id).await;

    req.extensions_mut()
        .insert(AuthenticatedUser { user, permissions });

    next.run(req).await
}

/// Extract the session token from the cookie header
fn extract_session_token(req: &Request) -> Option<String> {
    let cookies = req.headers().get(header::COOKIE)?;
    let cookie_str = cookies.to_str().ok()?;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(&format!("{}=", SESSION_COOKIE_NAME)) {
            return Some(value.to_string());
        }
    }
    None
}

/// Extract a Bearer token from the Authorization header
fn extract_bearer_token(req: &Request) -> Option<String> {
    let auth_header = req.headers().get(header::AUTHORIZATION)?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;
    Some(token.to_string())
}

/// Validate JWT token and fetch user from database
async fn validate_token_and_get_user(state: &AppState, token: &str) -> Result<user::Model, String> {
    let claims = decode_token(token).map_err(|_| "Invalid or expired token".to_string())?;

    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| "Invalid token subject".to_string())?;

    let found_user = User::find_by_id(user_id)
        .filter(user::Column::Enabled.eq(true))
        .one(&state.db)
        .await
        .map_err(|e| format!("Database error: {}", e))?;

    found_user.ok_or_else(|| "User not found or disabled".to_string())
}

/// Validate an API key secret and fetch its owner
async fn validate_api_key_and_get_user(
    state: &AppState,
    secret: &str,
) -> Result<user::Model, String> {
    let key_hash = hash_api_key(secret);

    let key = ApiKey::find()
        .filter(api_key::Column::KeyHash.eq(&key_hash))
        .one(&state.db)
        .await
        .map_err(|e| format!("Database error: {}", e))?
        .ok_or_else(|| "Invalid API key".to_string())?;

    let found_user = User::find_by_id(key.user_id)
        .filter(user::Column::Enabled.eq(true))
        .one(&state.db)
        .await
        .map_err(|e| format!("Database error: {}", e))?
        .ok_or_else(|| "User not found or disabled".to_string())?;

    // Best-effort usage stamp; a failed write must not reject the request
    let mut touched: api_key::ActiveModel = key.into();
    touched.last_used_at = Set(Some(Utc::now()));
    if let Err(e) = touched.update(&state.db).await {
        tracing::warn!("Failed to update API key last_used_at: {}", e);
    }

    Ok(found_user)
}

/// Create a 401 Unauthorized JSON response
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "detail": message
        })),
    )
        .into_response()
}
