use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::Authenticated;
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::api_key;
use crate::models::prelude::*;
use crate::services::generate_api_key;
use crate::state::AppState;

/// Create API key routes (self-service, any authenticated user)
pub fn api_keys_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_keys).post(create_key))
        .route("/{key_id}", delete(delete_key))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: i64,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CreatedKeyResponse {
    pub id: i64,
    pub name: String,
    /// The plaintext secret; shown exactly once.
    pub key: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// List own API keys
async fn list_keys(
    State(state): State<AppState>,
    Authenticated(current): Authenticated,
) -> Result<Json<Vec<ApiKeyResponse>>> {
    let keys = ApiKey::find()
        .filter(api_key::Column::UserId.eq(current.id))
        .order_by_desc(api_key::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(
        keys.into_iter()
            .map(|k| ApiKeyResponse {
                id: k.id,
                name: k.name,
                created_at: k.created_at,
                last_used_at: k.last_used_at,
            })
            .collect(),
    ))
}

/// Create an API key; the secret is returned once and stored only as a hash
async fn create_key(
    State(state): State<AppState>,
    Authenticated(current): Authenticated,
    Json(data): Json<CreateKeyRequest>,
) -> Result<Json<CreatedKeyResponse>> {
    if data.name.is_empty() || data.name.len() > 64 {
        return Err(AppError::BadRequest(
            "Key name must be 1-64 characters".to_string(),
        ));
    }

    let (secret, key_hash) = generate_api_key();
    let now = Utc::now();

    let new_key = api_key::ActiveModel {
        user_id: Set(current.id),
        name: Set(data.name),
        key_hash: Set(key_hash),
        created_at: Set(now),
        last_used_at: Set(None),
        ..Default::default()
    };
    let created = new_key.insert(&state.db).await?;

    state
        .audit
        .log_success(
            AuditAction::ApiKeyCreated,
            ResourceType::ApiKey,
            Some(created.id.to_string()),
            Some(&current),
            Some(serde_json::json!({ "name": created.name })),
        )
        .await;

    Ok(Json(CreatedKeyResponse {
        id: created.id,
        name: created.name,
        key: secret,
        created_at: created.created_at,
    }))
}

/// Delete an own API key
async fn delete_key(
    State(state): State<AppState>,
    Path(key_id): Path<i64>,
    Authenticated(current): Authenticated,
) -> Result<Json<serde_json::Value>> {
    let existing = ApiKey::find_by_id(key_id)
        .one(&state.db)
        .await?
        .filter(|k| k.user_id == current.id)
        .ok_or_else(|| AppError::NotFound("API key not found".to_string()))?;

    ApiKey::delete_by_id(existing.id).exec(&state.db).await?;

    state
        .audit
        .log_success(
            AuditAction::ApiKeyDeleted,
            ResourceType::ApiKey,
            Some(key_id.to_string()),
            Some(&current),
            None,
        )
        .await;

    Ok(Json(serde_json::json!({"message": "API key deleted"})))
}
