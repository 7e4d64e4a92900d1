use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::permissions::WebhookManage;
use crate::middleware::Authorized;
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::prelude::*;
use crate::models::webhook;
use crate::state::AppState;

/// Create webhook configuration routes (one webhook per user)
pub fn webhook_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(get_webhook).put(set_webhook).delete(delete_webhook),
        )
        .route("/test", post(test_webhook))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetWebhookRequest {
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub url: String,
    pub enabled: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl WebhookResponse {
    fn from_model(model: webhook::Model) -> Self {
        Self {
            url: model.url,
            enabled: model.enabled,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn validate_webhook_url(url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::BadRequest(
            "Webhook URL must start with http:// or https://".to_string(),
        ));
    }
    if url.len() > 2048 {
        return Err(AppError::BadRequest("Webhook URL too long".to_string()));
    }
    Ok(())
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// Get own webhook configuration (requires webhook.manage permission)
async fn get_webhook(
    State(state): State<AppState>,
    authorized: Authorized<WebhookManage>,
) -> Result<Json<Option<WebhookResponse>>> {
    let hook = Webhook::find_by_id(authorized.user_id())
        .one(&state.db)
        .await?;

    Ok(Json(hook.map(WebhookResponse::from_model)))
}

/// Create or update own webhook (requires webhook.manage permission)
async fn set_webhook(
    State(state): State<AppState>,
    authorized: Authorized<WebhookManage>,
    Json(data): Json<SetWebhookRequest>,
) -> Result<Json<WebhookResponse>> {
    validate_webhook_url(&data.url)?;

    let now = Utc::now();
    let existing = Webhook::find_by_id(authorized.user_id())
        .one(&state.db)
        .await?;

    let saved = if let Some(existing_hook) = existing {
        let mut hook_model: webhook::ActiveModel = existing_hook.into();
        hook_model.url = Set(data.url);
        hook_model.enabled = Set(data.enabled);
        hook_model.updated_at = Set(now);
        hook_model.update(&state.db).await?
    } else {
        let new_hook = webhook::ActiveModel {
            user_id: Set(authorized.user_id()),
            url: Set(data.url),
            enabled: Set(data.enabled),
            created_at: Set(now),
            updated_at: Set(now),
        };
        new_hook.insert(&state.db).await?
    };

    state
        .audit
        .log_success(
            AuditAction::WebhookUpdated,
            ResourceType::Webhook,
            Some(authorized.user_id().to_string()),
            Some(authorized.user()),
            Some(serde_json::json!({ "url": saved.url, "enabled": saved.enabled })),
        )
        .await;

    Ok(Json(WebhookResponse::from_model(saved)))
}

/// Delete own webhook (requires webhook.manage permission)
async fn delete_webhook(
    State(state): State<AppState>,
    authorized: Authorized<WebhookManage>,
) -> Result<Json<serde_json::Value>> {
    let existing = Webhook::find_by_id(authorized.user_id())
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("No webhook configured".to_string()))?;

    Webhook::delete_by_id(existing.user_id)
        .exec(&state.db)
        .await?;

    state
        .audit
        .log_success(
            AuditAction::WebhookDeleted,
            ResourceType::Webhook,
            Some(authorized.user_id().to_string()),
            Some(authorized.user()),
            None,
        )
        .await;

    Ok(Json(serde_json::json!({"message": "Webhook deleted"})))
}

/// Fire a test delivery to own webhook (requires webhook.manage permission)
async fn test_webhook(
    State(state): State<AppState>,
    authorized: Authorized<WebhookManage>,
) -> Result<Json<serde_json::Value>> {
    let status = state.webhooks.send_test(authorized.user_id()).await?;

    Ok(Json(serde_json::json!({
        "message": "Test delivery sent",
        "response_status": status,
    })))
}
