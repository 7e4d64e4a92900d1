use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::permissions::{SettingsManage, SettingsView};
use crate::middleware::Authorized;
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::prelude::*;
use crate::models::system_setting;
use crate::services::settings::validate_setting;
use crate::state::AppState;

/// Create admin settings routes
pub fn settings_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_settings).patch(update_setting))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// List system settings (requires settings.view permission)
async fn list_settings(
    State(state): State<AppState>,
    _authorized: Authorized<SettingsView>,
) -> Result<Json<Vec<SettingResponse>>> {
    let settings = SystemSetting::find().all(&state.db).await?;

    Ok(Json(
        settings
            .into_iter()
            .map(|s| SettingResponse {
                key: s.key,
                value: s.value,
                description: s.description,
                updated_at: s.updated_at,
            })
            .collect(),
    ))
}

/// Update a system setting (requires settings.manage permission)
async fn update_setting(
    State(state): State<AppState>,
    authorized: Authorized<SettingsManage>,
    Json(data): Json<UpdateSettingRequest>,
) -> Result<Json<SettingResponse>> {
    validate_setting(&data.key, &data.value).map_err(AppError::BadRequest)?;

    let now = Utc::now();
    let existing = SystemSetting::find_by_id(&data.key).one(&state.db).await?;

    let saved = if let Some(existing_setting) = existing {
        let mut setting_model: system_setting::ActiveModel = existing_setting.into();
        setting_model.value = Set(data.value.clone());
        setting_model.updated_at = Set(now);
        setting_model.update(&state.db).await?
    } else {
        let new_setting = system_setting::ActiveModel {
            key: Set(data.key.clone()),
            value: Set(data.value.clone()),
            description: Set(None),
            updated_at: Set(now),
        };
        new_setting.insert(&state.db).await?
    };

    state
        .audit
        .log_success(
            AuditAction::SettingChanged,
            ResourceType::System,
            Some(saved.key.clone()),
            Some(authorized.user()),
            Some(serde_json::json!({ "value": saved.value })),
        )
        .await;

    Ok(Json(SettingResponse {
        key: saved.key,
        value: saved.value,
        description: saved.description,
        updated_at: saved.updated_at,
    }))
}
