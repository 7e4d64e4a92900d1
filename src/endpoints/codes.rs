use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::permissions::{CodesManage, CodesView};
use crate::middleware::Authorized;
use crate::models::activation_code::CodeStatus;
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::prelude::*;
use crate::models::activation_code;
use crate::services::generate_activation_code;
use crate::state::AppState;

const MAX_BATCH_SIZE: u32 = 100;

/// Create admin activation-code routes
pub fn codes_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_codes).post(create_codes))
        .route("/{code_id}", patch(update_code).delete(delete_code))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListCodesParams {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCodesRequest {
    #[serde(default = "default_batch_count")]
    pub count: u32,
    /// Days until expiry; codes never expire when absent or zero.
    pub expires_in_days: Option<i32>,
}

fn default_batch_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateCodeRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub id: i64,
    pub code: String,
    pub status: String,
    pub created_by_username: Option<String>,
    pub used_by_username: Option<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub used_at: Option<chrono::DateTime<chrono::Utc>>,
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn code_response(state: &AppState, code: activation_code::Model) -> Result<CodeResponse> {
    let created_by = match code.created_by_id {
        Some(id) => User::find_by_id(id).one(&state.db).await?,
        None => None,
    };
    let used_by = match code.used_by_id {
        Some(id) => User::find_by_id(id).one(&state.db).await?,
        None => None,
    };

    Ok(CodeResponse {
        id: code.id,
        code: code.code,
        status: code.status,
        created_by_username: created_by.map(|u| u.username),
        used_by_username: used_by.map(|u| u.username),
        expires_at: code.expires_at,
        created_at: code.created_at,
        used_at: code.used_at,
    })
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// List activation codes (requires codes.view permission)
async fn list_codes(
    State(state): State<AppState>,
    Query(params): Query<ListCodesParams>,
    _authorized: Authorized<CodesView>,
) -> Result<Json<Vec<CodeResponse>>> {
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(100).min(500);

    let mut query = ActivationCode::find().order_by_desc(activation_code::Column::CreatedAt);

    if let Some(ref status) = params.status {
        let parsed = CodeStatus::parse(status)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown status: {}", status)))?;
        query = query.filter(activation_code::Column::Status.eq(parsed.as_str()));
    }

    let codes = query.offset(skip).limit(limit).all(&state.db).await?;

    let mut responses = Vec::new();
    for code in codes {
        responses.push(code_response(&state, code).await?);
    }

    Ok(Json(responses))
}

/// Create a batch of activation codes (requires codes.manage permission)
async fn create_codes(
    State(state): State<AppState>,
    authorized: Authorized<CodesManage>,
    Json(data): Json<CreateCodesRequest>,
) -> Result<Json<Vec<CodeResponse>>> {
    if data.count == 0 || data.count > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_BATCH_SIZE
        )));
    }

    let expires_at = match data.expires_in_days {
        Some(days) if days > 0 => Some(Utc::now() + Duration::days(days as i64)),
        Some(days) if days < 0 => {
            return Err(AppError::BadRequest(
                "expires_in_days must not be negative".to_string(),
            ))
        }
        _ => None,
    };
    let now = Utc::now();

    let mut responses = Vec::new();
    for _ in 0..data.count {
        let new_code = activation_code::ActiveModel {
            code: Set(generate_activation_code()),
            status: Set(CodeStatus::Unused.as_str().to_string()),
            created_by_id: Set(Some(authorized.user_id())),
            expires_at: Set(expires_at),
            created_at: Set(now),
            ..Default::default()
        };
        let created = new_code.insert(&state.db).await?;
        responses.push(code_response(&state, created).await?);
    }

    state
        .audit
        .log_success(
            AuditAction::CodeBatchCreated,
            ResourceType::ActivationCode,
            None,
            Some(authorized.user()),
            Some(serde_json::json!({ "count": data.count })),
        )
        .await;

    Ok(Json(responses))
}

/// Change a code's status (requires codes.manage permission).
/// A used code can only be disabled; nothing reopens a disabled code.
async fn update_code(
    State(state): State<AppState>,
    Path(code_id): Path<i64>,
    authorized: Authorized<CodesManage>,
    Json(data): Json<UpdateCodeRequest>,
) -> Result<Json<CodeResponse>> {
    let target = CodeStatus::parse(&data.status)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown status: {}", data.status)))?;

    let existing = ActivationCode::find_by_id(code_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Activation code not found".to_string()))?;

    let current = CodeStatus::parse(&existing.status)
        .ok_or_else(|| AppError::Internal(format!("Corrupt code status: {}", existing.status)))?;

    if !current.can_transition_to(target) {
        return Err(AppError::BadRequest(format!(
            "Cannot change a {} code to {}",
            current, target
        )));
    }

    let mut code_model: activation_code::ActiveModel = existing.into();
    code_model.status = Set(target.as_str().to_string());
    let updated = code_model.update(&state.db).await?;

    state
        .audit
        .log_success(
            AuditAction::CodeStatusChanged,
            ResourceType::ActivationCode,
            Some(code_id.to_string()),
            Some(authorized.user()),
            Some(serde_json::json!({ "from": current.as_str(), "to": target.as_str() })),
        )
        .await;

    let response = code_response(&state, updated).await?;
    Ok(Json(response))
}

/// Delete an activation code (requires codes.manage permission).
/// Redeemed codes are kept as a record of the account they provisioned.
async fn delete_code(
    State(state): State<AppState>,
    Path(code_id): Path<i64>,
    authorized: Authorized<CodesManage>,
) -> Result<Json<serde_json::Value>> {
    let existing = ActivationCode::find_by_id(code_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Activation code not found".to_string()))?;

    if existing.used_at.is_some() {
        return Err(AppError::BadRequest(
            "Cannot delete a redeemed activation code".to_string(),
        ));
    }

    ActivationCode::delete_by_id(existing.id)
        .exec(&state.db)
        .await?;

    state
        .audit
        .log_success(
            AuditAction::CodeDeleted,
            ResourceType::ActivationCode,
            Some(code_id.to_string()),
            Some(authorized.user()),
            None,
        )
        .await;

    Ok(Json(serde_json::json!({"message": "Activation code deleted"})))
}
