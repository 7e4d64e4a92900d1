use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::middleware::permissions::AuditView;
use crate::middleware::Authorized;
use crate::models::audit_log;
use crate::models::prelude::*;
use crate::state::AppState;

/// Create admin audit log routes
pub fn audit_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_audit_logs))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct AuditListParams {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub action: Option<String>,
    pub user_id: Option<i64>,
    pub resource_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub id: i64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// List audit logs, newest first (requires audit.view permission)
async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<AuditListParams>,
    _authorized: Authorized<AuditView>,
) -> Result<Json<Vec<AuditLogResponse>>> {
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(100).min(500);

    let mut query = AuditLog::find().order_by_desc(audit_log::Column::Timestamp);

    if let Some(ref action) = params.action {
        query = query.filter(audit_log::Column::Action.eq(action));
    }
    if let Some(user_id) = params.user_id {
        query = query.filter(audit_log::Column::UserId.eq(user_id));
    }
    if let Some(ref resource_type) = params.resource_type {
        query = query.filter(audit_log::Column::ResourceType.eq(resource_type));
    }

    let logs = query.offset(skip).limit(limit).all(&state.db).await?;

    Ok(Json(
        logs.into_iter()
            .map(|l| AuditLogResponse {
                id: l.id,
                timestamp: l.timestamp,
                user_id: l.user_id,
                username: l.username,
                action: l.action,
                resource_type: l.resource_type,
                resource_id: l.resource_id,
                details: l.details,
                success: l.success,
                error_message: l.error_message,
            })
            .collect(),
    ))
}
