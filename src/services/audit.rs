use sea_orm::{ActiveModelTrait, Set};

use crate::error::Result;
use crate::models::audit_log::{self, AuditAction, ResourceType};
use crate::models::user;
use crate::state::DbConn;

/// Audit service for logging administrative and authentication events
#[derive(Clone)]
pub struct AuditService {
    db: DbConn,
}

impl AuditService {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    /// Log an audit event
    pub async fn log(
        &self,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: Option<String>,
        actor: Option<&user::Model>,
        details: Option<serde_json::Value>,
        success: bool,
        error_message: Option<String>,
    ) -> Result<()> {
        let now = chrono::Utc::now();
        let details_str = details.map(|d| d.to_string());

        let log_entry = audit_log::ActiveModel {
            timestamp: Set(now),
            user_id: Set(actor.map(|u| u.id)),
            username: Set(actor.map(|u| u.username.clone())),
            action: Set(action.to_string()),
            resource_type: Set(resource_type.to_string()),
            resource_id: Set(resource_id),
            details: Set(details_str),
            success: Set(success),
            error_message: Set(error_message),
            ..Default::default()
        };

        log_entry.insert(&self.db).await?;
        Ok(())
    }

    /// Log a successful action; failures to write the log are swallowed
    /// with a warning so they never fail the request itself.
    pub async fn log_success(
        &self,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: Option<String>,
        actor: Option<&user::Model>,
        details: Option<serde_json::Value>,
    ) {
        if let Err(e) = self
            .log(action, resource_type, resource_id, actor, details, true, None)
            .await
        {
            tracing::warn!("Failed to write audit log: {}", e);
        }
    }

    /// Log a failed action
    pub async fn log_failure(
        &self,
        action: AuditAction,
        resource_type: ResourceType,
        resource_id: Option<String>,
        actor: Option<&user::Model>,
        error: &str,
    ) {
        if let Err(e) = self
            .log(
                action,
                resource_type,
                resource_id,
                actor,
                None,
                false,
                Some(error.to_string()),
            )
            .await
        {
            tracing::warn!("Failed to write audit log: {}", e);
        }
    }
}
