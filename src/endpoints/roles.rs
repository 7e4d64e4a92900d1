use axum::{extract::State, routing::get, Json, Router};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use crate::error::Result;
use crate::middleware::permissions::RolesView;
use crate::middleware::Authorized;
use crate::models::prelude::*;
use crate::models::{role, role_permission};
use crate::state::AppState;

/// Create roles routes. The role set is seeded and static; these endpoints
/// exist for the admin console to render assignments and the permission
/// catalog.
pub fn roles_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_roles))
        .route("/permissions", get(list_all_permissions))
        .with_state(state)
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PermissionInfo {
    pub key: String,
    pub category: String,
    pub description: String,
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// List all roles with their permissions (requires roles.view permission)
async fn list_roles(
    State(state): State<AppState>,
    _authorized: Authorized<RolesView>,
) -> Result<Json<Vec<RoleResponse>>> {
    let roles = Role::find()
        .order_by_asc(role::Column::Id)
        .all(&state.db)
        .await?;

    let mut responses = Vec::new();
    for r in roles {
        let perms = RolePermission::find()
            .filter(role_permission::Column::RoleId.eq(r.id))
            .all(&state.db)
            .await?;

        responses.push(RoleResponse {
            id: r.id,
            name: r.name,
            description: r.description,
            is_system: r.is_system,
            created_at: r.created_at,
            permissions: perms.into_iter().map(|p| p.permission).collect(),
        });
    }

    Ok(Json(responses))
}

/// Get all available permissions with descriptions
async fn list_all_permissions(
    _authorized: Authorized<RolesView>,
) -> Result<Json<Vec<PermissionInfo>>> {
    let permissions = vec![
        // Users
        PermissionInfo {
            key: "users.view".to_string(),
            category: "Users".to_string(),
            description: "View user list and details".to_string(),
        },
        PermissionInfo {
            key: "users.manage".to_string(),
            category: "Users".to_string(),
            description: "Create, edit, and delete users".to_string(),
        },
        PermissionInfo {
            key: "users.reset_password".to_string(),
            category: "Users".to_string(),
            description: "Reset other users' passwords".to_string(),
        },
        // Students
        PermissionInfo {
            key: "students.view".to_string(),
            category: "Students".to_string(),
            description: "View student accounts".to_string(),
        },
        PermissionInfo {
            key: "students.manage".to_string(),
            category: "Students".to_string(),
            description: "Create and remove student accounts".to_string(),
        },
        // Activation codes
        PermissionInfo {
            key: "codes.view".to_string(),
            category: "Activation Codes".to_string(),
            description: "View activation codes".to_string(),
        },
        PermissionInfo {
            key: "codes.manage".to_string(),
            category: "Activation Codes".to_string(),
            description: "Create, disable, and delete activation codes".to_string(),
        },
        // Email administration
        PermissionInfo {
            key: "emails.view".to_string(),
            category: "Email Administration".to_string(),
            description: "View all issued emails".to_string(),
        },
        PermissionInfo {
            key: "emails.manage".to_string(),
            category: "Email Administration".to_string(),
            description: "Issue and delete emails on behalf of users".to_string(),
        },
        // Own mailboxes
        PermissionInfo {
            key: "mail.create".to_string(),
            category: "Mail".to_string(),
            description: "Create own temporary emails".to_string(),
        },
        PermissionInfo {
            key: "mail.promote".to_string(),
            category: "Mail".to_string(),
            description: "Promote an own email to permanent".to_string(),
        },
        // Webhooks
        PermissionInfo {
            key: "webhook.manage".to_string(),
            category: "Webhooks".to_string(),
            description: "Configure own webhook".to_string(),
        },
        // Roles
        PermissionInfo {
            key: "roles.view".to_string(),
            category: "Roles".to_string(),
            description: "View roles and permissions".to_string(),
        },
        // Settings
        PermissionInfo {
            key: "settings.view".to_string(),
            category: "Settings".to_string(),
            description: "View system settings".to_string(),
        },
        PermissionInfo {
            key: "settings.manage".to_string(),
            category: "Settings".to_string(),
            description: "Modify system settings".to_string(),
        },
        // Audit
        PermissionInfo {
            key: "audit.view".to_string(),
            category: "Audit".to_string(),
            description: "View audit logs".to_string(),
        },
    ];

    Ok(Json(permissions))
}
