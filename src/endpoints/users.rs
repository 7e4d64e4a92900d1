use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};

use crate::endpoints::emails::{insert_email, resolve_new_address};
use crate::endpoints::extractors::get_user_permissions;
use crate::error::{AppError, Result};
use crate::middleware::permissions::{
    EmailsManage, EmailsView, UsersManage, UsersResetPassword, UsersView,
};
use crate::middleware::{Authenticated, Authorized};
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::prelude::*;
use crate::models::{
    activation_code, api_key, email, message, oauth_account, role, user, user_role, webhook,
};
use crate::services::{hash_password, settings, verify_password};
use crate::state::AppState;

/// Create routes for the current user's own account
pub fn users_routes(state: AppState) -> Router {
    Router::new()
        .route("/me", get(get_current_user_info))
        .route("/me/password", patch(change_own_password))
        .route("/me/oauth", get(list_my_oauth_accounts))
        .route("/me/oauth/{account_id}", delete(unlink_oauth_account))
        .with_state(state)
}

/// Create admin user management routes
pub fn admin_users_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{user_id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/{user_id}/password", patch(admin_reset_password))
        .route(
            "/{user_id}/emails",
            get(list_user_emails).post(issue_email),
        )
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub enabled: Option<bool>,
    pub role_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeOwnPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueEmailRequest {
    pub local_part: Option<String>,
    #[serde(default)]
    pub is_permanent: bool,
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RoleInfo {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub enabled: bool,
    pub has_password: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub roles: Vec<RoleInfo>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OauthAccountResponse {
    pub id: i64,
    pub provider: String,
    pub display_name: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct IssuedEmailResponse {
    pub id: i64,
    pub address: String,
    pub is_permanent: bool,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn get_user_with_roles(state: &AppState, user_id: i64) -> Result<UserResponse> {
    let found_user = User::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    // Get user's roles via the junction table
    let roles: Vec<role::Model> = Role::find()
        .inner_join(UserRole)
        .filter(user_role::Column::UserId.eq(user_id))
        .all(&state.db)
        .await?;

    let permissions = get_user_permissions(&state.db, user_id).await;

    Ok(UserResponse {
        id: found_user.id,
        username: found_user.username,
        enabled: found_user.enabled,
        has_password: found_user.password_hash.is_some(),
        created_at: found_user.created_at,
        updated_at: found_user.updated_at,
        roles: roles
            .into_iter()
            .map(|r| RoleInfo {
                id: r.id,
                name: r.name,
                description: r.description,
            })
            .collect(),
        permissions,
    })
}

// ============================================================================
// Current User Endpoints
// ============================================================================

/// Get current user info
async fn get_current_user_info(
    State(state): State<AppState>,
    Authenticated(current): Authenticated,
) -> Result<Json<UserResponse>> {
    let response = get_user_with_roles(&state, current.id).await?;
    Ok(Json(response))
}

/// Change own password (requires current password)
async fn change_own_password(
    State(state): State<AppState>,
    Authenticated(current): Authenticated,
    Json(data): Json<ChangeOwnPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    if data.new_password.len() < 8 {
        return Err(AppError::BadRequest(
            "New password must be at least 8 characters".to_string(),
        ));
    }

    // Get fresh user data to verify current password
    let user_record = User::find_by_id(current.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let current_hash = user_record.password_hash.as_deref().ok_or_else(|| {
        AppError::BadRequest("This account has no password set".to_string())
    })?;

    if !verify_password(&data.current_password, current_hash) {
        return Err(AppError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let hashed = hash_password(&data.new_password)?;
    let now = Utc::now();

    let mut user_model: user::ActiveModel = user_record.into();
    user_model.password_hash = Set(Some(hashed));
    user_model.updated_at = Set(now);
    user_model.update(&state.db).await?;

    state
        .audit
        .log_success(
            AuditAction::PasswordChanged,
            ResourceType::User,
            Some(current.id.to_string()),
            Some(&current),
            None,
        )
        .await;

    Ok(Json(
        serde_json::json!({"message": "Password changed successfully"}),
    ))
}

/// List linked provider accounts
async fn list_my_oauth_accounts(
    State(state): State<AppState>,
    Authenticated(current): Authenticated,
) -> Result<Json<Vec<OauthAccountResponse>>> {
    let accounts = OauthAccount::find()
        .filter(oauth_account::Column::UserId.eq(current.id))
        .all(&state.db)
        .await?;

    Ok(Json(
        accounts
            .into_iter()
            .map(|a| OauthAccountResponse {
                id: a.id,
                provider: a.provider,
                display_name: a.display_name,
                created_at: a.created_at,
            })
            .collect(),
    ))
}

/// Unlink a provider account. A passwordless account keeps its last link,
/// otherwise it could never sign in again.
async fn unlink_oauth_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Authenticated(current): Authenticated,
) -> Result<Json<serde_json::Value>> {
    let account = OauthAccount::find_by_id(account_id)
        .one(&state.db)
        .await?
        .filter(|a| a.user_id == current.id)
        .ok_or_else(|| AppError::NotFound("Linked account not found".to_string()))?;

    if current.password_hash.is_none() {
        let link_count = OauthAccount::find()
            .filter(oauth_account::Column::UserId.eq(current.id))
            .count(&state.db)
            .await?;
        if link_count <= 1 {
            return Err(AppError::BadRequest(
                "Cannot unlink the only credential of a passwordless account".to_string(),
            ));
        }
    }

    let provider = account.provider.clone();
    OauthAccount::delete_by_id(account.id).exec(&state.db).await?;

    state
        .audit
        .log_success(
            AuditAction::OauthUnlinked,
            ResourceType::User,
            Some(current.id.to_string()),
            Some(&current),
            Some(serde_json::json!({ "provider": provider })),
        )
        .await;

    Ok(Json(serde_json::json!({"message": "Account unlinked"})))
}

// ============================================================================
// Admin Endpoints
// ============================================================================

/// List all users (requires users.view permission)
async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    _authorized: Authorized<UsersView>,
) -> Result<Json<Vec<UserResponse>>> {
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(100).min(500);

    let mut query = User::find().order_by_asc(user::Column::Id);

    if let Some(ref search) = params.search {
        query = query.filter(user::Column::Username.contains(search));
    }
    if let Some(enabled) = params.enabled {
        query = query.filter(user::Column::Enabled.eq(enabled));
    }

    let users = query.offset(skip).limit(limit).all(&state.db).await?;

    let mut responses = Vec::new();
    for u in users {
        responses.push(get_user_with_roles(&state, u.id).await?);
    }

    Ok(Json(responses))
}

/// Create a new user (requires users.manage permission)
async fn create_user(
    State(state): State<AppState>,
    authorized: Authorized<UsersManage>,
    Json(data): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>> {
    if data.username.len() < 3 || data.username.len() > 32 {
        return Err(AppError::BadRequest(
            "Username must be 3-32 characters".to_string(),
        ));
    }
    if data.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let existing = User::find()
        .filter(user::Column::Username.eq(&data.username))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let hashed = hash_password(&data.password)?;
    let now = Utc::now();

    let new_user = user::ActiveModel {
        username: Set(data.username),
        password_hash: Set(Some(hashed)),
        enabled: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created_user = new_user.insert(&state.db).await?;

    // Assign roles
    for role_id in &data.role_ids {
        let user_role_model = user_role::ActiveModel {
            user_id: Set(created_user.id),
            role_id: Set(*role_id),
        };
        user_role_model.insert(&state.db).await?;
    }

    state
        .audit
        .log_success(
            AuditAction::UserCreated,
            ResourceType::User,
            Some(created_user.id.to_string()),
            Some(authorized.user()),
            Some(serde_json::json!({ "username": created_user.username })),
        )
        .await;

    let response = get_user_with_roles(&state, created_user.id).await?;
    Ok(Json(response))
}

/// Get user by ID (requires users.view permission)
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    _authorized: Authorized<UsersView>,
) -> Result<Json<UserResponse>> {
    let response = get_user_with_roles(&state, user_id).await?;
    Ok(Json(response))
}

/// Update user (requires users.manage permission).
/// Covers the enable/disable toggle and role assignment.
async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    authorized: Authorized<UsersManage>,
    Json(data): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    let existing_user = User::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if data.enabled == Some(false) && user_id == authorized.user_id() {
        return Err(AppError::BadRequest(
            "Cannot disable yourself".to_string(),
        ));
    }

    let enabled_change = data
        .enabled
        .filter(|e| *e != existing_user.enabled);

    let now = Utc::now();
    let mut user_model: user::ActiveModel = existing_user.into();

    if let Some(enabled) = data.enabled {
        user_model.enabled = Set(enabled);
    }
    user_model.updated_at = Set(now);
    user_model.update(&state.db).await?;

    // Update roles if provided
    if let Some(role_ids) = &data.role_ids {
        UserRole::delete_many()
            .filter(user_role::Column::UserId.eq(user_id))
            .exec(&state.db)
            .await?;

        for role_id in role_ids {
            let user_role_model = user_role::ActiveModel {
                user_id: Set(user_id),
                role_id: Set(*role_id),
            };
            user_role_model.insert(&state.db).await?;
        }
    }

    let action = match enabled_change {
        Some(true) => AuditAction::UserEnabled,
        Some(false) => AuditAction::UserDisabled,
        None => AuditAction::UserUpdated,
    };
    state
        .audit
        .log_success(
            action,
            ResourceType::User,
            Some(user_id.to_string()),
            Some(authorized.user()),
            None,
        )
        .await;

    let response = get_user_with_roles(&state, user_id).await?;
    Ok(Json(response))
}

/// Delete a user with cascading cleanup (requires users.manage permission).
/// Emails, messages, API keys, webhook, provider links and role assignments
/// are removed in one transaction; redeemed activation codes are detached.
async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    authorized: Authorized<UsersManage>,
) -> Result<Json<serde_json::Value>> {
    if user_id == authorized.user_id() {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let existing_user = User::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let txn = state.db.begin().await?;

    let email_ids: Vec<i64> = Email::find()
        .filter(email::Column::UserId.eq(user_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();

    if !email_ids.is_empty() {
        Message::delete_many()
            .filter(message::Column::EmailId.is_in(email_ids))
            .exec(&txn)
            .await?;
    }

    Email::delete_many()
        .filter(email::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    ApiKey::delete_many()
        .filter(api_key::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    Webhook::delete_many()
        .filter(webhook::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    OauthAccount::delete_many()
        .filter(oauth_account::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    UserRole::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    // Redeemed codes survive; their back-reference is detached
    ActivationCode::update_many()
        .col_expr(activation_code::Column::UsedById, Expr::value(None::<i64>))
        .filter(activation_code::Column::UsedById.eq(user_id))
        .exec(&txn)
        .await?;

    ActivationCode::update_many()
        .col_expr(
            activation_code::Column::CreatedById,
            Expr::value(None::<i64>),
        )
        .filter(activation_code::Column::CreatedById.eq(user_id))
        .exec(&txn)
        .await?;

    User::delete_by_id(user_id).exec(&txn).await?;

    txn.commit().await?;

    state
        .audit
        .log_success(
            AuditAction::UserDeleted,
            ResourceType::User,
            Some(user_id.to_string()),
            Some(authorized.user()),
            Some(serde_json::json!({ "username": existing_user.username })),
        )
        .await;

    Ok(Json(serde_json::json!({"message": "User deleted"})))
}

/// Admin reset password for another user (requires users.reset_password permission)
async fn admin_reset_password(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    authorized: Authorized<UsersResetPassword>,
    Json(data): Json<AdminResetPasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    // Prevent admin from resetting their own password via this endpoint
    if user_id == authorized.user_id() {
        return Err(AppError::BadRequest(
            "Use /api/users/me/password to change your own password".to_string(),
        ));
    }

    if data.new_password.len() < 8 {
        return Err(AppError::BadRequest(
            "New password must be at least 8 characters".to_string(),
        ));
    }

    let user_record = User::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let hashed = hash_password(&data.new_password)?;
    let now = Utc::now();

    let mut user_model: user::ActiveModel = user_record.into();
    user_model.password_hash = Set(Some(hashed));
    user_model.updated_at = Set(now);
    user_model.update(&state.db).await?;

    state
        .audit
        .log_success(
            AuditAction::PasswordReset,
            ResourceType::User,
            Some(user_id.to_string()),
            Some(authorized.user()),
            None,
        )
        .await;

    Ok(Json(
        serde_json::json!({"message": "Password reset successfully"}),
    ))
}

/// List a user's emails (requires emails.view permission)
async fn list_user_emails(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    _authorized: Authorized<EmailsView>,
) -> Result<Json<Vec<IssuedEmailResponse>>> {
    let _ = User::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let emails = Email::find()
        .filter(email::Column::UserId.eq(user_id))
        .order_by_desc(email::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(
        emails
            .into_iter()
            .map(|e| IssuedEmailResponse {
                id: e.id,
                address: e.address,
                is_permanent: e.is_permanent,
                expires_at: e.expires_at,
            })
            .collect(),
    ))
}

/// Issue an email to a user (requires emails.manage permission)
async fn issue_email(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    authorized: Authorized<EmailsManage>,
    Json(data): Json<IssueEmailRequest>,
) -> Result<Json<IssuedEmailResponse>> {
    let target = User::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if data.is_permanent {
        let has_permanent = Email::find()
            .filter(email::Column::UserId.eq(target.id))
            .filter(email::Column::IsPermanent.eq(true))
            .one(&state.db)
            .await?
            .is_some();
        if has_permanent {
            return Err(AppError::Conflict(
                "A permanent email already exists for this account".to_string(),
            ));
        }
    }

    let ttl_hours = match data.ttl_hours {
        Some(h) if (1..=720).contains(&h) => h,
        Some(_) => {
            return Err(AppError::BadRequest(
                "ttl_hours must be between 1 and 720".to_string(),
            ))
        }
        None => settings::temp_email_ttl_hours(&state.db).await?,
    };

    let full_address = resolve_new_address(&state, data.local_part.as_deref()).await?;
    let created = insert_email(&state, target.id, full_address, data.is_permanent, ttl_hours).await?;

    state
        .audit
        .log_success(
            AuditAction::EmailIssued,
            ResourceType::Email,
            Some(created.id.to_string()),
            Some(authorized.user()),
            Some(serde_json::json!({
                "address": created.address,
                "target_user_id": target.id,
            })),
        )
        .await;

    Ok(Json(IssuedEmailResponse {
        id: created.id,
        address: created.address,
        is_permanent: created.is_permanent,
        expires_at: created.expires_at,
    }))
}
