use axum::{
    extract::{Extension, Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::permissions::{EmailsView, MailCreate, MailPromote};
use crate::middleware::{AuthenticatedUser, Authorized};
use crate::models::audit_log::{AuditAction, ResourceType};
use crate::models::prelude::*;
use crate::models::{email, message};
use crate::services::webhook::WebhookEvent;
use crate::services::{address, settings};
use crate::state::AppState;

const RANDOM_ADDRESS_ATTEMPTS: usize = 5;

/// Create self-service email routes
pub fn emails_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_emails).post(create_email))
        .route("/{email_id}", delete(delete_email))
        .route("/{email_id}/promote", post(promote_email))
        .route("/{email_id}/messages", get(list_messages))
        .route("/{email_id}/messages/{message_id}", get(get_message))
        .with_state(state)
}

/// Create admin email routes (view over every user's mailboxes)
pub fn admin_emails_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(admin_list_emails))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListEmailsParams {
    #[serde(default)]
    pub include_expired: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdminListEmailsParams {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEmailRequest {
    /// Requested local part; a random one is generated when absent.
    pub local_part: Option<String>,
    /// Lifetime override in hours; the system default applies when absent.
    pub ttl_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EmailResponse {
    pub id: i64,
    pub user_id: i64,
    pub address: String,
    pub is_permanent: bool,
    pub is_expired: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl EmailResponse {
    fn from_model(model: email::Model) -> Self {
        let now = Utc::now();
        Self {
            id: model.id,
            user_id: model.user_id,
            address: model.address.clone(),
            is_permanent: model.is_permanent,
            is_expired: model.is_expired(now),
            created_at: model.created_at,
            expires_at: model.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub email_id: i64,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl MessageResponse {
    fn from_model(model: message::Model) -> Self {
        Self {
            id: model.id,
            email_id: model.email_id,
            sender: model.sender,
            subject: model.subject,
            body: model.body,
            received_at: model.received_at,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Fetch an email the caller may read: their own, or any if they hold
/// `fallback_permission`. Others' emails stay a 404, not a 403.
async fn load_readable_email(
    state: &AppState,
    auth_user: &AuthenticatedUser,
    email_id: i64,
    fallback_permission: &str,
) -> Result<email::Model> {
    let found = Email::find_by_id(email_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;

    if found.user_id == auth_user.user.id || auth_user.has_permission(fallback_permission) {
        Ok(found)
    } else {
        Err(AppError::NotFound("Email not found".to_string()))
    }
}

/// Count a user's live (permanent or not yet expired) emails
async fn count_live_emails(state: &AppState, user_id: i64) -> Result<u64> {
    let now = Utc::now();
    let count = Email::find()
        .filter(email::Column::UserId.eq(user_id))
        .filter(
            Condition::any()
                .add(email::Column::IsPermanent.eq(true))
                .add(email::Column::ExpiresAt.gt(now)),
        )
        .count(&state.db)
        .await?;
    Ok(count)
}

async fn address_taken(state: &AppState, full_address: &str) -> Result<bool> {
    Ok(Email::find()
        .filter(email::Column::Address.eq(full_address))
        .one(&state.db)
        .await?
        .is_some())
}

/// Resolve the address for a new email: validate a requested local part, or
/// generate random ones until a free address is found.
pub(crate) async fn resolve_new_address(
    state: &AppState,
    requested: Option<&str>,
) -> Result<String> {
    if let Some(local_part) = requested {
        address::validate_local_part(local_part)?;
        let full = address::compose_address(local_part);
        if address_taken(state, &full).await? {
            return Err(AppError::Conflict(
                "Email address already exists".to_string(),
            ));
        }
        return Ok(full);
    }

    for _ in 0..RANDOM_ADDRESS_ATTEMPTS {
        let full = address::compose_address(&address::random_local_part());
        if !address_taken(state, &full).await? {
            return Ok(full);
        }
    }

    Err(AppError::Internal(
        "Could not allocate a free address".to_string(),
    ))
}

/// Insert an email row. Shared by the self-service and admin issuance paths.
pub(crate) async fn insert_email(
    state: &AppState,
    owner_id: i64,
    full_address: String,
    is_permanent: bool,
    ttl_hours: i64,
) -> Result<email::Model> {
    let now = Utc::now();
    let expires_at = if is_permanent {
        address::permanent_expiry()
    } else {
        now + Duration::hours(ttl_hours)
    };

    let new_email = email::ActiveModel {
        user_id: Set(owner_id),
        address: Set(full_address),
        is_permanent: Set(is_permanent),
        created_at: Set(now),
        expires_at: Set(expires_at),
        ..Default::default()
    };
    Ok(new_email.insert(&state.db).await?)
}

/// Delete an email together with its messages, atomically
pub(crate) async fn delete_email_cascading(state: &AppState, email_id: i64) -> Result<()> {
    let txn = state.db.begin().await?;

    Message::delete_many()
        .filter(message::Column::EmailId.eq(email_id))
        .exec(&txn)
        .await?;

    Email::delete_by_id(email_id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// List own emails; expired ones are hidden unless requested
async fn list_emails(
    State(state): State<AppState>,
    Query(params): Query<ListEmailsParams>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<EmailResponse>>> {
    let now = Utc::now();

    let mut query = Email::find()
        .filter(email::Column::UserId.eq(auth_user.user.id))
        .order_by_desc(email::Column::CreatedAt);

    if !params.include_expired {
        query = query.filter(
            Condition::any()
                .add(email::Column::IsPermanent.eq(true))
                .add(email::Column::ExpiresAt.gt(now)),
        );
    }

    let emails = query.all(&state.db).await?;

    Ok(Json(
        emails.into_iter().map(EmailResponse::from_model).collect(),
    ))
}

/// Create a temporary email (requires mail.create permission)
async fn create_email(
    State(state): State<AppState>,
    authorized: Authorized<MailCreate>,
    Json(data): Json<CreateEmailRequest>,
) -> Result<Json<EmailResponse>> {
    let owner = authorized.user().clone();

    let max = settings::max_emails_per_user(&state.db).await?;
    if count_live_emails(&state, owner.id).await? >= max {
        return Err(AppError::BadRequest(format!(
            "Email limit reached ({} live emails per user)",
            max
        )));
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
    let created = insert_email(&state, owner.id, full_address, false, ttl_hours).await?;

    state
        .audit
        .log_success(
            AuditAction::EmailCreated,
            ResourceType::Email,
            Some(created.id.to_string()),
            Some(&owner),
            Some(serde_json::json!({ "address": created.address })),
        )
        .await;

    state.webhooks.notify(
        owner.id,
        WebhookEvent::EmailCreated,
        serde_json::json!({
            "email_id": created.id,
            "address": created.address,
            "expires_at": created.expires_at,
        }),
    );

    Ok(Json(EmailResponse::from_model(created)))
}

/// Delete an owned email (admins with emails.manage may delete any);
/// contained messages go with it
async fn delete_email(
    State(state): State<AppState>,
    Path(email_id): Path<i64>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<serde_json::Value>> {
    // Owners may delete their own emails; anyone else needs emails.manage
    let found = load_readable_email(&state, &auth_user, email_id, "emails.manage").await?;

    delete_email_cascading(&state, found.id).await?;

    state
        .audit
        .log_success(
            AuditAction::EmailDeleted,
            ResourceType::Email,
            Some(found.id.to_string()),
            Some(&auth_user.user),
            Some(serde_json::json!({ "address": found.address })),
        )
        .await;

    Ok(Json(serde_json::json!({"message": "Email deleted"})))
}

/// Promote an owned email to permanent (requires mail.promote permission)
async fn promote_email(
    State(state): State<AppState>,
    Path(email_id): Path<i64>,
    authorized: Authorized<MailPromote>,
) -> Result<Json<EmailResponse>> {
    let owner = authorized.user().clone();
    let now = Utc::now();

    let found = Email::find_by_id(email_id)
        .one(&state.db)
        .await?
        .filter(|e| e.user_id == owner.id)
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;

    if found.is_permanent {
        return Err(AppError::BadRequest(
            "Email is already permanent".to_string(),
        ));
    }
    if found.is_expired(now) {
        return Err(AppError::BadRequest(
            "Cannot promote an expired email".to_string(),
        ));
    }

    let has_permanent = Email::find()
        .filter(email::Column::UserId.eq(owner.id))
        .filter(email::Column::IsPermanent.eq(true))
        .one(&state.db)
        .await?
        .is_some();
    if has_permanent {
        return Err(AppError::Conflict(
            "A permanent email already exists for this account".to_string(),
        ));
    }

    let mut promote: email::ActiveModel = found.into();
    promote.is_permanent = Set(true);
    promote.expires_at = Set(address::permanent_expiry());
    let updated = promote.update(&state.db).await?;

    state
        .audit
        .log_success(
            AuditAction::EmailPromoted,
            ResourceType::Email,
            Some(updated.id.to_string()),
            Some(&owner),
            Some(serde_json::json!({ "address": updated.address })),
        )
        .await;

    state.webhooks.notify(
        owner.id,
        WebhookEvent::EmailPromoted,
        serde_json::json!({ "email_id": updated.id, "address": updated.address }),
    );

    Ok(Json(EmailResponse::from_model(updated)))
}

/// List messages of an owned email (emails.view may read any)
async fn list_messages(
    State(state): State<AppState>,
    Path(email_id): Path<i64>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<MessageResponse>>> {
    let found = load_readable_email(&state, &auth_user, email_id, "emails.view").await?;

    let messages = Message::find()
        .filter(message::Column::EmailId.eq(found.id))
        .order_by_desc(message::Column::ReceivedAt)
        .all(&state.db)
        .await?;

    Ok(Json(
        messages
            .into_iter()
            .map(MessageResponse::from_model)
            .collect(),
    ))
}

/// Fetch a single message of an owned email
async fn get_message(
    State(state): State<AppState>,
    Path((email_id, message_id)): Path<(i64, i64)>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<MessageResponse>> {
    let found = load_readable_email(&state, &auth_user, email_id, "emails.view").await?;

    let msg = Message::find_by_id(message_id)
        .one(&state.db)
        .await?
        .filter(|m| m.email_id == found.id)
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    Ok(Json(MessageResponse::from_model(msg)))
}

/// List all issued emails (requires emails.view permission)
async fn admin_list_emails(
    State(state): State<AppState>,
    Query(params): Query<AdminListEmailsParams>,
    _authorized: Authorized<EmailsView>,
) -> Result<Json<Vec<EmailResponse>>> {
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(100).min(500);

    let mut query = Email::find().order_by_desc(email::Column::CreatedAt);

    if let Some(ref search) = params.search {
        query = query.filter(email::Column::Address.contains(search));
    }
    if let Some(user_id) = params.user_id {
        query = query.filter(email::Column::UserId.eq(user_id));
    }

    let emails = query.offset(skip).limit(limit).all(&state.db).await?;

    Ok(Json(
        emails.into_iter().map(EmailResponse::from_model).collect(),
    ))
}
