use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub timestamp: DateTimeUtc,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub details: Option<String>, // JSON string for flexible data
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// Audit action types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditAction {
    // Authentication
    Login,
    LoginFailed,
    Logout,
    TokenRefresh,
    Registered,
    PasswordChanged,
    PasswordReset,

    // User management
    UserCreated,
    UserUpdated,
    UserDeleted,
    UserEnabled,
    UserDisabled,

    // Students
    StudentCreated,
    StudentRemoved,

    // Email lifecycle
    EmailCreated,
    EmailIssued,
    EmailDeleted,
    EmailPromoted,

    // Activation codes
    CodeBatchCreated,
    CodeRedeemed,
    CodeStatusChanged,
    CodeDeleted,

    // Webhooks
    WebhookUpdated,
    WebhookDeleted,

    // API keys
    ApiKeyCreated,
    ApiKeyDeleted,

    // System
    SettingChanged,
    OauthUnlinked,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::TokenRefresh => "token_refresh",
            AuditAction::Registered => "registered",
            AuditAction::PasswordChanged => "password_changed",
            AuditAction::PasswordReset => "password_reset",
            AuditAction::UserCreated => "user_created",
            AuditAction::UserUpdated => "user_updated",
            AuditAction::UserDeleted => "user_deleted",
            AuditAction::UserEnabled => "user_enabled",
            AuditAction::UserDisabled => "user_disabled",
            AuditAction::StudentCreated => "student_created",
            AuditAction::StudentRemoved => "student_removed",
            AuditAction::EmailCreated => "email_created",
            AuditAction::EmailIssued => "email_issued",
            AuditAction::EmailDeleted => "email_deleted",
            AuditAction::EmailPromoted => "email_promoted",
            AuditAction::CodeBatchCreated => "code_batch_created",
            AuditAction::CodeRedeemed => "code_redeemed",
            AuditAction::CodeStatusChanged => "code_status_changed",
            AuditAction::CodeDeleted => "code_deleted",
            AuditAction::WebhookUpdated => "webhook_updated",
            AuditAction::WebhookDeleted => "webhook_deleted",
            AuditAction::ApiKeyCreated => "api_key_created",
            AuditAction::ApiKeyDeleted => "api_key_deleted",
            AuditAction::SettingChanged => "setting_changed",
            AuditAction::OauthUnlinked => "oauth_unlinked",
        };
        write!(f, "{}", s)
    }
}

// Resource types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResourceType {
    User,
    Role,
    Email,
    ActivationCode,
    Webhook,
    ApiKey,
    System,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceType::User => "user",
            ResourceType::Role => "role",
            ResourceType::Email => "email",
            ResourceType::ActivationCode => "activation_code",
            ResourceType::Webhook => "webhook",
            ResourceType::ApiKey => "api_key",
            ResourceType::System => "system",
        };
        write!(f, "{}", s)
    }
}
