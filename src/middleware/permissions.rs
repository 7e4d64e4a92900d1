//! Permission system with type-safe authorization extractors
//!
//! Usage in handlers:
//! ```ignore
//! use crate::middleware::{Authorized, permissions::*};
//!
//! async fn list_users(
//!     Authorized(user): Authorized<UsersView>,
//!     State(state): State<AppState>,
//! ) -> Result<Json<Vec<UserResponse>>> {
//!     // Permission already verified - just use user
//! }
//! ```

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::models::user;

/// Trait for permission marker types
pub trait Permission: Send + Sync + 'static {
    /// The permission string (e.g., "users.view")
    const NAME: &'static str;
}

/// Macro to define permission types
///
/// Creates zero-sized marker types that implement `Permission`
macro_rules! define_permissions {
    ($($(#[$meta:meta])* $name:ident => $perm:expr),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $name;

            impl Permission for $name {
                const NAME: &'static str = $perm;
            }
        )*
    };
}

// Define all application permissions
define_permissions! {
    // User management
    /// View users list and details
    UsersView => "users.view",
    /// Create, update, delete users
    UsersManage => "users.manage",
    /// Reset other users' passwords
    UsersResetPassword => "users.reset_password",

    // Student management
    /// View student accounts
    StudentsView => "students.view",
    /// Create and remove student accounts
    StudentsManage => "students.manage",

    // Activation codes
    /// View activation codes
    CodesView => "codes.view",
    /// Create, disable and delete activation codes
    CodesManage => "codes.manage",

    // Email administration (any user's mailboxes)
    /// View all issued emails
    EmailsView => "emails.view",
    /// Issue and delete emails on behalf of users
    EmailsManage => "emails.manage",

    // Own mailboxes
    /// Create own temporary emails
    MailCreate => "mail.create",
    /// Promote an own email to permanent
    MailPromote => "mail.promote",

    // Webhooks
    /// Configure own webhook
    WebhookManage => "webhook.manage",

    // Roles
    /// View roles and the permission catalog
    RolesView => "roles.view",

    // Settings
    /// View system settings
    SettingsView => "settings.view",
    /// Modify system settings
    SettingsManage => "settings.manage",

    // Audit
    /// View audit logs
    AuditView => "audit.view",
}

/// Extractor that requires a specific permission
///
/// This extractor verifies that the authenticated user has the required
/// permission before the handler is called. If the permission check fails,
/// a 403 Forbidden error is returned.
///
/// # Example
/// ```ignore
/// async fn delete_code(
///     Authorized(user): Authorized<CodesManage>,
///     Path(id): Path<i64>,
/// ) -> Result<()> {
///     // User is guaranteed to have "codes.manage" permission
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authorized<P: Permission>(pub user::Model, PhantomData<P>);

impl<P: Permission> Authorized<P> {
    /// Get the authenticated user
    pub fn user(&self) -> &user::Model {
        &self.0
    }

    /// Get the user ID
    pub fn user_id(&self) -> i64 {
        self.0.id
    }
}

impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    P: Permission,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get authenticated user from extensions (set by auth middleware)
        let auth_user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        // Check if user has the required permission
        if !auth_user.has_permission(P::NAME) {
            return Err(AppError::Forbidden(format!(
                "Permission denied: {} required",
                P::NAME
            )));
        }

        Ok(Authorized(auth_user.user.clone(), PhantomData))
    }
}

/// Extractor for any authenticated user (no specific permission required)
///
/// Use this when you just need to verify the user is authenticated
/// but don't need a specific permission.
#[derive(Debug, Clone)]
pub struct Authenticated(pub user::Model);

impl Authenticated {
    /// Get the authenticated user
    pub fn user(&self) -> &user::Model {
        &self.0
    }

    /// Get the user ID
    pub fn user_id(&self) -> i64 {
        self.0.id
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        Ok(Authenticated(auth_user.user.clone()))
    }
}
