pub mod activation_code;
pub mod api_key;
pub mod audit_log;
pub mod email;
pub mod message;
pub mod oauth_account;
pub mod role;
pub mod role_permission;
pub mod system_setting;
pub mod user;
pub mod user_role;
pub mod webhook;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::activation_code::{self, Entity as ActivationCode};
    pub use super::api_key::{self, Entity as ApiKey};
    pub use super::audit_log::{self, Entity as AuditLog};
    pub use super::email::{self, Entity as Email};
    pub use super::message::{self, Entity as Message};
    pub use super::oauth_account::{self, Entity as OauthAccount};
    pub use super::role::{self, Entity as Role};
    pub use super::role_permission::{self, Entity as RolePermission};
    pub use super::system_setting::{self, Entity as SystemSetting};
    pub use super::user::{self, Entity as User};
    pub use super::user_role::{self, Entity as UserRole};
    pub use super::webhook::{self, Entity as Webhook};
}
