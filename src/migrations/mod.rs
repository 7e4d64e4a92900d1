pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_users;
mod m20260301_000002_create_roles;
mod m20260301_000003_create_user_roles;
mod m20260301_000004_create_role_permissions;
mod m20260301_000005_create_emails;
mod m20260301_000006_create_messages;
mod m20260301_000007_create_activation_codes;
mod m20260301_000008_create_api_keys;
mod m20260301_000009_create_webhooks;
mod m20260301_000010_create_oauth_accounts;
mod m20260301_000011_create_system_settings;
mod m20260301_000012_create_audit_logs;
mod m20260302_000001_seed_defaults;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_users::Migration),
            Box::new(m20260301_000002_create_roles::Migration),
            Box::new(m20260301_000003_create_user_roles::Migration),
            Box::new(m20260301_000004_create_role_permissions::Migration),
            Box::new(m20260301_000005_create_emails::Migration),
            Box::new(m20260301_000006_create_messages::Migration),
            Box::new(m20260301_000007_create_activation_codes::Migration),
            Box::new(m20260301_000008_create_api_keys::Migration),
            Box::new(m20260301_000009_create_webhooks::Migration),
            Box::new(m20260301_000010_create_oauth_accounts::Migration),
            Box::new(m20260301_000011_create_system_settings::Migration),
            Box::new(m20260301_000012_create_audit_logs::Migration),
            Box::new(m20260302_000001_seed_defaults::Migration),
        ]
    }
}
