use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // Seed default roles
        seed_roles(db).await?;

        // Seed default system settings
        seed_system_settings(db).await?;

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // Seeding is not reversible - data may have been modified
        Ok(())
    }
}

async fn seed_roles(db: &SchemaManagerConnection<'_>) -> Result<(), DbErr> {
    use crate::models::prelude::*;
    use crate::models::{role, role_permission};

    let role_count = Role::find().count(db).await?;
    if role_count > 0 {
        return Ok(());
    }

    let now = chrono::Utc::now();

    // Create default roles
    let default_roles = [
        ("emperor", "Full administrator access", true),
        ("duke", "User, student and activation-code administration", true),
        ("knight", "Read-only administrative access", true),
        ("student", "Permanent mailbox holder", true),
        ("civilian", "Temporary mailbox access only", true),
    ];

    for (name, description, is_system) in default_roles {
        let new_role = role::ActiveModel {
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            is_system: Set(is_system),
            created_at: Set(now),
            ..Default::default()
        };
        new_role.insert(db).await?;
    }

    let find_role = |name: &'static str| async move {
        Role::find()
            .filter(role::Column::Name.eq(name))
            .one(db)
            .await?
            .ok_or(DbErr::Custom(format!("{} role not found", name)))
    };

    let emperor_role = find_role("emperor").await?;
    let duke_role = find_role("duke").await?;
    let knight_role = find_role("knight").await?;
    let student_role = find_role("student").await?;
    let civilian_role = find_role("civilian").await?;

    // Emperor permissions (all)
    let emperor_permissions = [
        "users.view",
        "users.manage",
        "users.reset_password",
        "students.view",
        "students.manage",
        "codes.view",
        "codes.manage",
        "emails.view",
        "emails.manage",
        "mail.create",
        "mail.promote",
        "webhook.manage",
        "roles.view",
        "settings.view",
        "settings.manage",
        "audit.view",
    ];
    for perm in emperor_permissions {
        let permission = role_permission::ActiveModel {
            role_id: Set(emperor_role.id),
            permission: Set(perm.to_string()),
            ..Default::default()
        };
        permission.insert(db).await?;
    }

    // Duke permissions
    let duke_permissions = [
        "users.view",
        "users.manage",
        "users.reset_password",
        "students.view",
        "students.manage",
        "codes.view",
        "codes.manage",
        "emails.view",
        "emails.manage",
        "mail.create",
        "mail.promote",
        "webhook.manage",
        "roles.view",
        "settings.view",
        "settings.manage",
        "audit.view",
    ];
    for perm in duke_permissions {
        let permission = role_permission::ActiveModel {
            role_id: Set(duke_role.id),
            permission: Set(perm.to_string()),
            ..Default::default()
        };
        permission.insert(db).await?;
    }

    // Knight permissions (view-level administration)
    let knight_permissions = [
        "users.view",
        "students.view",
        "codes.view",
        "emails.view",
        "mail.create",
        "mail.promote",
        "webhook.manage",
        "roles.view",
        "audit.view",
    ];
    for perm in knight_permissions {
        let permission = role_permission::ActiveModel {
            role_id: Set(knight_role.id),
            permission: Set(perm.to_string()),
            ..Default::default()
        };
        permission.insert(db).await?;
    }

    // Student permissions
    let student_permissions = ["mail.create", "mail.promote", "webhook.manage"];
    for perm in student_permissions {
        let permission = role_permission::ActiveModel {
            role_id: Set(student_role.id),
            permission: Set(perm.to_string()),
            ..Default::default()
        };
        permission.insert(db).await?;
    }

    // Civilian permissions
    let civilian_permissions = ["mail.create", "webhook.manage"];
    for perm in civilian_permissions {
        let permission = role_permission::ActiveModel {
            role_id: Set(civilian_role.id),
            permission: Set(perm.to_string()),
            ..Default::default()
        };
        permission.insert(db).await?;
    }

    Ok(())
}

async fn seed_system_settings(db: &SchemaManagerConnection<'_>) -> Result<(), DbErr> {
    use crate::models::prelude::*;
    use crate::models::system_setting;

    let settings_count = SystemSetting::find().count(db).await?;
    if settings_count > 0 {
        return Ok(());
    }

    let now = chrono::Utc::now();

    let default_settings = [
        ("registration_enabled", "true", "Allow new user registration"),
        (
            "temp_email_ttl_hours",
            "24",
            "Default lifetime of a temporary email in hours",
        ),
        (
            "max_emails_per_user",
            "10",
            "Maximum live (non-expired) emails per user",
        ),
    ];

    for (key, value, description) in default_settings {
        let setting = system_setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            description: Set(Some(description.to_string())),
            updated_at: Set(now),
        };
        setting.insert(db).await?;
    }

    Ok(())
}
