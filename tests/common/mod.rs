//! Test helpers and utilities for unit and integration testing.
//!
//! This module provides common utilities for setting up test environments,
//! creating mock data, and testing database operations.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use mailcove::migrations::Migrator;
use mailcove::state::AppState;

/// Create an in-memory SQLite database for testing.
/// Migrations include the seed pass, so default roles and settings exist.
pub async fn create_test_db() -> DatabaseConnection {
    // Use simple in-memory SQLite - each connection gets its own database
    let db_url = "sqlite::memory:";

    let db = Database::connect(db_url)
        .await
        .expect("Failed to create test database");

    // Run migrations using the Migrator
    Migrator::up(&db, None)
        .await
        .expect("Failed to run test migrations");

    db
}

/// Build an AppState over a fresh test database
pub async fn build_test_app_state() -> AppState {
    let db = create_test_db().await;
    AppState::new(db)
}

/// Build an AppState over a given database
pub fn build_test_app_state_with_db(db: DatabaseConnection) -> AppState {
    AppState::new(db)
}

static NEXT_CLIENT: AtomicU32 = AtomicU32::new(1);

/// A unique client IP per call, so the per-IP auth rate limiter never
/// couples tests running in the same process.
pub fn unique_client_ip() -> String {
    let n = NEXT_CLIENT.fetch_add(1, Ordering::Relaxed);
    format!("10.{}.{}.{}", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff)
}

/// Create a test user and return the user model
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    enabled: bool,
) -> mailcove::models::user::Model {
    use mailcove::models::user;
    use mailcove::services::security::hash_password;
    use sea_orm::{ActiveModelTrait, Set};

    let hashed = hash_password(password).unwrap();
    let now = chrono::Utc::now();

    let new_user = user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(Some(hashed)),
        enabled: Set(enabled),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    new_user.insert(db).await.unwrap()
}

/// Create a test user with a specific seeded role
pub async fn create_test_user_with_role(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    role_name: &str,
) -> mailcove::models::user::Model {
    use mailcove::models::{role, user_role};
    use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

    let user = create_test_user(db, username, password, true).await;

    // Find the role
    let role = mailcove::models::prelude::Role::find()
        .filter(role::Column::Name.eq(role_name))
        .one(db)
        .await
        .unwrap()
        .expect("Role not found");

    // Assign role to user
    let user_role = user_role::ActiveModel {
        user_id: Set(user.id),
        role_id: Set(role.id),
    };
    user_role.insert(db).await.unwrap();

    user
}

/// Create an activation code row directly
pub async fn create_test_code(
    db: &DatabaseConnection,
    created_by: i64,
    status: &str,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> mailcove::models::activation_code::Model {
    use mailcove::models::activation_code;
    use mailcove::services::generate_activation_code;
    use sea_orm::{ActiveModelTrait, Set};

    let new_code = activation_code::ActiveModel {
        code: Set(generate_activation_code()),
        status: Set(status.to_string()),
        created_by_id: Set(Some(created_by)),
        expires_at: Set(expires_at),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    new_code.insert(db).await.unwrap()
}

/// Create an email row directly
pub async fn create_test_email(
    db: &DatabaseConnection,
    user_id: i64,
    address: &str,
    is_permanent: bool,
    expires_at: chrono::DateTime<chrono::Utc>,
) -> mailcove::models::email::Model {
    use mailcove::models::email;
    use sea_orm::{ActiveModelTrait, Set};

    let new_email = email::ActiveModel {
        user_id: Set(user_id),
        address: Set(address.to_string()),
        is_permanent: Set(is_permanent),
        created_at: Set(chrono::Utc::now()),
        expires_at: Set(expires_at),
        ..Default::default()
    };
    new_email.insert(db).await.unwrap()
}

/// Create a message row directly
pub async fn create_test_message(
    db: &DatabaseConnection,
    email_id: i64,
    subject: &str,
) -> mailcove::models::message::Model {
    use mailcove::models::message;
    use sea_orm::{ActiveModelTrait, Set};

    let new_message = message::ActiveModel {
        email_id: Set(email_id),
        sender: Set("sender@example.com".to_string()),
        subject: Set(subject.to_string()),
        body: Set("test body".to_string()),
        received_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    new_message.insert(db).await.unwrap()
}
