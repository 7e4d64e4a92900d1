//! Periodic task scheduler
//!
//! A simple scheduler for running background tasks at regular intervals.
//! Add new tasks by implementing the `PeriodicTask` trait.

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use super::webhook::{WebhookDispatcher, WebhookEvent};

/// Trait for periodic background tasks
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Task name for logging
    fn name(&self) -> &'static str;

    /// How often to run (e.g., every 1 hour)
    fn interval(&self) -> Duration;

    /// Execute the task
    async fn run(&self, db: &DatabaseConnection) -> anyhow::Result<()>;
}

/// Start all periodic tasks
pub fn start_scheduler(db: Arc<DatabaseConnection>, webhooks: WebhookDispatcher) {
    let tasks: Vec<Box<dyn PeriodicTask>> = vec![
        Box::new(EmailExpiryTask { webhooks }),
        Box::new(CodeExpiryTask),
    ];

    for task in tasks {
        let db = db.clone();
        tokio::spawn(async move {
            run_task(task, db).await;
        });
    }

    tracing::info!("Periodic task scheduler started");
}

/// Run a single task on its interval
async fn run_task(task: Box<dyn PeriodicTask>, db: Arc<DatabaseConnection>) {
    let mut ticker = interval(task.interval());

    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        ticker.tick().await;

        tracing::debug!(task = task.name(), "Running periodic task");

        match task.run(&db).await {
            Ok(()) => {
                tracing::debug!(task = task.name(), "Periodic task completed");
            }
            Err(e) => {
                tracing::error!(task = task.name(), error = %e, "Periodic task failed");
            }
        }
    }
}

// ============================================================================
// Email Expiry Task
// ============================================================================

use crate::models::activation_code::CodeStatus;
use crate::models::prelude::*;
use crate::models::{activation_code, email};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

/// Deletes temporary emails past their expiry; messages go with them via the
/// cascade. Owners with an enabled webhook get an `email_expired` event.
struct EmailExpiryTask {
    webhooks: WebhookDispatcher,
}

#[async_trait]
impl PeriodicTask for EmailExpiryTask {
    fn name(&self) -> &'static str {
        "email_expiry"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60 * 60) // Every hour
    }

    async fn run(&self, db: &DatabaseConnection) -> anyhow::Result<()> {
        let now = Utc::now();

        let expired = Email::find()
            .filter(email::Column::IsPermanent.eq(false))
            .filter(email::Column::ExpiresAt.lte(now))
            .all(db)
            .await?;

        if expired.is_empty() {
            return Ok(());
        }

        for item in &expired {
            self.webhooks.notify(
                item.user_id,
                WebhookEvent::EmailExpired,
                serde_json::json!({ "email_id": item.id, "address": item.address }),
            );
        }

        let ids: Vec<i64> = expired.iter().map(|e| e.id).collect();
        let deleted = Email::delete_many()
            .filter(email::Column::Id.is_in(ids))
            .exec(db)
            .await?;

        tracing::info!(deleted = deleted.rows_affected, "Expired emails removed");

        Ok(())
    }
}

// ============================================================================
// Activation Code Expiry Task
// ============================================================================

/// Flips unused activation codes past their expiry to `expired`
struct CodeExpiryTask;

#[async_trait]
impl PeriodicTask for CodeExpiryTask {
    fn name(&self) -> &'static str {
        "code_expiry"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60 * 60) // Every hour
    }

    async fn run(&self, db: &DatabaseConnection) -> anyhow::Result<()> {
        let now = Utc::now();

        let updated = ActivationCode::update_many()
            .col_expr(
                activation_code::Column::Status,
                Expr::value(CodeStatus::Expired.as_str()),
            )
            .filter(activation_code::Column::Status.eq(CodeStatus::Unused.as_str()))
            .filter(activation_code::Column::ExpiresAt.lte(now))
            .exec(db)
            .await?;

        if updated.rows_affected > 0 {
            tracing::info!(
                expired = updated.rows_affected,
                "Stale activation codes marked expired"
            );
        }

        Ok(())
    }
}
