//! Outbound webhook deliveries.
//!
//! Fire-and-forget: a delivery is a single JSON POST to the user's configured
//! callback URL. Failures are logged, never retried.

use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::prelude::*;
use crate::state::DbConn;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Events a webhook subscriber can receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    EmailCreated,
    EmailPromoted,
    EmailExpired,
    AccountActivated,
    Test,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::EmailCreated => "email_created",
            WebhookEvent::EmailPromoted => "email_promoted",
            WebhookEvent::EmailExpired => "email_expired",
            WebhookEvent::AccountActivated => "account_activated",
            WebhookEvent::Test => "test",
        }
    }
}

impl std::fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dispatches webhook deliveries for users that configured one
#[derive(Clone)]
pub struct WebhookDispatcher {
    db: DbConn,
    http: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(db: DbConn) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { db, http }
    }

    /// Deliver an event to the user's webhook, if one is configured and
    /// enabled. Spawned off the request path; the caller never waits.
    pub fn notify(&self, user_id: i64, event: WebhookEvent, payload: serde_json::Value) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            match dispatcher.deliver(user_id, event, payload).await {
                Ok(Some(status)) => {
                    tracing::debug!(user_id, event = %event, status, "Webhook delivered");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(user_id, event = %event, error = %e, "Webhook delivery failed");
                }
            }
        });
    }

    /// Perform one delivery. Returns the response status, or `None` when the
    /// user has no enabled webhook.
    pub async fn deliver(
        &self,
        user_id: i64,
        event: WebhookEvent,
        payload: serde_json::Value,
    ) -> Result<Option<u16>> {
        let hook = match Webhook::find_by_id(user_id).one(&self.db).await? {
            Some(h) if h.enabled => h,
            _ => return Ok(None),
        };

        let body = serde_json::json!({
            "event": event.as_str(),
            "timestamp": chrono::Utc::now(),
            "data": payload,
        });

        let response = self.http.post(&hook.url).json(&body).send().await?;
        Ok(Some(response.status().as_u16()))
    }

    /// Deliver a test event synchronously, for the webhook test endpoint.
    /// Errors out when no webhook is configured.
    pub async fn send_test(&self, user_id: i64) -> Result<u16> {
        self.deliver(
            user_id,
            WebhookEvent::Test,
            serde_json::json!({ "message": "Webhook configuration test" }),
        )
        .await?
        .ok_or_else(|| AppError::BadRequest("No enabled webhook configured".to_string()))
    }
}
