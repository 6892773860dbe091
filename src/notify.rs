//! Teacher notification delivery
//!
//! Delivery is best-effort: the notification record is already
//! committed with the transition, a failed send is only logged.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("network error: {0}")]
    Network(String),
    #[error("webhook rejected notification with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target_id: &str, message: &str) -> Result<(), NotifyError>;
}

/// Log-only delivery
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, target_id: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!(target_id = %target_id, "Notification: {}", message);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    target_id: &'a str,
    message: &'a str,
    sent_at: i64,
}

/// JSON POST to a configured webhook
pub struct WebhookNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http_client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, target_id: &str, message: &str) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            target_id,
            message,
            sent_at: Utc::now().timestamp(),
        };

        let response = self.http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        if response.status().is_success() {
            tracing::debug!("Notification delivered to webhook for {}", target_id);
            Ok(())
        } else {
            Err(NotifyError::Rejected(response.status().as_u16()))
        }
    }
}
