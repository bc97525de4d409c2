//! Webhook alert transport

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use waste_lib::alert::{AlertKind, AlertMessage, Notifier};
use waste_lib::NotifyError;

/// JSON body POSTed for each alert
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    kind: AlertKind,
    subject: &'a str,
    subject_id: &'a str,
    value: f64,
    level: &'a str,
    reasons: &'a [String],
    message: String,
    created_at: String,
}

impl<'a> From<&'a AlertMessage> for WebhookPayload<'a> {
    fn from(alert: &'a AlertMessage) -> Self {
        Self {
            kind: alert.kind,
            subject: &alert.subject,
            subject_id: &alert.subject_id,
            value: alert.value,
            level: &alert.level,
            reasons: &alert.reasons,
            message: alert.body(),
            created_at: alert.created_at.to_rfc3339(),
        }
    }
}

/// Publishes alerts as JSON POSTs to a webhook URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn publish(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload::from(message))
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
