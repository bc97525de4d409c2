//! Alert construction and delivery
//!
//! Handles:
//! - Building alert messages for high-priority waste and risky forecasts
//! - Deduplication of alerts within a configurable window
//! - Handing messages to an external notifier without failing the caller

mod alerter;

pub use alerter::{AlertConfig, AlertFailure, Alerter, DispatchReport};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::NotifyError;

/// Subject prefix shared by every alert
pub const SUBJECT_PREFIX: &str = "[CloudWasteDetector]";

/// What an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A High-priority waste recommendation
    WasteRecommendation,
    /// An ensemble forecast with low confidence or high cost
    ForecastRisk,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::WasteRecommendation => write!(f, "waste_recommendation"),
            AlertKind::ForecastRisk => write!(f, "forecast_risk"),
        }
    }
}

/// Structured alert payload handed to a notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub kind: AlertKind,
    pub subject: String,
    /// Resource id or prediction date
    pub subject_id: String,
    /// Monthly savings or predicted daily cost, in dollars
    pub value: f64,
    /// Priority or confidence
    pub level: String,
    pub reasons: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl AlertMessage {
    /// Plain-text rendering for transports without structure
    pub fn body(&self) -> String {
        let mut lines = Vec::with_capacity(self.reasons.len() + 5);
        match self.kind {
            AlertKind::WasteRecommendation => {
                lines.push(format!("Resource: {}", self.subject_id));
                lines.push(format!("Estimated monthly savings: ${:.2}", self.value));
                lines.push(format!("Priority: {}", self.level));
            }
            AlertKind::ForecastRisk => {
                lines.push(format!("Prediction date: {}", self.subject_id));
                lines.push(format!("Forecasted cost: ${:.2}/day", self.value));
                lines.push(format!("Confidence score: {}", self.level));
            }
        }
        lines.push(format!(
            "Generated: {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if !self.reasons.is_empty() {
            lines.push("Reasons:".to_string());
            lines.extend(self.reasons.iter().map(|r| format!("  - {}", r)));
        }
        lines.join("\n")
    }
}

/// External alert transport
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn publish(&self, message: &AlertMessage) -> Result<(), NotifyError>;
}

/// Notifier that only writes a structured log line
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        info!(
            event = "alert_published",
            kind = %message.kind,
            subject = %message.subject,
            subject_id = %message.subject_id,
            value = message.value,
            level = %message.level,
            reasons = ?message.reasons,
            "Alert"
        );
        Ok(())
    }
}
