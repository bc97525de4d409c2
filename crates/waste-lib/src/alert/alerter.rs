//! Alert emitter with deduplication

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{AlertKind, AlertMessage, Notifier, SUBJECT_PREFIX};
use crate::models::{EnsembleForecast, Priority, WasteRecommendation};
use crate::observability::StructuredLogger;

/// Default deduplication window (15 minutes)
const DEFAULT_DEDUP_WINDOW_SECS: u64 = 15 * 60;

/// When alerts fire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Forecasts with a confidence score below this alert
    pub alert_confidence_threshold: f64,
    /// Repeat alerts for the same subject are suppressed within this window
    pub dedup_window_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            alert_confidence_threshold: 60.0,
            dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
        }
    }
}

/// Key for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    kind: AlertKind,
    subject_id: String,
}

/// An alert the notifier could not deliver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertFailure {
    pub kind: AlertKind,
    pub subject_id: String,
    pub error: String,
}

/// Outcome of handing a batch of alerts to a notifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub suppressed: usize,
    pub failures: Vec<AlertFailure>,
}

impl DispatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: DispatchReport) {
        self.sent += other.sent;
        self.suppressed += other.suppressed;
        self.failures.extend(other.failures);
    }
}

/// Builds alert messages and dispatches them through a notifier
pub struct Alerter {
    config: AlertConfig,
    /// Deduplication window
    dedup_window: Duration,
    /// Recent alerts for deduplication (key -> last delivery time)
    recent_alerts: RwLock<HashMap<DedupKey, Instant>>,
    logger: StructuredLogger,
}

impl Default for Alerter {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}

impl Alerter {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            dedup_window: Duration::from_secs(config.dedup_window_secs),
            config,
            recent_alerts: RwLock::new(HashMap::new()),
            logger: StructuredLogger::new("local"),
        }
    }

    /// Set custom deduplication window
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Check if an alert should be suppressed due to deduplication
    pub fn should_suppress(&self, kind: AlertKind, subject_id: &str) -> bool {
        let key = DedupKey {
            kind,
            subject_id: subject_id.to_string(),
        };

        let alerts = self
            .recent_alerts
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        alerts
            .get(&key)
            .map_or(false, |last| last.elapsed() < self.dedup_window)
    }

    /// Record that an alert was delivered
    pub fn record_alert(&self, kind: AlertKind, subject_id: &str) {
        let key = DedupKey {
            kind,
            subject_id: subject_id.to_string(),
        };

        let mut alerts = self
            .recent_alerts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        alerts.insert(key, Instant::now());

        // Clean up old entries
        alerts.retain(|_, time| time.elapsed() < self.dedup_window);
    }

    /// One alert per High-priority recommendation, in input order
    pub fn recommendation_alerts(&self, recommendations: &[WasteRecommendation]) -> Vec<AlertMessage> {
        recommendations
            .iter()
            .filter(|rec| rec.priority == Priority::High)
            .map(|rec| AlertMessage {
                kind: AlertKind::WasteRecommendation,
                subject: format!(
                    "{} High priority waste: {} ({})",
                    SUBJECT_PREFIX, rec.resource_id, rec.service_type
                ),
                subject_id: rec.resource_id.clone(),
                value: rec.estimated_monthly_savings,
                level: rec.priority.to_string(),
                reasons: rec.reasons.clone(),
                created_at: Utc::now(),
            })
            .collect()
    }

    /// Alert for a forecast with low confidence or a budget overrun, if any
    pub fn forecast_alert(&self, forecast: &EnsembleForecast) -> Option<AlertMessage> {
        let threshold = self.config.alert_confidence_threshold;
        let low_confidence = forecast.confidence_score < threshold;
        let high_cost = forecast.signals.high_cost_risk;

        if !low_confidence && !high_cost {
            return None;
        }

        let mut reasons = Vec::new();
        if high_cost {
            reasons.push(format!(
                "Ensemble prediction ${:.2}/day exceeds the budget ceiling",
                forecast.ensemble_prediction
            ));
        }
        if low_confidence {
            reasons.push(format!(
                "Model agreement {:.1}% is below the {:.0}% alert threshold",
                forecast.confidence_score, threshold
            ));
        }
        if forecast.signals.volatility_concern {
            reasons.push(format!(
                "Models disagree by ${:.2}/day",
                forecast.model_agreement
            ));
        }

        let subject = if high_cost {
            format!("{} High cost forecast for {}", SUBJECT_PREFIX, forecast.prediction_date)
        } else {
            format!(
                "{} Low confidence forecast for {}",
                SUBJECT_PREFIX, forecast.prediction_date
            )
        };

        Some(AlertMessage {
            kind: AlertKind::ForecastRisk,
            subject,
            subject_id: forecast.prediction_date.to_string(),
            value: forecast.ensemble_prediction,
            level: format!("{:.1}%", forecast.confidence_score),
            reasons,
            created_at: Utc::now(),
        })
    }

    /// Publish each message, skipping recently delivered subjects
    ///
    /// Delivery failures are logged and reported, never returned as errors.
    pub async fn dispatch(
        &self,
        notifier: &dyn Notifier,
        messages: Vec<AlertMessage>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for message in messages {
            if self.should_suppress(message.kind, &message.subject_id) {
                report.suppressed += 1;
                continue;
            }

            match notifier.publish(&message).await {
                Ok(()) => {
                    self.record_alert(message.kind, &message.subject_id);
                    self.logger.log_alert_dispatched(
                        &message.kind.to_string(),
                        &message.subject_id,
                        notifier.name(),
                    );
                    report.sent += 1;
                }
                Err(e) => {
                    let error = e.to_string();
                    self.logger.log_alert_failed(
                        &message.kind.to_string(),
                        &message.subject_id,
                        notifier.name(),
                        &error,
                    );
                    report.failures.push(AlertFailure {
                        kind: message.kind,
                        subject_id: message.subject_id,
                        error,
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::models::{
        ForecastAction, ForecastRange, ForecastSignals, ModelWeights, RecommendationStatus, Trend,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use std::thread::sleep;

    #[derive(Default)]
    struct RecordingNotifier {
        published: Mutex<Vec<AlertMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn publish(&self, message: &AlertMessage) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Transport("connection refused".to_string()));
            }
            self.published.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn rec(resource: &str, priority: Priority) -> WasteRecommendation {
        WasteRecommendation {
            id: format!("rec-{}", resource),
            resource_id: resource.to_string(),
            service_type: "Amazon EC2".to_string(),
            instance_type: "m5.xlarge".to_string(),
            availability_zone: "ap-south-1a".to_string(),
            current_cost: 2.5,
            total_usage: 3.0,
            wastage_score: 85,
            priority,
            estimated_savings: 2.0,
            estimated_monthly_savings: 60.0,
            reasons: vec!["Critical: very low compute utilization detected".to_string()],
            confidence_score: 8.5,
            status: RecommendationStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn forecast(prediction: f64, confidence: f64, high_cost: bool) -> EnsembleForecast {
        EnsembleForecast {
            prediction_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            ensemble_prediction: prediction,
            confidence_score: confidence,
            trend: Trend::Stable,
            recommendation: ForecastAction::Investigate,
            forecast_range: ForecastRange {
                min: prediction,
                max: prediction,
            },
            weights: ModelWeights {
                statistical: 0.5,
                ml: 0.5,
            },
            model_agreement: 0.2,
            signals: ForecastSignals {
                high_cost_risk: high_cost,
                volatility_concern: false,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_high_priority_recommendations_alert() {
        let alerter = Alerter::default();
        let alerts = alerter.recommendation_alerts(&[
            rec("i-1", Priority::Medium),
            rec("i-2", Priority::High),
            rec("i-3", Priority::Low),
        ]);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].subject_id, "i-2");
        assert_eq!(alerts[0].value, 60.0);
        assert_eq!(alerts[0].level, "High");
        assert!(alerts[0].subject.starts_with(SUBJECT_PREFIX));
    }

    #[test]
    fn test_confident_forecast_within_budget_is_quiet() {
        let alerter = Alerter::default();
        assert!(alerter.forecast_alert(&forecast(2.2, 90.0, false)).is_none());
        assert!(alerter.forecast_alert(&forecast(2.2, 60.0, false)).is_none());
    }

    #[test]
    fn test_low_confidence_forecast_alerts() {
        let alerter = Alerter::default();
        let alert = alerter.forecast_alert(&forecast(2.2, 41.24, false)).unwrap();

        assert_eq!(alert.kind, AlertKind::ForecastRisk);
        assert_eq!(alert.subject_id, "2025-06-01");
        assert_eq!(alert.level, "41.2%");
        assert_eq!(alert.reasons.len(), 1);
        assert!(alert.subject.contains("Low confidence"));
    }

    #[test]
    fn test_high_cost_forecast_alerts() {
        let alerter = Alerter::default();
        let alert = alerter.forecast_alert(&forecast(3.4, 95.0, true)).unwrap();

        assert!(alert.subject.contains("High cost"));
        assert_eq!(alert.value, 3.4);
        assert!(alert.reasons[0].contains("$3.40/day"));
    }

    #[tokio::test]
    async fn test_dispatch_and_deduplication() {
        let alerter = Alerter::default().with_dedup_window(Duration::from_millis(100));
        let notifier = RecordingNotifier::default();
        let alerts = alerter.recommendation_alerts(&[rec("i-2", Priority::High)]);

        let report = alerter.dispatch(&notifier, alerts.clone()).await;
        assert_eq!(report.sent, 1);
        assert!(report.is_clean());

        // Second dispatch within the window is suppressed
        let report = alerter.dispatch(&notifier, alerts.clone()).await;
        assert_eq!(report.sent, 0);
        assert_eq!(report.suppressed, 1);

        // Wait for dedup window to expire
        sleep(Duration::from_millis(150));

        let report = alerter.dispatch(&notifier, alerts).await;
        assert_eq!(report.sent, 1);
        assert_eq!(notifier.published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_reported_not_deduplicated() {
        let alerter = Alerter::default();
        let failing = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let alerts = alerter.recommendation_alerts(&[rec("i-9", Priority::High)]);

        let report = alerter.dispatch(&failing, alerts.clone()).await;
        assert_eq!(report.sent, 0);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].subject_id, "i-9");
        assert!(report.failures[0].error.contains("connection refused"));

        // A failed delivery does not start the dedup window
        let working = RecordingNotifier::default();
        let report = alerter.dispatch(&working, alerts).await;
        assert_eq!(report.sent, 1);
    }

    #[test]
    fn test_dedup_is_per_kind_and_subject() {
        let alerter = Alerter::default();
        alerter.record_alert(AlertKind::WasteRecommendation, "2025-06-01");

        assert!(alerter.should_suppress(AlertKind::WasteRecommendation, "2025-06-01"));
        assert!(!alerter.should_suppress(AlertKind::ForecastRisk, "2025-06-01"));
        assert!(!alerter.should_suppress(AlertKind::WasteRecommendation, "i-1"));
    }

    #[test]
    fn test_report_merge() {
        let mut report = DispatchReport {
            sent: 1,
            ..Default::default()
        };
        report.merge(DispatchReport {
            sent: 2,
            suppressed: 1,
            failures: vec![],
        });
        assert_eq!((report.sent, report.suppressed, report.failed()), (3, 1, 0));
    }
}
