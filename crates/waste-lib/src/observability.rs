//! Observability infrastructure for the waste detector
//!
//! Provides:
//! - Prometheus metrics (scoring and combine latency, record counts, alert outcomes)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Gauge,
    Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::{EnsembleForecast, Priority, WasteRecommendation};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<WasteMetricsInner> = OnceLock::new();

struct WasteMetricsInner {
    scoring_latency_seconds: Histogram,
    combine_latency_seconds: Histogram,
    records_ingested: IntCounter,
    records_skipped: IntCounter,
    recommendations_generated: IntCounterVec,
    ensemble_errors: IntCounter,
    alerts_sent: IntCounter,
    alerts_failed: IntCounter,
    alerts_suppressed: IntCounter,
    last_ensemble_prediction: Gauge,
    last_ensemble_confidence: Gauge,
}

impl WasteMetricsInner {
    fn new() -> Self {
        Self {
            scoring_latency_seconds: register_histogram!(
                "cwd_scoring_latency_seconds",
                "Time spent aggregating and scoring a usage batch",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scoring_latency_seconds"),

            combine_latency_seconds: register_histogram!(
                "cwd_combine_latency_seconds",
                "Time spent combining forecasts into an ensemble",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register combine_latency_seconds"),

            records_ingested: register_int_counter!(
                "cwd_records_ingested_total",
                "Usage records accepted for aggregation"
            )
            .expect("Failed to register records_ingested"),

            records_skipped: register_int_counter!(
                "cwd_records_skipped_total",
                "Usage records skipped as malformed"
            )
            .expect("Failed to register records_skipped"),

            recommendations_generated: register_int_counter_vec!(
                "cwd_recommendations_generated_total",
                "Waste recommendations emitted by priority",
                &["priority"]
            )
            .expect("Failed to register recommendations_generated"),

            ensemble_errors: register_int_counter!(
                "cwd_ensemble_errors_total",
                "Combine passes that failed"
            )
            .expect("Failed to register ensemble_errors"),

            alerts_sent: register_int_counter!(
                "cwd_alerts_sent_total",
                "Alerts delivered to the notifier"
            )
            .expect("Failed to register alerts_sent"),

            alerts_failed: register_int_counter!(
                "cwd_alerts_failed_total",
                "Alerts the notifier failed to deliver"
            )
            .expect("Failed to register alerts_failed"),

            alerts_suppressed: register_int_counter!(
                "cwd_alerts_suppressed_total",
                "Alerts suppressed by the deduplication window"
            )
            .expect("Failed to register alerts_suppressed"),

            last_ensemble_prediction: register_gauge!(
                "cwd_ensemble_prediction_dollars",
                "Most recent ensemble daily cost prediction"
            )
            .expect("Failed to register ensemble_prediction_dollars"),

            last_ensemble_confidence: register_gauge!(
                "cwd_ensemble_confidence_score",
                "Most recent ensemble model agreement score (0-100)"
            )
            .expect("Failed to register ensemble_confidence_score"),
        }
    }
}

/// Waste detector metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct WasteMetrics {
    _private: (),
}

impl Default for WasteMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WasteMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(WasteMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &WasteMetricsInner {
        GLOBAL_METRICS.get_or_init(WasteMetricsInner::new)
    }

    pub fn observe_scoring_latency(&self, duration_secs: f64) {
        self.inner().scoring_latency_seconds.observe(duration_secs);
    }

    pub fn observe_combine_latency(&self, duration_secs: f64) {
        self.inner().combine_latency_seconds.observe(duration_secs);
    }

    /// Record accepted and skipped usage records for one batch
    pub fn record_batch(&self, ingested: usize, skipped: usize) {
        self.inner().records_ingested.inc_by(ingested as u64);
        self.inner().records_skipped.inc_by(skipped as u64);
    }

    pub fn inc_recommendation(&self, priority: Priority) {
        self.inner()
            .recommendations_generated
            .with_label_values(&[&priority.to_string()])
            .inc();
    }

    pub fn inc_ensemble_errors(&self) {
        self.inner().ensemble_errors.inc();
    }

    /// Update the last-ensemble gauges
    pub fn set_ensemble(&self, forecast: &EnsembleForecast) {
        self.inner()
            .last_ensemble_prediction
            .set(forecast.ensemble_prediction);
        self.inner()
            .last_ensemble_confidence
            .set(forecast.confidence_score);
    }

    /// Record the outcome of an alert dispatch
    pub fn record_alerts(&self, sent: usize, failed: usize, suppressed: usize) {
        self.inner().alerts_sent.inc_by(sent as u64);
        self.inner().alerts_failed.inc_by(failed as u64);
        self.inner().alerts_suppressed.inc_by(suppressed as u64);
    }
}

/// Structured logger for waste detector events
///
/// Provides consistent JSON-formatted logging for scoring passes,
/// ensembles, alerts and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Log the end of a scoring pass
    pub fn log_scoring_completed(
        &self,
        records: usize,
        skipped: usize,
        resources: usize,
        recommendations: usize,
        duration_secs: f64,
    ) {
        info!(
            event = "scoring_completed",
            node = %self.node_name,
            records = records,
            skipped = skipped,
            resources = resources,
            recommendations = recommendations,
            duration_secs = duration_secs,
            "Scored usage batch"
        );
    }

    /// Log a generated recommendation
    pub fn log_recommendation(&self, rec: &WasteRecommendation) {
        info!(
            event = "recommendation_generated",
            node = %self.node_name,
            recommendation_id = %rec.id,
            resource_id = %rec.resource_id,
            service_type = %rec.service_type,
            wastage_score = rec.wastage_score,
            priority = %rec.priority,
            estimated_savings = rec.estimated_savings,
            reasons = rec.reasons.len(),
            "Generated waste recommendation"
        );
    }

    /// Log a generated ensemble forecast
    pub fn log_ensemble(&self, forecast: &EnsembleForecast) {
        info!(
            event = "ensemble_generated",
            node = %self.node_name,
            prediction_date = %forecast.prediction_date,
            ensemble_prediction = forecast.ensemble_prediction,
            confidence_score = forecast.confidence_score,
            weight_statistical = forecast.weights.statistical,
            weight_ml = forecast.weights.ml,
            trend = %forecast.trend,
            recommendation = %forecast.recommendation,
            high_cost_risk = forecast.signals.high_cost_risk,
            volatility_concern = forecast.signals.volatility_concern,
            "Generated ensemble forecast"
        );
    }

    /// Log a failed combine pass
    pub fn log_ensemble_failed(&self, kind: &str, error: &str) {
        warn!(
            event = "ensemble_failed",
            node = %self.node_name,
            kind = %kind,
            error = %error,
            "Failed to generate ensemble forecast"
        );
    }

    /// Log an alert handed to the notifier
    pub fn log_alert_dispatched(&self, kind: &str, subject_id: &str, notifier: &str) {
        info!(
            event = "alert_dispatched",
            node = %self.node_name,
            kind = %kind,
            subject_id = %subject_id,
            notifier = %notifier,
            "Alert dispatched"
        );
    }

    /// Log an alert the notifier failed to deliver
    pub fn log_alert_failed(&self, kind: &str, subject_id: &str, notifier: &str, error: &str) {
        warn!(
            event = "alert_failed",
            node = %self.node_name,
            kind = %kind,
            subject_id = %subject_id,
            notifier = %notifier,
            error = %error,
            "Alert delivery failed, result kept"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, api_port: u16) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            api_port = api_port,
            "Waste detector agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Waste detector agent shutting down"
        );
    }
}
