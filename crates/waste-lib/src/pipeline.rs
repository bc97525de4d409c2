//! End-to-end detector passes
//!
//! Wires ingestion, aggregation, scoring, ranking, ensembling and alerting
//! together, recording metrics, health and structured log events per pass.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alert::{AlertConfig, Alerter, DispatchReport, LogNotifier, Notifier};
use crate::error::{EnsembleError, Error};
use crate::forecast::{load_pair, EnsembleCombiner, EnsembleConfig, ForecastPair, ForecastSource};
use crate::health::{components, HealthRegistry};
use crate::models::{EnsembleForecast, ForecastSummary, UsageRecord, WasteRecommendation};
use crate::observability::{StructuredLogger, WasteMetrics};
use crate::scoring::{rank_recommendations, RankingSummary, ScoringConfig, WasteScorer};
use crate::usage::{aggregate, decode_records, partition_valid, IngestReport};

/// Tunables for every stage of the detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub node_name: String,
    pub scoring: ScoringConfig,
    pub ensemble: EnsembleConfig,
    pub alerts: AlertConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            node_name: "local".to_string(),
            scoring: ScoringConfig::default(),
            ensemble: EnsembleConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

/// Result of one scoring pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringOutcome {
    /// Ranked by priority, then wastage score
    pub recommendations: Vec<WasteRecommendation>,
    pub summary: RankingSummary,
    /// Distinct resources that survived aggregation
    pub resources: usize,
    /// Records rejected as malformed
    pub skipped: usize,
    pub alerts: DispatchReport,
}

/// Result of one combine pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastOutcome {
    pub forecast: EnsembleForecast,
    pub alerts: DispatchReport,
}

pub struct WastePipeline {
    scorer: WasteScorer,
    combiner: EnsembleCombiner,
    alerter: Alerter,
    notifier: Arc<dyn Notifier>,
    metrics: WasteMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl Default for WastePipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl WastePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let logger = StructuredLogger::new(config.node_name);
        Self {
            scorer: WasteScorer::with_config(config.scoring),
            combiner: EnsembleCombiner::new(config.ensemble),
            alerter: Alerter::new(config.alerts).with_logger(logger.clone()),
            notifier: Arc::new(LogNotifier),
            metrics: WasteMetrics::new(),
            logger,
            health: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Report component health into a registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn scorer(&self) -> &WasteScorer {
        &self.scorer
    }

    pub fn combiner(&self) -> &EnsembleCombiner {
        &self.combiner
    }

    pub fn alerter(&self) -> &Alerter {
        &self.alerter
    }

    /// Validate, aggregate, score and rank structured records
    pub async fn score_records(&self, records: Vec<UsageRecord>) -> ScoringOutcome {
        let (valid, skipped) = partition_valid(records);
        self.score_valid(valid, skipped.len()).await
    }

    /// Decode, validate and score records that arrived as untyped JSON
    pub async fn score_values(&self, values: Vec<Value>) -> ScoringOutcome {
        let (valid, skipped) = decode_records(values);
        self.score_valid(valid, skipped.len()).await
    }

    /// Score the output of CSV ingestion
    pub async fn score_report(&self, report: IngestReport) -> ScoringOutcome {
        let skipped = report.skipped.len();
        self.score_valid(report.records, skipped).await
    }

    async fn score_valid(&self, records: Vec<UsageRecord>, skipped: usize) -> ScoringOutcome {
        let start = Instant::now();

        let aggregates = aggregate(&records);
        let recommendations = rank_recommendations(self.scorer.score_all(&aggregates));
        let summary = RankingSummary::from_recommendations(&recommendations);

        let elapsed = start.elapsed().as_secs_f64();
        self.metrics.observe_scoring_latency(elapsed);
        self.metrics.record_batch(records.len(), skipped);
        for rec in &recommendations {
            self.metrics.inc_recommendation(rec.priority);
            self.logger.log_recommendation(rec);
        }
        self.logger.log_scoring_completed(
            records.len(),
            skipped,
            aggregates.len(),
            recommendations.len(),
            elapsed,
        );
        self.set_healthy(components::SCORER).await;

        let messages = self.alerter.recommendation_alerts(&recommendations);
        let alerts = self.dispatch(messages).await;

        ScoringOutcome {
            recommendations,
            summary,
            resources: aggregates.len(),
            skipped,
            alerts,
        }
    }

    /// Combine two summaries; either may be absent, which is an error
    pub async fn combine(
        &self,
        statistical: Option<ForecastSummary>,
        ml: Option<ForecastSummary>,
    ) -> Result<ForecastOutcome, EnsembleError> {
        let pair = match ForecastPair::from_options(statistical, ml) {
            Ok(pair) => pair,
            Err(e) => {
                self.ensemble_failed(&Error::from(e.clone())).await;
                return Err(e);
            }
        };
        self.combine_pair(&pair).await
    }

    /// Load the latest summaries from a provider and combine them
    pub async fn run_forecast(&self, source: &dyn ForecastSource) -> Result<ForecastOutcome, Error> {
        let pair = match load_pair(source).await {
            Ok(pair) => {
                self.set_healthy(components::FORECAST_SOURCE).await;
                pair
            }
            Err(e) => {
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::FORECAST_SOURCE, e.to_string())
                        .await;
                }
                self.ensemble_failed(&e).await;
                return Err(e);
            }
        };
        Ok(self.combine_pair(&pair).await?)
    }

    async fn combine_pair(&self, pair: &ForecastPair) -> Result<ForecastOutcome, EnsembleError> {
        let start = Instant::now();
        let result = self.combiner.combine(pair);
        self.metrics
            .observe_combine_latency(start.elapsed().as_secs_f64());

        let forecast = match result {
            Ok(forecast) => forecast,
            Err(e) => {
                self.ensemble_failed(&Error::from(e.clone())).await;
                return Err(e);
            }
        };

        self.metrics.set_ensemble(&forecast);
        self.logger.log_ensemble(&forecast);
        self.set_healthy(components::COMBINER).await;

        let messages = self.alerter.forecast_alert(&forecast).into_iter().collect();
        let alerts = self.dispatch(messages).await;

        Ok(ForecastOutcome { forecast, alerts })
    }

    async fn dispatch(&self, messages: Vec<crate::alert::AlertMessage>) -> DispatchReport {
        if messages.is_empty() {
            return DispatchReport::default();
        }

        let report = self.alerter.dispatch(self.notifier.as_ref(), messages).await;
        self.metrics
            .record_alerts(report.sent, report.failed(), report.suppressed);

        if let Some(health) = &self.health {
            match report.failures.last() {
                Some(failure) => {
                    health
                        .set_degraded(components::NOTIFIER, failure.error.clone())
                        .await
                }
                None if report.sent > 0 => health.set_healthy(components::NOTIFIER).await,
                None => {}
            }
        }

        report
    }

    async fn ensemble_failed(&self, error: &Error) {
        self.metrics.inc_ensemble_errors();
        self.logger
            .log_ensemble_failed(error.kind(), &error.to_string());
        if let Some(health) = &self.health {
            health
                .set_degraded(components::COMBINER, error.to_string())
                .await;
        }
    }

    async fn set_healthy(&self, component: &str) {
        if let Some(health) = &self.health {
            health.set_healthy(component).await;
        }
    }
}
