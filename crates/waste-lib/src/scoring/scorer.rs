//! Waste scoring
//!
//! Turns a [`ResourceAggregate`] into a [`WasteRecommendation`] by folding
//! the hits of the rule table into a score, a priority and a savings
//! estimate. Identical aggregates always yield identical scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Priority, RecommendationStatus, ResourceAggregate, WasteRecommendation,
    DEFAULT_AVAILABILITY_ZONE,
};
use crate::usage::ResourceAggregates;

use super::rules::{default_rules, RuleContext, RuleHit, WasteRule};

/// Aggregates cheaper than this carry no savings signal
pub const MIN_SCORABLE_COST: f64 = 0.01;

/// Savings never exceed this fraction of current cost
pub const MAX_SAVINGS_FRACTION: f64 = 0.8;

/// Days used to project savings to a month
pub const MONTHLY_FACTOR: f64 = 30.0;

/// Upper bound of the recommendation confidence score
pub const MAX_CONFIDENCE: f64 = 10.0;

/// Configuration for waste scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Zone where resources are expected to run
    pub primary_zone: String,
    /// Instance types considered large
    pub large_instance_types: Vec<String>,
    /// Service type substrings marking compute services
    pub compute_markers: Vec<String>,
    /// Service type substrings marking storage services
    pub storage_markers: Vec<String>,
    /// Aggregates below this cost are not scored
    pub min_cost: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        };
        Self {
            primary_zone: DEFAULT_AVAILABILITY_ZONE.to_string(),
            large_instance_types: strings(&[
                "m5.large",
                "m5.xlarge",
                "m5.2xlarge",
                "c5.xlarge",
                "c5.2xlarge",
                "r5.large",
                "r5.xlarge",
                "t3.large",
                "t3.xlarge",
            ]),
            compute_markers: strings(&["EC2", "Compute"]),
            storage_markers: strings(&["Storage", "EBS"]),
            min_cost: MIN_SCORABLE_COST,
        }
    }
}

/// Deterministic part of a scoring result
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    pub hits: Vec<RuleHit>,
    pub wastage_score: u32,
    pub priority: Priority,
    pub estimated_savings: f64,
    pub estimated_monthly_savings: f64,
    pub confidence_score: f64,
}

impl ScoreCard {
    pub fn reasons(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.reason.to_string()).collect()
    }
}

/// Total points and the highest tier among the hits
pub fn fold_hits(hits: &[RuleHit]) -> (u32, Priority) {
    let score = hits.iter().map(|h| h.points).sum();
    let priority = hits
        .iter()
        .filter_map(|h| h.tier)
        .max()
        .unwrap_or(Priority::Low);
    (score, priority)
}

/// Generate a recommendation id, e.g. `rec-20250622103000-1a2b3c4d`
pub fn recommendation_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("rec-{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..8])
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn estimate_savings(total_cost: f64, wastage_score: u32) -> f64 {
    let fraction = (f64::from(wastage_score) / 100.0).min(MAX_SAVINGS_FRACTION);
    let cap = total_cost * MAX_SAVINGS_FRACTION;
    let rounded = round_cents(total_cost * fraction);

    // Rounding up may cross the cap on sub-cent costs
    if rounded > cap {
        (cap * 100.0).floor() / 100.0
    } else {
        rounded
    }
}

/// Scores resource aggregates against the rule table
#[derive(Debug, Clone)]
pub struct WasteScorer {
    config: ScoringConfig,
    rules: Vec<WasteRule>,
}

impl WasteScorer {
    pub fn new() -> Self {
        Self::with_config(ScoringConfig::default())
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        Self {
            config,
            rules: default_rules(),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn rules(&self) -> &[WasteRule] {
        &self.rules
    }

    /// Evaluate every rule; `None` when the aggregate is too cheap or nothing fired
    pub fn evaluate(&self, aggregate: &ResourceAggregate) -> Option<ScoreCard> {
        if aggregate.total_cost < self.config.min_cost {
            return None;
        }

        let ctx = RuleContext::new(aggregate, &self.config);
        let hits: Vec<RuleHit> = self.rules.iter().filter_map(|r| r.evaluate(&ctx)).collect();
        let (wastage_score, priority) = fold_hits(&hits);

        if wastage_score == 0 {
            return None;
        }

        let estimated_savings = estimate_savings(aggregate.total_cost, wastage_score);

        Some(ScoreCard {
            hits,
            wastage_score,
            priority,
            estimated_savings,
            estimated_monthly_savings: estimated_savings * MONTHLY_FACTOR,
            confidence_score: (f64::from(wastage_score) / 10.0).min(MAX_CONFIDENCE),
        })
    }

    /// Score one aggregate, stamping a fresh id and creation time
    pub fn score(&self, aggregate: &ResourceAggregate) -> Option<WasteRecommendation> {
        self.score_at(aggregate, Utc::now())
    }

    pub fn score_at(
        &self,
        aggregate: &ResourceAggregate,
        now: DateTime<Utc>,
    ) -> Option<WasteRecommendation> {
        let card = self.evaluate(aggregate)?;

        Some(WasteRecommendation {
            id: recommendation_id(now),
            resource_id: aggregate.resource_id.clone(),
            service_type: aggregate.service_type.clone(),
            instance_type: aggregate.instance_type.clone(),
            availability_zone: aggregate.availability_zone.clone(),
            current_cost: aggregate.total_cost,
            total_usage: aggregate.total_usage,
            wastage_score: card.wastage_score,
            priority: card.priority,
            estimated_savings: card.estimated_savings,
            estimated_monthly_savings: card.estimated_monthly_savings,
            reasons: card.reasons(),
            confidence_score: card.confidence_score,
            status: RecommendationStatus::Active,
            created_at: now,
        })
    }

    /// Score every aggregate in discovery order
    pub fn score_all(&self, aggregates: &ResourceAggregates) -> Vec<WasteRecommendation> {
        let now = Utc::now();
        aggregates
            .iter()
            .filter_map(|agg| self.score_at(agg, now))
            .collect()
    }
}

impl Default for WasteScorer {
    fn default() -> Self {
        Self::new()
    }
}
