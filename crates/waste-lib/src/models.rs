//! Core data models for the waste detector

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Service type used when a billing row carries no product name
pub const DEFAULT_SERVICE_TYPE: &str = "Unknown Service";

/// Availability zone used when a billing row carries none
pub const DEFAULT_AVAILABILITY_ZONE: &str = "ap-south-1a";

/// Instance type used when a billing row carries none
pub const DEFAULT_INSTANCE_TYPE: &str = "unknown";

fn default_service_type() -> String {
    DEFAULT_SERVICE_TYPE.to_string()
}

fn default_availability_zone() -> String {
    DEFAULT_AVAILABILITY_ZONE.to_string()
}

fn default_instance_type() -> String {
    DEFAULT_INSTANCE_TYPE.to_string()
}

/// A single billing line item for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub resource_id: String,
    #[serde(default = "default_service_type")]
    pub service_type: String,
    pub usage_amount: f64,
    pub cost: f64,
    #[serde(default = "default_availability_zone")]
    pub availability_zone: String,
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl UsageRecord {
    /// Create a record with default zone, instance type and the current time
    pub fn new(
        resource_id: impl Into<String>,
        service_type: impl Into<String>,
        usage_amount: f64,
        cost: f64,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            service_type: service_type.into(),
            usage_amount,
            cost,
            availability_zone: default_availability_zone(),
            instance_type: default_instance_type(),
            timestamp: Utc::now(),
            usage_type: None,
            operation: None,
            region: None,
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = zone.into();
        self
    }

    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// True when the record carries neither usage nor cost
    pub fn is_empty_signal(&self) -> bool {
        self.usage_amount == 0.0 && self.cost == 0.0
    }
}

/// Usage collapsed to one entry per resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAggregate {
    pub resource_id: String,
    pub service_type: String,
    pub instance_type: String,
    pub availability_zone: String,
    pub total_cost: f64,
    pub total_usage: f64,
    pub record_count: u32,
}

impl ResourceAggregate {
    /// Average usage per billing record, zero when there are no records
    pub fn avg_usage(&self) -> f64 {
        if self.record_count == 0 {
            return 0.0;
        }
        self.total_usage / f64::from(self.record_count)
    }

    /// Cost per unit of usage, zero when no usage was recorded
    pub fn cost_per_usage_unit(&self) -> f64 {
        if self.total_usage <= 0.0 {
            return 0.0;
        }
        self.total_cost / self.total_usage
    }
}

/// Recommendation priority, ordered Low < Medium < High
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Numeric rank used for ordering (High=3, Medium=2, Low=1)
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Recommendation lifecycle; only `Active` is set here, the rest belong to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationStatus {
    Active,
    Resolved,
    Terminated,
}

impl std::fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendationStatus::Active => write!(f, "Active"),
            RecommendationStatus::Resolved => write!(f, "Resolved"),
            RecommendationStatus::Terminated => write!(f, "Terminated"),
        }
    }
}

impl std::str::FromStr for RecommendationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(RecommendationStatus::Active),
            "resolved" => Ok(RecommendationStatus::Resolved),
            "terminated" => Ok(RecommendationStatus::Terminated),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Quantified savings recommendation for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteRecommendation {
    pub id: String,
    pub resource_id: String,
    pub service_type: String,
    pub instance_type: String,
    pub availability_zone: String,
    pub current_cost: f64,
    pub total_usage: f64,
    pub wastage_score: u32,
    pub priority: Priority,
    pub estimated_savings: f64,
    pub estimated_monthly_savings: f64,
    pub reasons: Vec<String>,
    pub confidence_score: f64,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
}

/// Forecasting model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Classical time-series model (ARIMA)
    Statistical,
    /// Machine-learning time-series model (Prophet)
    MachineLearning,
}

impl ModelFamily {
    /// Model name assumed when a result document does not name itself
    pub fn default_model_name(&self) -> &'static str {
        match self {
            ModelFamily::Statistical => "arima",
            ModelFamily::MachineLearning => "prophet",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFamily::Statistical => write!(f, "statistical"),
            ModelFamily::MachineLearning => write!(f, "machine_learning"),
        }
    }
}

/// Output of one forecasting model, consumed as a black box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub model_name: String,
    pub avg_predicted_cost: f64,
    pub mape: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_direction: Option<String>,
}

impl ForecastSummary {
    pub fn new(model_name: impl Into<String>, avg_predicted_cost: f64, mape: f64) -> Self {
        Self {
            model_name: model_name.into(),
            avg_predicted_cost,
            mape,
            trend_direction: None,
        }
    }
}

/// Cost trend relative to the configured baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Decreasing,
    Stable,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Decreasing => write!(f, "decreasing"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

/// Suggested follow-up for an ensemble forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastAction {
    Monitor,
    Investigate,
}

impl std::fmt::Display for ForecastAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForecastAction::Monitor => write!(f, "monitor"),
            ForecastAction::Investigate => write!(f, "investigate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRange {
    pub min: f64,
    pub max: f64,
}

/// Normalized ensemble weights; always sum to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub statistical: f64,
    pub ml: f64,
}

/// Risk flags derived from the ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastSignals {
    /// Ensemble prediction exceeds the budget ceiling
    pub high_cost_risk: bool,
    /// Models disagree by more than the volatility limit
    pub volatility_concern: bool,
}

/// Confidence-weighted combination of two model forecasts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleForecast {
    pub prediction_date: NaiveDate,
    pub ensemble_prediction: f64,
    pub confidence_score: f64,
    pub trend: Trend,
    pub recommendation: ForecastAction,
    pub forecast_range: ForecastRange,
    pub weights: ModelWeights,
    pub model_agreement: f64,
    pub signals: ForecastSignals,
    pub created_at: DateTime<Utc>,
}
