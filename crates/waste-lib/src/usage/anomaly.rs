//! Cost anomaly and trend analysis
//!
//! Flags resources whose peak billed cost spikes far above their own
//! average, and classifies the direction of total daily spend.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UsageRecord;

/// Days averaged at each end of the series when classifying the trend
const TREND_EDGE_DAYS: usize = 3;

/// Relative change of recent over earlier spend that counts as a trend
const TREND_TOLERANCE: f64 = 0.1;

/// How far a resource's costs strayed from its average
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalySeverity {
    Medium,
    High,
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalySeverity::Medium => write!(f, "Medium"),
            AnomalySeverity::High => write!(f, "High"),
        }
    }
}

/// A resource whose peak record cost dwarfs its average
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAnomaly {
    pub resource_id: String,
    pub service_type: String,
    pub average_cost: f64,
    pub spike_cost: f64,
    pub record_count: usize,
    pub severity: AnomalySeverity,
    pub detected_at: DateTime<Utc>,
}

/// Anomalies found in one batch, in resource discovery order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<CostAnomaly>,
    pub high_severity: usize,
    pub medium_severity: usize,
}

impl AnomalyReport {
    pub fn total(&self) -> usize {
        self.anomalies.len()
    }
}

/// Detects per-resource cost spikes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostAnomalyDetector {
    /// Peak over average ratio that counts as a spike
    pub spike_factor: f64,
    /// Peak over average ratio that makes a spike High severity
    pub high_severity_factor: f64,
    /// Resources averaging at or below this cost are never flagged
    pub min_average_cost: f64,
}

impl Default for CostAnomalyDetector {
    fn default() -> Self {
        Self {
            spike_factor: 3.0,
            high_severity_factor: 5.0,
            min_average_cost: 0.1,
        }
    }
}

impl CostAnomalyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check one resource's cost series; a single record is never a spike
    pub fn check(&self, costs: &[f64]) -> Option<(f64, f64, AnomalySeverity)> {
        if costs.len() < 2 {
            return None;
        }

        let average = costs.iter().sum::<f64>() / costs.len() as f64;
        let peak = costs.iter().copied().fold(f64::MIN, f64::max);

        if average <= self.min_average_cost || peak <= average * self.spike_factor {
            return None;
        }

        let severity = if peak > average * self.high_severity_factor {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        };
        Some((average, peak, severity))
    }

    /// Scan a batch and report every spiking resource
    pub fn detect(&self, records: &[UsageRecord]) -> AnomalyReport {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut series: Vec<(&UsageRecord, Vec<f64>)> = Vec::new();

        for record in records {
            match index.get(record.resource_id.as_str()) {
                Some(&i) => series[i].1.push(record.cost),
                None => {
                    index.insert(record.resource_id.as_str(), series.len());
                    series.push((record, vec![record.cost]));
                }
            }
        }

        let detected_at = Utc::now();
        let mut report = AnomalyReport::default();

        for (first, costs) in &series {
            let Some((average_cost, spike_cost, severity)) = self.check(costs) else {
                continue;
            };

            match severity {
                AnomalySeverity::High => report.high_severity += 1,
                AnomalySeverity::Medium => report.medium_severity += 1,
            }
            report.anomalies.push(CostAnomaly {
                resource_id: first.resource_id.clone(),
                service_type: first.service_type.clone(),
                average_cost,
                spike_cost,
                record_count: costs.len(),
                severity,
                detected_at,
            });
        }

        report
    }
}

/// Direction of total daily spend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTrend {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl std::fmt::Display for CostTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostTrend::Increasing => write!(f, "increasing"),
            CostTrend::Decreasing => write!(f, "decreasing"),
            CostTrend::Stable => write!(f, "stable"),
            CostTrend::InsufficientData => write!(f, "insufficient_data"),
        }
    }
}

/// Daily spend statistics for a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTrendReport {
    pub daily_costs: BTreeMap<NaiveDate, f64>,
    pub average_daily_cost: f64,
    pub max_daily_cost: f64,
    pub min_daily_cost: f64,
    /// Sample variance; zero with fewer than two days
    pub cost_variance: f64,
    pub days_analyzed: usize,
    pub trend: CostTrend,
}

/// Total cost per calendar day (UTC) of the record timestamps
pub fn daily_costs(records: &[UsageRecord]) -> BTreeMap<NaiveDate, f64> {
    let mut days = BTreeMap::new();
    for record in records {
        *days.entry(record.timestamp.date_naive()).or_insert(0.0) += record.cost;
    }
    days
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compare the last three days against the first three; the windows
/// overlap when fewer than six days are present
pub fn cost_trend(daily: &BTreeMap<NaiveDate, f64>) -> CostTrend {
    if daily.len() < 2 {
        return CostTrend::InsufficientData;
    }

    let values: Vec<f64> = daily.values().copied().collect();
    let edge = TREND_EDGE_DAYS.min(values.len());
    let earlier = mean(&values[..edge]);
    let recent = mean(&values[values.len() - edge..]);

    if recent > earlier * (1.0 + TREND_TOLERANCE) {
        CostTrend::Increasing
    } else if recent < earlier * (1.0 - TREND_TOLERANCE) {
        CostTrend::Decreasing
    } else {
        CostTrend::Stable
    }
}

/// Summarize daily spend and its direction
pub fn analyze_cost_trend(records: &[UsageRecord]) -> CostTrendReport {
    let daily = daily_costs(records);
    let values: Vec<f64> = daily.values().copied().collect();

    let (average, max, min) = if values.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        (
            mean(&values),
            values.iter().copied().fold(f64::MIN, f64::max),
            values.iter().copied().fold(f64::MAX, f64::min),
        )
    };

    let variance = if values.len() > 1 {
        values.iter().map(|v| (v - average).powi(2)).sum::<f64>() / (values.len() - 1) as f64
    } else {
        0.0
    };

    CostTrendReport {
        trend: cost_trend(&daily),
        days_analyzed: daily.len(),
        daily_costs: daily,
        average_daily_cost: average,
        max_daily_cost: max,
        min_daily_cost: min,
        cost_variance: variance,
    }
}
