//! Billing usage ingestion and aggregation
//!
//! This module provides:
//! - CSV parsing of cost-and-usage rows into typed records
//! - Per-resource aggregation with deterministic discovery order
//! - Cost spike detection and daily spend trend analysis

mod aggregator;
mod anomaly;
mod ingest;

pub use aggregator::{aggregate, ResourceAggregates, UsageAggregator};
pub use anomaly::{
    analyze_cost_trend, cost_trend, daily_costs, AnomalyReport, AnomalySeverity, CostAnomaly,
    CostAnomalyDetector, CostTrend, CostTrendReport,
};
pub use ingest::{
    decode_records, partition_valid, read_usage, read_usage_file, validate_record, IngestReport,
    SkippedRow,
};
