//! Core library for the cloud waste detector
//!
//! This crate provides the core functionality for:
//! - Billing usage ingestion and per-resource aggregation
//! - Rule-based waste scoring and recommendation ranking
//! - Cost spike detection and daily spend trends
//! - Ensemble combination of statistical and ML cost forecasts
//! - Alert construction and dispatch
//! - Terraform remediation plans for recommended resources
//! - Health checks and observability

pub mod alert;
pub mod error;
pub mod forecast;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod remediation;
pub mod scoring;
pub mod usage;

pub use error::{EnsembleError, Error, IngestError, NotifyError, SourceError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{StructuredLogger, WasteMetrics};
pub use pipeline::{ForecastOutcome, PipelineConfig, ScoringOutcome, WastePipeline};
pub use remediation::{RemediationConfig, RemediationPlan};
