//! Cloud waste detector agent
//!
//! Serves the scoring and forecasting API over the detector pipeline,
//! delivering alerts through a webhook when one is configured.

pub mod api;
pub mod config;
pub mod notifier;
