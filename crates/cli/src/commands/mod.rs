//! CLI command implementations

pub mod analyze;
pub mod forecast;
pub mod get;
pub mod remediate;
pub mod score;
