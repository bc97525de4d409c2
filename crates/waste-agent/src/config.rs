//! Agent configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use waste_lib::alert::AlertConfig;
use waste_lib::forecast::EnsembleConfig;
use waste_lib::scoring::ScoringConfig;
use waste_lib::PipelineConfig;

/// Environment variable prefix, e.g. `CWD_API_PORT`
pub const ENV_PREFIX: &str = "CWD";

/// Separator for nested keys, e.g. `CWD_SCORING__PRIMARY_ZONE`
pub const ENV_SEPARATOR: &str = "__";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name reported in logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the forecasting jobs' result documents
    #[serde(default = "default_forecast_dir")]
    pub forecast_dir: PathBuf,

    /// Alerts are POSTed here when set; otherwise they are only logged
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_notifier_timeout")]
    pub notifier_timeout_secs: u64,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub ensemble: EnsembleConfig,

    #[serde(default)]
    pub alerts: AlertConfig,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_forecast_dir() -> PathBuf {
    PathBuf::from("ml-results")
}

fn default_notifier_timeout() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            forecast_dir: default_forecast_dir(),
            webhook_url: None,
            notifier_timeout_secs: default_notifier_timeout(),
            scoring: ScoringConfig::default(),
            ensemble: EnsembleConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from `CWD_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_env(Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("scoring.large_instance_types")
            .with_list_parse_key("scoring.compute_markers")
            .with_list_parse_key("scoring.storage_markers")
    }

    fn from_env(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env)
            .build()
            .context("Failed to read agent configuration")?;

        config
            .try_deserialize()
            .context("Invalid agent configuration")
    }

    /// Settings for the detector pipeline
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            node_name: self.node_name.clone(),
            scoring: self.scoring.clone(),
            ensemble: self.ensemble.clone(),
            alerts: self.alerts.clone(),
        }
    }
}
