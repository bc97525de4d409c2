//! Directory-backed forecast provider
//!
//! Reads the result documents written by the forecasting jobs:
//! - `arima_results_*.json` for the statistical model
//! - `prophet_results_*.json` for the machine-learning model
//!
//! File names carry a sortable timestamp, so the greatest name is the latest.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use super::ForecastSource;
use crate::error::SourceError;
use crate::models::{ForecastSummary, ModelFamily};

/// Default file prefix for statistical model results
pub const STATISTICAL_PREFIX: &str = "arima_results_";

/// Default file prefix for machine-learning model results
pub const ML_PREFIX: &str = "prophet_results_";

/// On-disk shape of one model result
#[derive(Debug, Clone, Deserialize)]
pub struct ModelResultDocument {
    #[serde(default)]
    pub model_name: Option<String>,
    pub forecast_summary: ForecastSection,
    pub performance_metrics: PerformanceSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastSection {
    pub avg_predicted_cost: f64,
    #[serde(default)]
    pub trend_direction: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceSection {
    pub mape: f64,
}

impl ModelResultDocument {
    pub fn into_summary(self, family: ModelFamily) -> ForecastSummary {
        ForecastSummary {
            model_name: self
                .model_name
                .unwrap_or_else(|| family.default_model_name().to_string()),
            avg_predicted_cost: self.forecast_summary.avg_predicted_cost,
            mape: self.performance_metrics.mape,
            trend_direction: self.forecast_summary.trend_direction,
        }
    }
}

/// Forecast provider reading model result documents from a directory
#[derive(Debug, Clone)]
pub struct DirectoryForecastSource {
    dir: PathBuf,
    statistical_prefix: String,
    ml_prefix: String,
}

impl DirectoryForecastSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            statistical_prefix: STATISTICAL_PREFIX.to_string(),
            ml_prefix: ML_PREFIX.to_string(),
        }
    }

    /// Override the file prefix used for one model family
    pub fn with_prefix(mut self, family: ModelFamily, prefix: impl Into<String>) -> Self {
        match family {
            ModelFamily::Statistical => self.statistical_prefix = prefix.into(),
            ModelFamily::MachineLearning => self.ml_prefix = prefix.into(),
        }
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn prefix(&self, family: ModelFamily) -> &str {
        match family {
            ModelFamily::Statistical => &self.statistical_prefix,
            ModelFamily::MachineLearning => &self.ml_prefix,
        }
    }

    /// Latest result file for a family, if any
    pub async fn latest_path(&self, family: ModelFamily) -> Result<Option<PathBuf>, SourceError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let prefix = self.prefix(family);
        let mut latest: Option<String> = None;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(prefix) || !name.ends_with(".json") {
                continue;
            }
            if latest.as_deref().map_or(true, |current| name.as_str() > current) {
                latest = Some(name);
            }
        }

        Ok(latest.map(|name| self.dir.join(name)))
    }
}

#[async_trait]
impl ForecastSource for DirectoryForecastSource {
    async fn latest(&self, family: ModelFamily) -> Result<Option<ForecastSummary>, SourceError> {
        let Some(path) = self.latest_path(family).await? else {
            debug!(family = %family, dir = %self.dir.display(), "No forecast results found");
            return Ok(None);
        };

        let content = fs::read(&path).await?;
        let document: ModelResultDocument =
            serde_json::from_slice(&content).map_err(|source| SourceError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        debug!(family = %family, path = %path.display(), "Loaded forecast results");
        Ok(Some(document.into_summary(family)))
    }
}
