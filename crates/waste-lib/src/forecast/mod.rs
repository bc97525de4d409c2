//! Cost forecast ensembling
//!
//! This module provides:
//! - The provider contract for the two model summaries
//! - A directory-backed provider reading model result documents
//! - The inverse-error weighted ensemble combiner

mod ensemble;
mod source;

pub use ensemble::{model_weights, EnsembleCombiner, EnsembleConfig, FALLBACK_WEIGHT};
pub use source::{DirectoryForecastSource, ModelResultDocument};

use async_trait::async_trait;

use crate::error::{EnsembleError, Error, SourceError};
use crate::models::{ForecastSummary, ModelFamily};

/// Supplies the latest forecast summary for a model family
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// `Ok(None)` when the provider has no result for the family
    async fn latest(&self, family: ModelFamily) -> Result<Option<ForecastSummary>, SourceError>;
}

/// Both model summaries required by the combiner
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPair {
    pub statistical: ForecastSummary,
    pub ml: ForecastSummary,
}

impl ForecastPair {
    pub fn new(statistical: ForecastSummary, ml: ForecastSummary) -> Self {
        Self { statistical, ml }
    }

    /// Require both summaries; a one-sided ensemble is never attempted
    pub fn from_options(
        statistical: Option<ForecastSummary>,
        ml: Option<ForecastSummary>,
    ) -> Result<Self, EnsembleError> {
        let statistical =
            statistical.ok_or(EnsembleError::MissingForecastData(ModelFamily::Statistical))?;
        let ml = ml.ok_or(EnsembleError::MissingForecastData(ModelFamily::MachineLearning))?;
        Ok(Self { statistical, ml })
    }
}

/// Fetch both summaries from a provider
pub async fn load_pair(source: &dyn ForecastSource) -> Result<ForecastPair, Error> {
    let statistical = source.latest(ModelFamily::Statistical).await?;
    let ml = source.latest(ModelFamily::MachineLearning).await?;
    Ok(ForecastPair::from_options(statistical, ml)?)
}
