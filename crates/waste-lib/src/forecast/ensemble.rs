//! Inverse-error weighted ensemble of two cost forecasts
//!
//! Each model is weighted by the reciprocal of its MAPE, so the more accurate
//! model dominates without ever excluding the other. Disagreement between the
//! two predictions lowers the confidence score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ForecastPair;
use crate::error::EnsembleError;
use crate::models::{
    EnsembleForecast, ForecastAction, ForecastRange, ForecastSignals, ForecastSummary,
    ModelWeights, Trend,
};

/// Raw weight for a model whose error metric is unusable
pub const FALLBACK_WEIGHT: f64 = 0.5;

/// Thresholds applied to the combined prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Daily cost below which the trend is "decreasing"
    pub cost_baseline: f64,
    /// Confidence above which the forecast only needs monitoring
    pub monitor_confidence: f64,
    /// Daily cost above which the forecast is a high cost risk
    pub budget_ceiling: f64,
    /// Model disagreement in dollars above which the forecast is volatile
    pub volatility_limit: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            cost_baseline: 2.50,
            monitor_confidence: 70.0,
            budget_ceiling: 3.00,
            volatility_limit: 0.50,
        }
    }
}

fn raw_weight(mape: f64) -> f64 {
    if mape.is_finite() && mape > 0.0 {
        1.0 / mape
    } else {
        FALLBACK_WEIGHT
    }
}

/// Normalized weights for a statistical and ML model error pair
pub fn model_weights(statistical_mape: f64, ml_mape: f64) -> ModelWeights {
    let statistical = raw_weight(statistical_mape);
    let ml = raw_weight(ml_mape);
    let total = statistical + ml;

    ModelWeights {
        statistical: statistical / total,
        ml: ml / total,
    }
}

fn validate(summary: &ForecastSummary) -> Result<(), EnsembleError> {
    let avg = summary.avg_predicted_cost;
    if !avg.is_finite() || avg <= 0.0 {
        return Err(EnsembleError::InvalidForecast {
            model: summary.model_name.clone(),
            reason: format!("avg_predicted_cost must be a positive number, got {}", avg),
        });
    }
    Ok(())
}

/// Combines two model forecasts into one ensemble prediction
#[derive(Debug, Clone, Default)]
pub struct EnsembleCombiner {
    config: EnsembleConfig,
}

impl EnsembleCombiner {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn weights(&self, pair: &ForecastPair) -> ModelWeights {
        model_weights(pair.statistical.mape, pair.ml.mape)
    }

    pub fn combine(&self, pair: &ForecastPair) -> Result<EnsembleForecast, EnsembleError> {
        self.combine_at(pair, Utc::now())
    }

    /// Combine with an explicit creation time; the prediction date is its UTC day
    pub fn combine_at(
        &self,
        pair: &ForecastPair,
        now: DateTime<Utc>,
    ) -> Result<EnsembleForecast, EnsembleError> {
        validate(&pair.statistical)?;
        validate(&pair.ml)?;

        let stat = pair.statistical.avg_predicted_cost;
        let ml = pair.ml.avg_predicted_cost;
        let weights = self.weights(pair);

        let ensemble_prediction = stat * weights.statistical + ml * weights.ml;
        let model_agreement = (stat - ml).abs();
        let confidence_score = (100.0 - model_agreement / stat.max(ml) * 100.0).max(0.0);

        let trend = if ensemble_prediction < self.config.cost_baseline {
            Trend::Decreasing
        } else {
            Trend::Stable
        };

        let recommendation = if confidence_score > self.config.monitor_confidence {
            ForecastAction::Monitor
        } else {
            ForecastAction::Investigate
        };

        Ok(EnsembleForecast {
            prediction_date: now.date_naive(),
            ensemble_prediction,
            confidence_score,
            trend,
            recommendation,
            forecast_range: ForecastRange {
                min: stat.min(ml),
                max: stat.max(ml),
            },
            weights,
            model_agreement,
            signals: ForecastSignals {
                high_cost_risk: ensemble_prediction > self.config.budget_ceiling,
                volatility_concern: model_agreement > self.config.volatility_limit,
            },
            created_at: now,
        })
    }
}
