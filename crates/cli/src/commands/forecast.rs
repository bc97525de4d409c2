//! Offline ensemble of two model result documents

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use waste_lib::forecast::{
    load_pair, DirectoryForecastSource, EnsembleCombiner, EnsembleConfig, ForecastPair,
    ModelResultDocument,
};
use waste_lib::{EnsembleForecast, ForecastSummary, ModelFamily};

use crate::output::{color_action, color_percent, format_currency, print_json, print_warning, OutputFormat};

/// Where the two model summaries come from
pub enum ForecastInput {
    Files {
        statistical: Option<PathBuf>,
        ml: Option<PathBuf>,
    },
    /// Latest result of each family in a results directory
    Directory(PathBuf),
}

fn read_summary(path: &Path, family: ModelFamily) -> Result<ForecastSummary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} results {}", family, path.display()))?;
    let document: ModelResultDocument = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} results {}", family, path.display()))?;
    Ok(document.into_summary(family))
}

async fn load(input: ForecastInput) -> Result<ForecastPair> {
    match input {
        ForecastInput::Files { statistical, ml } => {
            let statistical = statistical
                .map(|p| read_summary(&p, ModelFamily::Statistical))
                .transpose()?;
            let ml = ml
                .map(|p| read_summary(&p, ModelFamily::MachineLearning))
                .transpose()?;
            Ok(ForecastPair::from_options(statistical, ml)?)
        }
        ForecastInput::Directory(dir) => {
            let source = DirectoryForecastSource::new(dir);
            Ok(load_pair(&source).await?)
        }
    }
}

/// Combine two model forecasts and print the ensemble
pub async fn combine(
    input: ForecastInput,
    config: EnsembleConfig,
    format: OutputFormat,
) -> Result<()> {
    let pair = load(input).await?;
    let combiner = EnsembleCombiner::new(config);
    let forecast = combiner.combine(&pair)?;

    match format {
        OutputFormat::Json => print_json(&forecast)?,
        OutputFormat::Table => print_forecast(&forecast, combiner.config().monitor_confidence),
    }

    Ok(())
}

/// Human-readable ensemble report
pub fn print_forecast(forecast: &EnsembleForecast, monitor_confidence: f64) {
    println!("{}", "Ensemble Cost Forecast".bold());
    println!("{}", "=".repeat(40));
    println!("Date:        {}", forecast.prediction_date);
    println!(
        "Prediction:  {} per day",
        format_currency(forecast.ensemble_prediction).cyan()
    );
    println!(
        "Range:       {} - {}",
        format_currency(forecast.forecast_range.min),
        format_currency(forecast.forecast_range.max)
    );
    println!(
        "Confidence:  {}",
        color_percent(forecast.confidence_score, monitor_confidence)
    );
    println!("Trend:       {}", forecast.trend);
    println!("Action:      {}", color_action(forecast.recommendation));
    println!(
        "Weights:     statistical {:.3}, ml {:.3}",
        forecast.weights.statistical, forecast.weights.ml
    );
    println!("Agreement:   {:.3}", forecast.model_agreement);

    if forecast.signals.high_cost_risk {
        print_warning("Prediction exceeds the budget ceiling");
    }
    if forecast.signals.volatility_concern {
        print_warning("Models disagree beyond the volatility limit");
    }
}
