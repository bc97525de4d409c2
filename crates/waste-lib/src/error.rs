//! Typed failures surfaced by the waste detector core

use thiserror::Error;

use crate::models::ModelFamily;

/// A billing row that could not be turned into a usage record
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field `{field}` must be a finite non-negative number, got {value}")]
    NegativeValue { field: &'static str, value: f64 },

    #[error("usage record could not be decoded: {0}")]
    Undecodable(#[from] serde_json::Error),

    #[error("malformed CSV row: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read usage data: {0}")]
    Io(#[from] std::io::Error),
}

/// The ensemble could not be computed
#[derive(Debug, Clone, Error)]
pub enum EnsembleError {
    #[error("missing forecast data for the {0} model")]
    MissingForecastData(ModelFamily),

    #[error("invalid forecast from `{model}`: {reason}")]
    InvalidForecast { model: String, reason: String },
}

/// A forecast provider failed to produce a summary
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read forecast results: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse forecast document {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Alert delivery failed
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Any failure the core reports to a caller
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Ensemble(#[from] EnsembleError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl Error {
    /// Stable category name for callers and API responses
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Ingest(_) => "ingest",
            Error::Ensemble(EnsembleError::MissingForecastData(_)) => "missing_forecast_data",
            Error::Ensemble(EnsembleError::InvalidForecast { .. }) => "invalid_forecast",
            Error::Source(_) => "forecast_source",
            Error::Notify(_) => "notification",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let missing: Error = EnsembleError::MissingForecastData(ModelFamily::Statistical).into();
        let invalid: Error = EnsembleError::InvalidForecast {
            model: "arima".to_string(),
            reason: "zero cost".to_string(),
        }
        .into();
        let notify: Error = NotifyError::Transport("timeout".to_string()).into();
        let ingest: Error = IngestError::MissingField { field: "resource_id" }.into();
        let undecodable: Error =
            IngestError::from(serde_json::from_str::<f64>("\"abc\"").unwrap_err()).into();

        assert_eq!(missing.kind(), "missing_forecast_data");
        assert_eq!(invalid.kind(), "invalid_forecast");
        assert_eq!(notify.kind(), "notification");
        assert_eq!(ingest.kind(), "ingest");
        assert_eq!(undecodable.kind(), "ingest");
    }

    #[test]
    fn test_missing_forecast_message_names_family() {
        let err = EnsembleError::MissingForecastData(ModelFamily::MachineLearning);
        assert_eq!(
            err.to_string(),
            "missing forecast data for the machine_learning model"
        );
    }
}
