use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the forecasting pipeline
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Insufficient history for {date}: {reason}")]
    InsufficientHistory { date: NaiveDate, reason: String },

    #[error("Irregular series: {0}")]
    IrregularSeries(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Shape mismatch: {predicted} predictions vs {actual} actuals")]
    ShapeMismatch { predicted: usize, actual: usize },

    #[error("Training cancelled: {0}")]
    Cancelled(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

impl ForecastError {
    pub fn insufficient_history(date: NaiveDate, reason: impl Into<String>) -> Self {
        Self::InsufficientHistory { date, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
