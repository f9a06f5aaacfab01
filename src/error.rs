// src/error.rs
use serde::Serialize;
use thiserror::Error;

/// Everything that can stop a forecast run.
///
/// Row-level rejection inside the normalizer is not represented here:
/// malformed rows are filtered out, never escalated.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid file type `{media_type}` for {name}; expected text/csv")]
    InvalidFileType { name: String, media_type: String },

    #[error("no input file was provided")]
    NoFileSelected,

    #[error("failed to parse CSV: {0}")]
    ParseFailure(String),

    #[error("no valid enrollment records in input")]
    NoValidData,

    #[error("need at least {required} records to fit a trend, got {actual}")]
    InsufficientDataForFit { required: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("model fitting failed: {0}")]
    FittingError(String),

    #[error("fitting was cancelled")]
    Cancelled,
}

/// Fieldless classification of a [`ForecastError`], for status displays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFileType,
    NoFileSelected,
    ParseFailure,
    NoValidData,
    InsufficientDataForFit,
    InvalidConfiguration,
    FittingError,
    Cancelled,
}

impl ForecastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForecastError::InvalidFileType { .. } => ErrorKind::InvalidFileType,
            ForecastError::NoFileSelected => ErrorKind::NoFileSelected,
            ForecastError::ParseFailure(_) => ErrorKind::ParseFailure,
            ForecastError::NoValidData => ErrorKind::NoValidData,
            ForecastError::InsufficientDataForFit { .. } => ErrorKind::InsufficientDataForFit,
            ForecastError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            ForecastError::FittingError(_) => ErrorKind::FittingError,
            ForecastError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ForecastError::InvalidConfiguration(msg.into())
    }
}

impl ErrorKind {
    /// The sentence shown to an end user for this condition.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidFileType => "Invalid file type. Please upload a CSV file.",
            ErrorKind::NoFileSelected => "No file selected.",
            ErrorKind::ParseFailure => "Failed to parse the CSV file. Please check the format.",
            ErrorKind::NoValidData => "No valid data found in the CSV file.",
            ErrorKind::InsufficientDataForFit => {
                "Not enough valid records to predict a trend. Please upload more data."
            }
            ErrorKind::InvalidConfiguration => {
                "Invalid settings. Please check the section capacity and forecast target."
            }
            ErrorKind::FittingError => "An error occurred during prediction.",
            ErrorKind::Cancelled => "Prediction was cancelled.",
        }
    }
}
