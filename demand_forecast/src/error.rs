//! Error types for the demand_forecast crate

use forecast_math::MathError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A date or number could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Structural problem with the input: duplicate timestamps, missing columns
    #[error("Data error: {0}")]
    DataError(String),

    /// Fewer usable observations than the operation needs
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The optimizer failed to reach an acceptable solution within budget
    #[error("Convergence error: {0}")]
    ConvergenceError(String),

    /// Bad configuration or argument, e.g. a non-positive horizon
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from (de)serializing models or configuration
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from writing CSV output
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from the numeric kernels that is not a convergence failure
    #[error("Math error: {0}")]
    MathError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::DidNotConverge { .. }
            | MathError::NotPositiveDefinite { .. }
            | MathError::OptimizerFailed(_) => {
                ForecastError::ConvergenceError(err.to_string())
            }
            MathError::InsufficientData(msg) => ForecastError::InsufficientData(msg),
            MathError::InvalidInput(msg) => ForecastError::InvalidArgument(msg),
            MathError::CalculationError(msg) => ForecastError::MathError(msg),
        }
    }
}

impl From<chrono::ParseError> for ForecastError {
    fn from(err: chrono::ParseError) -> Self {
        ForecastError::ParseError(err.to_string())
    }
}
