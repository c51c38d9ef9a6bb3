//! # Forecast App
//!
//! Orchestration around the `demand_forecast` core: cached table loading,
//! store/family selection, single and batch forecasts, and the
//! `forecast_sales` command-line tool.

pub mod cache;
pub mod pipeline;

use demand_forecast::ForecastError;
use polars::prelude::PolarsError;
use thiserror::Error;

pub use crate::cache::TableCache;
pub use crate::pipeline::{
    distinct_values, run_batch, run_forecast, select_series, ForecastOutcome, ForecastRequest,
    SalesColumns,
};

/// Errors surfaced by the orchestration layer
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested store and family have no rows in the sales table
    #[error("No sales for store {store} and family {family}")]
    NoSuchSeries { store: String, family: String },
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<PolarsError> for AppError {
    fn from(err: PolarsError) -> Self {
        AppError::Polars(err.to_string())
    }
}

impl AppError {
    /// One-line message for the person running the tool
    pub fn user_message(&self) -> String {
        match self {
            AppError::Forecast(ForecastError::InsufficientData(msg)) => {
                format!("Not enough history to forecast: {}", msg)
            }
            AppError::Forecast(ForecastError::ConvergenceError(msg)) => {
                format!("The model could not be fitted: {}", msg)
            }
            AppError::Forecast(ForecastError::InvalidArgument(msg)) => {
                format!("Invalid settings: {}", msg)
            }
            AppError::Forecast(ForecastError::IoError(err)) | AppError::Io(err) => {
                format!("Could not read or write a file: {}", err)
            }
            AppError::NoSuchSeries { store, family } => format!(
                "Store {} has no sales recorded for {}; run `options` to list what exists",
                store, family
            ),
            other => format!("Forecast failed: {}", other),
        }
    }
}
