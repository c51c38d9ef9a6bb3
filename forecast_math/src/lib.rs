//! # Forecast Math
//!
//! Numeric building blocks for additive time series models.
//! This crate provides the pieces the forecasting core fits with:
//! dense symmetric solves, Fourier feature bases and a limited-memory
//! quasi-Newton minimizer.

use thiserror::Error;

pub mod fourier;
pub mod linalg;
pub mod optimize;

/// Errors that can occur in numeric routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("{dimension}x{dimension} matrix is not positive definite")]
    NotPositiveDefinite { dimension: usize },

    #[error("Did not converge after {iterations} iterations: {reason}")]
    DidNotConverge { iterations: usize, reason: String },

    /// The optimizer itself failed, e.g. a line search found no acceptable step
    #[error("Optimizer failed: {0}")]
    OptimizerFailed(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Dot product of two equally sized slices
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
