//! Metrics for evaluating forecast performance

use crate::config::ForecastConfig;
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::holidays::HolidayTable;
use crate::models::{fit, FittedModel, ForecastRow};
use crate::utils::train_test_split;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Forecast accuracy metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error over non-zero actuals
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
}

impl std::fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Accuracy:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  MSE:   {:.4}", self.mse)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  MAPE:  {:.2}%", self.mape)?;
        writeln!(f, "  SMAPE: {:.2}%", self.smape)?;
        Ok(())
    }
}

/// Calculate accuracy metrics of a forecast against actual values
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::InvalidArgument(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;
    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual)
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // zero sales days are common, so MAPE only averages over the others
    let (ape_sum, ape_count) = actual
        .iter()
        .zip(&errors)
        .filter(|(&a, _)| a != 0.0)
        .fold((0.0, 0usize), |(sum, count), (&a, &e)| {
            (sum + e.abs() / a.abs() * 100.0, count + 1)
        });
    let mape = if ape_count > 0 {
        ape_sum / ape_count as f64
    } else {
        0.0
    };

    let smape = actual
        .iter()
        .zip(forecast)
        .map(|(&a, &f)| {
            let denom = a.abs() + f.abs();
            if denom == 0.0 {
                0.0
            } else {
                200.0 * (a - f).abs() / denom
            }
        })
        .sum::<f64>()
        / n;

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse,
        mape,
        smape,
    })
}

/// Share of actual values inside their forecast interval
pub fn interval_coverage(rows: &[ForecastRow], actual: &[f64]) -> Result<f64> {
    if rows.len() != actual.len() || rows.is_empty() {
        return Err(ForecastError::InvalidArgument(
            "Forecast rows and actual values must have the same non-zero length".to_string(),
        ));
    }
    let inside = rows
        .iter()
        .zip(actual)
        .filter(|(r, &a)| a >= r.lower_bound && a <= r.upper_bound)
        .count();
    Ok(inside as f64 / rows.len() as f64)
}

/// Accuracy of a model on its own training data
pub fn in_sample_accuracy(model: &FittedModel) -> Result<ForecastAccuracy> {
    let history = model.history();
    let forecast = model.predict(&history.dates())?;
    forecast_accuracy(&forecast.point_estimates(), &history.values())
}

/// Result of fitting on a training prefix and scoring the held-out suffix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldoutEvaluation {
    pub train_size: usize,
    pub test_size: usize,
    pub accuracy: ForecastAccuracy,
    /// Fraction of held-out values inside the prediction interval
    pub coverage: f64,
}

/// Fit on all but the last `test_size` observations and score the rest
pub fn evaluate_holdout(
    series: &Series,
    holidays: &HolidayTable,
    config: &ForecastConfig,
    test_size: usize,
) -> Result<HoldoutEvaluation> {
    let (train, test) = train_test_split(series, test_size)?;
    let model = fit(&train, holidays, config)?;

    let dates: Vec<_> = test.iter().map(|o| o.date).collect();
    let actual: Vec<f64> = test.iter().map(|o| o.value).collect();
    let forecast = model.predict(&dates)?;

    let accuracy = forecast_accuracy(&forecast.point_estimates(), &actual)?;
    let coverage = interval_coverage(forecast.rows(), &actual)?;
    info!(
        train = train.len(),
        test = test.len(),
        mae = accuracy.mae,
        coverage,
        "holdout evaluation"
    );

    Ok(HoldoutEvaluation {
        train_size: train.len(),
        test_size: test.len(),
        accuracy,
        coverage,
    })
}
