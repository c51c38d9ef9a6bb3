//! Store/family selection and forecast runs over the sales table

use crate::{AppError, Result};
use demand_forecast::models::TrainedForecastModel;
use demand_forecast::{
    fit, FittedModel, Forecast, ForecastConfig, Frequency, HolidayTable, Series, SeriesPreparer,
};
use polars::prelude::{BooleanChunked, DataFrame, DataType};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Column names of the sales table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesColumns {
    pub store: String,
    pub family: String,
    pub date: String,
    pub sales: String,
}

impl Default for SalesColumns {
    fn default() -> Self {
        Self {
            store: "store_nbr".to_string(),
            family: "family".to_string(),
            date: "date".to_string(),
            sales: "sales".to_string(),
        }
    }
}

/// What to forecast and how far ahead
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub store: String,
    pub family: String,
    pub horizon: usize,
    pub frequency: Frequency,
}

impl ForecastRequest {
    /// Daily forecast 90 days past the end of the history
    pub fn new(store: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            family: family.into(),
            horizon: 90,
            frequency: Frequency::Daily,
        }
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }
}

/// A fitted model together with its forecast over history and horizon
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub store: String,
    pub family: String,
    pub model: FittedModel,
    pub forecast: Forecast,
}

/// Sorted distinct values of a column, numeric values in numeric order
pub fn distinct_values(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let values = df.column(column)?.cast(&DataType::Utf8)?;
    let set: BTreeSet<String> = values
        .utf8()?
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    let mut out: Vec<String> = set.into_iter().collect();
    out.sort_by_key(|v| (v.parse::<i64>().ok(), v.clone()));
    Ok(out)
}

/// The daily series of one store and product family
pub fn select_series(
    df: &DataFrame,
    columns: &SalesColumns,
    store: &str,
    family: &str,
) -> Result<Series> {
    let stores = df.column(&columns.store)?.cast(&DataType::Utf8)?;
    let families = df.column(&columns.family)?.cast(&DataType::Utf8)?;
    let mask: BooleanChunked = stores
        .utf8()?
        .into_iter()
        .zip(families.utf8()?.into_iter())
        .map(|(s, f)| s.map(str::trim) == Some(store) && f.map(str::trim) == Some(family))
        .collect();

    let rows = df.filter(&mask)?;
    if rows.height() == 0 {
        return Err(AppError::NoSuchSeries {
            store: store.to_string(),
            family: family.to_string(),
        });
    }
    Ok(SeriesPreparer::new(columns.date.as_str(), columns.sales.as_str()).prepare(&rows)?)
}

/// Fit one store/family series and forecast `request.horizon` periods past its end
pub fn run_forecast(
    sales: &DataFrame,
    columns: &SalesColumns,
    holidays: &HolidayTable,
    config: &ForecastConfig,
    request: &ForecastRequest,
) -> Result<ForecastOutcome> {
    let series = select_series(sales, columns, &request.store, &request.family)?;
    let model = fit(&series, holidays, config)?;
    let forecast = model.forecast(request.horizon, request.frequency)?;
    info!(
        store = %request.store,
        family = %request.family,
        history = series.len(),
        horizon = request.horizon,
        "forecast ready"
    );

    Ok(ForecastOutcome {
        store: request.store.clone(),
        family: request.family.clone(),
        model,
        forecast,
    })
}

/// Forecast every family of `store` in parallel
///
/// Each family succeeds or fails on its own; results come back in family order.
pub fn run_batch(
    sales: &DataFrame,
    columns: &SalesColumns,
    holidays: &HolidayTable,
    config: &ForecastConfig,
    store: &str,
    horizon: usize,
) -> Result<Vec<(String, Result<ForecastOutcome>)>> {
    let families = distinct_values(sales, &columns.family)?;
    info!(store, families = families.len(), "starting batch forecast");

    let results: Vec<(String, Result<ForecastOutcome>)> = families
        .into_par_iter()
        .map(|family| {
            let request = ForecastRequest::new(store, family.as_str()).with_horizon(horizon);
            let outcome = run_forecast(sales, columns, holidays, config, &request);
            if let Err(err) = &outcome {
                warn!(store, family = %family, error = %err, "family forecast failed");
            }
            (family, outcome)
        })
        .collect();
    Ok(results)
}
