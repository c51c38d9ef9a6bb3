//! Time series data handling for forecasting
//!
//! Raw sales tables come in as polars `DataFrame`s. `SeriesPreparer` projects
//! them onto `(date, value)` pairs, drops malformed rows and produces a
//! `Series` with strictly increasing dates.

use crate::error::{ForecastError, Result};
use crate::utils::date_parser::parse_date;
use chrono::NaiveDate;
use polars::prelude::{CsvReader, DataFrame, DataType, SerReader, Series as PolarsSeries};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

/// A single dated measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Calendar date of the measurement
    pub date: NaiveDate,
    /// Measured value
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Ordered time series with unique dates and finite values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    observations: Vec<Observation>,
}

impl Series {
    /// Build a series, sorting by date and rejecting duplicates or non-finite values
    pub fn from_observations(mut observations: Vec<Observation>) -> Result<Self> {
        if let Some(bad) = observations.iter().find(|o| !o.value.is_finite()) {
            return Err(ForecastError::DataError(format!(
                "Non-finite value {} on {}",
                bad.value, bad.date
            )));
        }
        observations.sort_by_key(|o| o.date);
        if let Some(pair) = observations.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(ForecastError::DataError(format!(
                "Duplicate timestamp {}",
                pair[0].date
            )));
        }
        Ok(Self { observations })
    }

    /// Build a series from parallel date and value slices
    pub fn from_parts(dates: &[NaiveDate], values: &[f64]) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Got {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        Self::from_observations(
            dates
                .iter()
                .zip(values)
                .map(|(&d, &v)| Observation::new(d, v))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// First date, if any
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    /// Last date, if any
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }
}

/// Turns raw tables into clean series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPreparer {
    time_column: String,
    value_column: String,
}

impl Default for SeriesPreparer {
    fn default() -> Self {
        Self::new("date", "sales")
    }
}

impl SeriesPreparer {
    /// Create a preparer reading the given time and value columns
    pub fn new(time_column: impl Into<String>, value_column: impl Into<String>) -> Self {
        Self {
            time_column: time_column.into(),
            value_column: value_column.into(),
        }
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    /// Prepare a series from a data frame
    ///
    /// Rows with a missing or unparseable date, or a missing, non-numeric or
    /// non-finite value are dropped. Duplicate dates are an error.
    pub fn prepare(&self, df: &DataFrame) -> Result<Series> {
        let dates = string_column(df, &self.time_column)?;
        let values = float_column(df, &self.value_column)?;

        let records = dates
            .iter()
            .zip(values.iter())
            .map(|(d, v)| (d.as_deref(), *v));
        self.prepare_records(records)
    }

    /// Prepare a series from `(date, value)` records, with the same policy as [`prepare`](Self::prepare)
    pub fn prepare_records<'a, I>(&self, records: I) -> Result<Series>
    where
        I: IntoIterator<Item = (Option<&'a str>, Option<f64>)>,
    {
        let mut observations = Vec::new();
        let mut dropped = 0usize;

        for (raw_date, raw_value) in records {
            let date = match raw_date.map(parse_date) {
                Some(Ok(d)) => d,
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            match raw_value {
                Some(v) if v.is_finite() => observations.push(Observation::new(date, v)),
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(
                dropped,
                kept = observations.len(),
                time_column = %self.time_column,
                value_column = %self.value_column,
                "dropped malformed rows"
            );
        }

        let series = Series::from_observations(observations)?;
        if series.len() < 2 {
            return Err(ForecastError::InsufficientData(format!(
                "Need at least 2 valid rows, got {}",
                series.len()
            )));
        }
        debug!(
            rows = series.len(),
            first = ?series.first_date(),
            last = ?series.last_date(),
            "prepared series"
        );
        Ok(series)
    }
}

/// Data loader for sales and holiday tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a table from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;
        Ok(df)
    }
}

/// Check that a column exists, with a `DataError` naming it otherwise
pub(crate) fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a PolarsSeries> {
    df.column(name).map_err(|_| {
        ForecastError::DataError(format!(
            "Missing column '{}' (available: {})",
            name,
            df.get_column_names().join(", ")
        ))
    })
}

/// Read a column as optional strings, whatever its stored type
pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = require_column(df, name)?;
    let cast = column.cast(&DataType::Utf8)?;
    let strings = cast.utf8()?;
    Ok(strings.into_iter().map(|s| s.map(str::to_string)).collect())
}

/// Read a column as optional floats; cells that do not convert become `None`
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name)?;
    let cast = column.cast(&DataType::Float64)?;
    let floats = cast.f64()?;
    Ok(floats.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;
    use polars::prelude::NamedFrom;
    use pretty_assertions::assert_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_series_sorts_observations() {
        let series = Series::from_parts(&[d(2017, 1, 3), d(2017, 1, 1)], &[3.0, 1.0]).unwrap();
        assert_eq!(series.dates(), vec![d(2017, 1, 1), d(2017, 1, 3)]);
        assert_eq!(series.values(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_series_rejects_duplicates() {
        let result = Series::from_parts(&[d(2017, 1, 1), d(2017, 1, 1)], &[1.0, 2.0]);
        assert!(matches!(result, Err(ForecastError::DataError(msg)) if msg.contains("2017-01-01")));
    }

    #[test]
    fn test_prepare_records_drops_malformed_rows() {
        let preparer = SeriesPreparer::default();
        let series = preparer
            .prepare_records(vec![
                (Some("2017-01-02"), Some(2.0)),
                (Some("garbage"), Some(5.0)),
                (None, Some(5.0)),
                (Some("2017-01-03"), None),
                (Some("2017-01-04"), Some(f64::NAN)),
                (Some("2017-01-01"), Some(1.0)),
            ])
            .unwrap();
        assert_eq!(series.dates(), vec![d(2017, 1, 1), d(2017, 1, 2)]);
    }

    #[test]
    fn test_prepare_records_insufficient() {
        let preparer = SeriesPreparer::default();
        let result = preparer.prepare_records(vec![(Some("2017-01-01"), Some(1.0))]);
        assert!(matches!(result, Err(ForecastError::InsufficientData(_))));
    }

    #[test]
    fn test_prepare_from_dataframe() {
        let df = df! {
            "date" => &["2017-01-02", "2017-01-01", "bad", "2017-01-03"],
            "sales" => &["2.5", "1.5", "3.0", "n/a"],
        }
        .unwrap();
        let series = SeriesPreparer::default().prepare(&df).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.values(), vec![1.5, 2.5]);
    }

    #[test]
    fn test_prepare_missing_column() {
        let df = df! {
            "ds" => &["2017-01-01", "2017-01-02"],
            "sales" => &[1.0, 2.0],
        }
        .unwrap();
        let result = SeriesPreparer::default().prepare(&df);
        assert!(matches!(result, Err(ForecastError::DataError(msg)) if msg.contains("date")));
    }
}
