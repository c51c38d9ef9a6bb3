//! Forecasting models for daily demand series

use crate::config::ForecastConfig;
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::holidays::HolidayTable;
use crate::horizon::Frequency;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub mod decomposition;
pub mod features;
pub mod objective;
pub mod trend;
pub mod uncertainty;

pub use decomposition::{DecomposableModel, FitDiagnostics, FittedModel};

/// One forecast date with its point estimate and interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Contribution of one named component at every forecast date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub values: Vec<f64>,
}

/// Forecast rows plus their additive decomposition
///
/// For every row, `point_estimate = trend + Σ seasonal + holidays_total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    rows: Vec<ForecastRow>,
    trend: Vec<f64>,
    seasonal: Vec<Component>,
    holidays: Vec<Component>,
    holidays_total: Vec<f64>,
}

impl Forecast {
    /// Create a forecast, checking that every component covers every row
    pub fn new(
        rows: Vec<ForecastRow>,
        trend: Vec<f64>,
        seasonal: Vec<Component>,
        holidays: Vec<Component>,
        holidays_total: Vec<f64>,
    ) -> Result<Self> {
        let n = rows.len();
        let mismatch = trend.len() != n
            || holidays_total.len() != n
            || seasonal.iter().chain(&holidays).any(|c| c.values.len() != n);
        if mismatch {
            return Err(ForecastError::DataError(format!(
                "Forecast components do not all cover the {} rows",
                n
            )));
        }
        Ok(Self {
            rows,
            trend,
            seasonal,
            holidays,
            holidays_total,
        })
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn point_estimates(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.point_estimate).collect()
    }

    /// Trend contribution in original units
    pub fn trend(&self) -> &[f64] {
        &self.trend
    }

    pub fn seasonal_components(&self) -> &[Component] {
        &self.seasonal
    }

    pub fn holiday_components(&self) -> &[Component] {
        &self.holidays
    }

    /// Values of the seasonal component called `name`
    pub fn seasonal(&self, name: &str) -> Option<&[f64]> {
        self.seasonal
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Values of the holiday called `name`
    pub fn holiday(&self, name: &str) -> Option<&[f64]> {
        self.holidays
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Sum of all holiday contributions
    pub fn holidays_total(&self) -> &[f64] {
        &self.holidays_total
    }

    /// The last `n` rows (all of them if there are fewer)
    pub fn tail(&self, n: usize) -> &[ForecastRow] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }

    /// Write rows and components as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = vec![
            "date".to_string(),
            "yhat".to_string(),
            "yhat_lower".to_string(),
            "yhat_upper".to_string(),
            "trend".to_string(),
        ];
        header.extend(self.seasonal.iter().map(|c| c.name.clone()));
        header.extend(self.holidays.iter().map(|c| c.name.clone()));
        header.push("holidays".to_string());
        csv.write_record(&header)?;

        for (i, row) in self.rows.iter().enumerate() {
            let mut record = vec![
                row.date.to_string(),
                row.point_estimate.to_string(),
                row.lower_bound.to_string(),
                row.upper_bound.to_string(),
                self.trend[i].to_string(),
            ];
            record.extend(self.seasonal.iter().map(|c| c.values[i].to_string()));
            record.extend(self.holidays.iter().map(|c| c.values[i].to_string()));
            record.push(self.holidays_total[i].to_string());
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the forecast to a CSV file
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_csv(File::create(path)?)
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Predict at arbitrary dates, historical or future, in the given order
    fn predict(&self, dates: &[NaiveDate]) -> Result<Forecast>;

    /// Predict over the training history followed by `periods` future dates
    fn forecast(&self, periods: usize, frequency: Frequency) -> Result<Forecast>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a series and holiday table
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model
    fn train(&self, series: &Series, holidays: &HolidayTable) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Fit a decomposable model to `series`
pub fn fit(series: &Series, holidays: &HolidayTable, config: &ForecastConfig) -> Result<FittedModel> {
    DecomposableModel::new(config.clone())?.train(series, holidays)
}

/// Predict with a fitted model at the given dates
pub fn predict(model: &FittedModel, dates: &[NaiveDate]) -> Result<Forecast> {
    model.predict(dates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, v: f64) -> ForecastRow {
        ForecastRow {
            date: NaiveDate::from_ymd_opt(2017, 8, day).unwrap(),
            point_estimate: v,
            lower_bound: v - 1.0,
            upper_bound: v + 1.0,
        }
    }

    fn sample() -> Forecast {
        Forecast::new(
            vec![row(1, 10.0), row(2, 12.0), row(3, 11.0)],
            vec![9.0, 9.5, 10.0],
            vec![Component {
                name: "weekly".to_string(),
                values: vec![1.0, 2.5, 0.0],
            }],
            vec![Component {
                name: "Navidad".to_string(),
                values: vec![0.0, 0.0, 1.0],
            }],
            vec![0.0, 0.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_tail_and_lookup() {
        let forecast = sample();
        assert_eq!(forecast.tail(2).len(), 2);
        assert_eq!(forecast.tail(10).len(), 3);
        assert_eq!(forecast.tail(1)[0].point_estimate, 11.0);
        assert_eq!(forecast.seasonal("weekly"), Some(&[1.0, 2.5, 0.0][..]));
        assert!(forecast.seasonal("yearly").is_none());
        assert_eq!(forecast.holiday("Navidad").map(|v| v[2]), Some(1.0));
    }

    #[test]
    fn test_component_length_mismatch() {
        let result = Forecast::new(vec![row(1, 1.0)], vec![], vec![], vec![], vec![0.0]);
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_write_csv() {
        let mut out = Vec::new();
        sample().write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("date,yhat,yhat_lower,yhat_upper,trend,weekly,Navidad,holidays")
        );
        assert_eq!(lines.next(), Some("2017-08-01,10,9,11,9,1,0,0"));
        assert_eq!(text.lines().count(), 4);
    }
}
