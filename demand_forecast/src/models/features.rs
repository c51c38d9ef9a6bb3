//! Seasonal and holiday regressors

use crate::config::ForecastConfig;
use crate::error::Result;
use crate::holidays::HolidayTable;
use crate::utils::date_parser::days_since_epoch;
use chrono::NaiveDate;
use forecast_math::fourier;
use forecast_math::linalg::Matrix;
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub const YEARLY_PERIOD: f64 = 365.25;
pub const WEEKLY_PERIOD: f64 = 7.0;

/// A Fourier block for one periodic component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalBlock {
    pub name: String,
    /// Period in days
    pub period: f64,
    pub order: usize,
    /// Prior standard deviation after shrinking for short histories
    pub prior_scale: f64,
}

/// Indicator column for one holiday name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayRegressor {
    pub name: String,
    /// Inclusive date ranges during which the indicator is 1
    pub spans: Vec<(NaiveDate, NaiveDate)>,
}

impl HolidayRegressor {
    fn is_active(&self, day: NaiveDate) -> bool {
        self.spans.iter().any(|&(lo, hi)| day >= lo && day <= hi)
    }
}

/// Column layout of the regressor matrix: seasonal blocks, then one column per holiday
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorLayout {
    seasonal: Vec<SeasonalBlock>,
    holidays: Vec<HolidayRegressor>,
    holidays_prior_scale: f64,
}

/// Prior scale multiplier `min(1, span / 2P)^4`
pub fn coverage_shrinkage(span_days: f64, period: f64) -> f64 {
    (span_days / (2.0 * period)).min(1.0).powi(4)
}

impl RegressorLayout {
    /// Lay out the regressors for a history running from `first` to `last`
    ///
    /// Holidays none of whose windows overlap the history are left out: they
    /// would have no data to estimate their effect from.
    pub fn new(
        config: &ForecastConfig,
        first: NaiveDate,
        last: NaiveDate,
        holidays: &HolidayTable,
    ) -> Result<Self> {
        let span_days = (last - first).num_days() as f64;
        let mut seasonal = Vec::new();

        let mut push = |name: &str, period: f64, order: usize, scale: f64| -> Result<()> {
            fourier::validate(period, order)?;
            seasonal.push(SeasonalBlock {
                name: name.to_string(),
                period,
                order,
                prior_scale: scale * coverage_shrinkage(span_days, period),
            });
            Ok(())
        };

        if config.yearly_seasonality {
            push(
                "yearly",
                YEARLY_PERIOD,
                config.yearly_fourier_order,
                config.seasonality_prior_scale,
            )?;
        }
        if config.weekly_seasonality {
            push(
                "weekly",
                WEEKLY_PERIOD,
                config.weekly_fourier_order,
                config.seasonality_prior_scale,
            )?;
        }
        for extra in &config.seasonalities {
            push(
                &extra.name,
                extra.period,
                extra.order,
                extra.prior_scale.unwrap_or(config.seasonality_prior_scale),
            )?;
        }

        let mut regressors: Vec<HolidayRegressor> = Vec::new();
        for name in holidays.names() {
            let spans: Vec<(NaiveDate, NaiveDate)> = holidays
                .events()
                .iter()
                .filter(|e| e.name == name)
                .map(|e| e.span())
                .collect();
            if spans.iter().any(|&(lo, hi)| hi >= first && lo <= last) {
                regressors.push(HolidayRegressor { name, spans });
            }
        }

        Ok(Self {
            seasonal,
            holidays: regressors,
            holidays_prior_scale: config.holidays_prior_scale,
        })
    }

    /// Total number of columns
    pub fn width(&self) -> usize {
        self.seasonal_width() + self.holidays.len()
    }

    fn seasonal_width(&self) -> usize {
        self.seasonal
            .iter()
            .map(|b| fourier::basis_width(b.order))
            .sum()
    }

    pub fn seasonal_blocks(&self) -> &[SeasonalBlock] {
        &self.seasonal
    }

    pub fn holiday_regressors(&self) -> &[HolidayRegressor] {
        &self.holidays
    }

    /// Column range of every seasonal block, by name
    pub fn seasonal_ranges(&self) -> Vec<(&str, Range<usize>)> {
        let mut start = 0;
        self.seasonal
            .iter()
            .map(|b| {
                let end = start + fourier::basis_width(b.order);
                let range = start..end;
                start = end;
                (b.name.as_str(), range)
            })
            .collect()
    }

    /// Column of every holiday, by name
    pub fn holiday_columns(&self) -> Vec<(&str, usize)> {
        let offset = self.seasonal_width();
        self.holidays
            .iter()
            .enumerate()
            .map(|(i, h)| (h.name.as_str(), offset + i))
            .collect()
    }

    /// Append the regressor row for `date` to `out`
    pub fn extend_row(&self, date: NaiveDate, out: &mut Vec<f64>) {
        let day = days_since_epoch(date) as f64;
        for block in &self.seasonal {
            fourier::extend_row(day, block.period, block.order, out);
        }
        for holiday in &self.holidays {
            out.push(if holiday.is_active(date) { 1.0 } else { 0.0 });
        }
    }

    /// Regressor row for `date`
    pub fn row(&self, date: NaiveDate) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        self.extend_row(date, &mut row);
        row
    }

    /// Regressor matrix with one row per date
    pub fn matrix(&self, dates: &[NaiveDate]) -> Matrix {
        let mut m = Matrix::zeros(dates.len(), self.width());
        let mut row = Vec::with_capacity(self.width());
        for (i, &date) in dates.iter().enumerate() {
            row.clear();
            self.extend_row(date, &mut row);
            m.row_mut(i).copy_from_slice(&row);
        }
        m
    }

    /// Gaussian prior precision of every column
    pub fn prior_precision(&self) -> Vec<f64> {
        let mut precision = Vec::with_capacity(self.width());
        for block in &self.seasonal {
            let p = 1.0 / (block.prior_scale * block.prior_scale);
            precision.extend(std::iter::repeat(p).take(fourier::basis_width(block.order)));
        }
        let h = 1.0 / (self.holidays_prior_scale * self.holidays_prior_scale);
        precision.extend(std::iter::repeat(h).take(self.holidays.len()));
        precision
    }
}
