//! Future timestamp generation

use crate::data::Series;
use crate::error::{ForecastError, Result};
use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar step between consecutive forecast dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    /// A fixed number of days
    EveryDays(u32),
    /// Calendar months; days past the end of a shorter month clamp to its last day
    Monthly,
}

impl Frequency {
    /// The date `steps` steps after `start`
    pub fn advance(self, start: NaiveDate, steps: u32) -> Result<NaiveDate> {
        let next = match self {
            Frequency::Daily => start.checked_add_signed(Duration::days(i64::from(steps))),
            Frequency::Weekly => start.checked_add_signed(Duration::weeks(i64::from(steps))),
            Frequency::EveryDays(0) => {
                return Err(ForecastError::InvalidArgument(
                    "Step length must be at least one day".to_string(),
                ))
            }
            Frequency::EveryDays(n) => {
                start.checked_add_signed(Duration::days(i64::from(n) * i64::from(steps)))
            }
            Frequency::Monthly => start.checked_add_months(Months::new(steps)),
        };
        next.ok_or_else(|| {
            ForecastError::InvalidArgument(format!(
                "Date {} advanced {} steps leaves the supported calendar",
                start, steps
            ))
        })
    }
}

/// `periods` dates following `last`
pub fn future_dates(last: NaiveDate, periods: usize, frequency: Frequency) -> Result<Vec<NaiveDate>> {
    if periods == 0 {
        return Err(ForecastError::InvalidArgument(
            "Horizon must cover at least one period".to_string(),
        ));
    }
    let periods = u32::try_from(periods).map_err(|_| {
        ForecastError::InvalidArgument(format!("Horizon of {} periods is too long", periods))
    })?;
    // Monthly steps are taken from `last` each time so day-of-month clamping does not drift.
    (1..=periods)
        .map(|step| frequency.advance(last, step))
        .collect()
}

/// Historical dates followed by `periods` future dates
pub fn extend_horizon(series: &Series, periods: usize, frequency: Frequency) -> Result<Vec<NaiveDate>> {
    let last = series.last_date().ok_or_else(|| {
        ForecastError::InsufficientData("Cannot extend an empty series".to_string())
    })?;
    let mut dates = series.dates();
    dates.extend(future_dates(last, periods, frequency)?);
    Ok(dates)
}
