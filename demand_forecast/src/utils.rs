//! Utility functions for the demand_forecast crate

use crate::data::{Observation, Series};
use crate::error::{ForecastError, Result};

/// Date parsing helpers shared by the series and holiday loaders
pub mod date_parser {
    use crate::error::{ForecastError, Result};
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%Y%m%d"];
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];

    /// Parse a calendar date; timestamps are truncated to their date
    pub fn parse_date(raw: &str) -> Result<NaiveDate> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(ForecastError::ParseError("empty date".to_string()));
        }
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return Ok(d);
            }
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(dt.date());
            }
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.date_naive());
        }
        Err(ForecastError::ParseError(format!(
            "unrecognised date '{}'",
            s
        )))
    }

    /// Days since 1970-01-01 (negative before the epoch)
    pub fn days_since_epoch(date: NaiveDate) -> i64 {
        date.signed_duration_since(NaiveDate::default()).num_days()
    }
}

/// Split a series into training and test parts, keeping at least two training points
pub fn train_test_split(series: &Series, test_size: usize) -> Result<(Series, Vec<Observation>)> {
    if test_size == 0 {
        return Err(ForecastError::InvalidArgument(
            "Test size must be at least 1".to_string(),
        ));
    }
    if series.len() < test_size + 2 {
        return Err(ForecastError::InsufficientData(format!(
            "Need at least {} observations to hold out {}, got {}",
            test_size + 2,
            test_size,
            series.len()
        )));
    }

    let split = series.len() - test_size;
    let observations = series.observations();
    let train = Series::from_observations(observations[..split].to_vec())?;
    let test = observations[split..].to_vec();

    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::date_parser::{days_since_epoch, parse_date};
    use chrono::NaiveDate;
    use rstest::rstest;

    #[rstest]
    #[case("2017-08-15")]
    #[case(" 2017-08-15 ")]
    #[case("2017/08/15")]
    #[case("15.08.2017")]
    #[case("20170815")]
    #[case("2017-08-15 00:00:00")]
    #[case("2017-08-15T13:45:10.250")]
    #[case("2017-08-15T13:45:10+02:00")]
    fn test_parse_date_formats(#[case] raw: &str) {
        assert_eq!(
            parse_date(raw).unwrap(),
            NaiveDate::from_ymd_opt(2017, 8, 15).unwrap()
        );
    }

    #[rstest]
    #[case("")]
    #[case("not a date")]
    #[case("2017-13-01")]
    #[case("2017-02-30")]
    fn test_parse_date_rejects(#[case] raw: &str) {
        assert!(parse_date(raw).is_err());
    }

    #[test]
    fn test_days_since_epoch() {
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 11).unwrap()), 10);
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
    }
}
