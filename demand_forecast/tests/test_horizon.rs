use chrono::{Duration, NaiveDate};
use demand_forecast::horizon::future_dates;
use demand_forecast::{extend_horizon, ForecastError, Frequency, Series};
use pretty_assertions::assert_eq;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_extend_horizon_daily() {
    let start = day(2017, 7, 1);
    let dates: Vec<NaiveDate> = (0..46).map(|i| start + Duration::days(i)).collect();
    let series = Series::from_parts(&dates, &vec![1.0; dates.len()]).unwrap();

    let horizon = extend_horizon(&series, 30, Frequency::Daily).unwrap();
    assert_eq!(horizon.len(), 76);
    assert_eq!(&horizon[..46], dates.as_slice());
    assert_eq!(horizon[46], day(2017, 8, 16));
    assert_eq!(horizon[75], day(2017, 9, 14));
}

#[test]
fn test_future_dates_frequencies() {
    let last = day(2017, 1, 31);
    assert_eq!(
        future_dates(last, 2, Frequency::Weekly).unwrap(),
        vec![day(2017, 2, 7), day(2017, 2, 14)]
    );
    assert_eq!(
        future_dates(last, 3, Frequency::Monthly).unwrap(),
        vec![day(2017, 2, 28), day(2017, 3, 31), day(2017, 4, 30)]
    );
    assert_eq!(
        future_dates(last, 1, Frequency::EveryDays(3)).unwrap(),
        vec![day(2017, 2, 3)]
    );
}

#[test]
fn test_zero_periods_rejected() {
    let series = Series::from_parts(&[day(2017, 1, 1), day(2017, 1, 2)], &[1.0, 2.0]).unwrap();
    assert!(matches!(
        extend_horizon(&series, 0, Frequency::Daily),
        Err(ForecastError::InvalidArgument(_))
    ));
}
