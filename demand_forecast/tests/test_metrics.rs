use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use demand_forecast::metrics::{evaluate_holdout, forecast_accuracy, in_sample_accuracy};
use demand_forecast::{fit, ForecastConfig, ForecastError, HolidayTable, Series};

fn weekly_series(n: usize) -> Series {
    noisy_weekly_series(n, 0.0)
}

fn noisy_weekly_series(n: usize, noise: f64) -> Series {
    let start = NaiveDate::from_ymd_opt(2016, 1, 4).unwrap();
    let dates: Vec<NaiveDate> = (0..n as i64).map(|i| start + Duration::days(i)).collect();
    let values: Vec<f64> = (0..n)
        .map(|i| {
            let wiggle = ((i * 7919) % 13) as f64 / 6.0 - 1.0;
            50.0 + 0.1 * i as f64 + if i % 7 >= 5 { -8.0 } else { 4.0 } + noise * wiggle
        })
        .collect();
    Series::from_parts(&dates, &values).unwrap()
}

#[test]
fn test_perfect_forecast() {
    let values = [3.0, 4.0, 5.0];
    let acc = forecast_accuracy(&values, &values).unwrap();
    assert_relative_eq!(acc.mae, 0.0);
    assert_relative_eq!(acc.rmse, 0.0);
    assert_relative_eq!(acc.mape, 0.0);
    assert_relative_eq!(acc.smape, 0.0);
}

#[test]
fn test_holdout_evaluation() {
    let series = noisy_weekly_series(210, 2.0);
    let config = ForecastConfig::default().with_yearly_seasonality(false);
    let evaluation = evaluate_holdout(&series, &HolidayTable::empty(), &config, 14).unwrap();

    assert_eq!(evaluation.train_size, 196);
    assert_eq!(evaluation.test_size, 14);
    assert!(evaluation.accuracy.mae < 4.0, "mae {}", evaluation.accuracy.mae);
    assert!((0.0..=1.0).contains(&evaluation.coverage));
}

#[test]
fn test_holdout_needs_enough_history() {
    let series = weekly_series(10);
    let result = evaluate_holdout(&series, &HolidayTable::empty(), &ForecastConfig::default(), 9);
    assert!(matches!(result, Err(ForecastError::InsufficientData(_))));
}

#[test]
fn test_in_sample_accuracy() {
    let series = weekly_series(140);
    let config = ForecastConfig::default().with_yearly_seasonality(false);
    let model = fit(&series, &HolidayTable::empty(), &config).unwrap();
    let acc = in_sample_accuracy(&model).unwrap();
    assert!(acc.rmse < 1.0, "rmse {}", acc.rmse);
    assert!(acc.mse <= acc.rmse * acc.rmse + 1e-9);
}
