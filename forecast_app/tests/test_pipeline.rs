use chrono::{Duration, NaiveDate};
use demand_forecast::{ForecastConfig, HolidayTable};
use forecast_app::{run_batch, run_forecast, AppError, ForecastRequest, SalesColumns, TableCache};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn sales_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "id,date,store_nbr,family,sales,onpromotion").unwrap();
    let start = NaiveDate::from_ymd_opt(2016, 3, 1).unwrap();
    let mut id = 0;
    for day in 0..120 {
        let date = start + Duration::days(day);
        for (family, base) in [("BEVERAGES", 900.0), ("BREAD/BAKERY", 120.0)] {
            let sales = base + 0.4 * day as f64 + if day % 7 == 6 { -30.0 } else { 5.0 };
            writeln!(file, "{},{},1,{},{:.1},0", id, date, family, sales).unwrap();
            id += 1;
        }
    }
    // a second store with a single day of BEVERAGES only
    writeln!(file, "{},{},2,BEVERAGES,10.0,0", id, start).unwrap();
    file
}

#[test]
fn test_run_forecast_for_store_family() {
    let file = sales_csv();
    let mut cache = TableCache::new();
    let sales = cache.get_or_load(file.path()).unwrap();

    let request = ForecastRequest::new("1", "BEVERAGES").with_horizon(14);
    let outcome = run_forecast(
        &sales,
        &SalesColumns::default(),
        &HolidayTable::empty(),
        &ForecastConfig::default(),
        &request,
    )
    .unwrap();

    assert_eq!(outcome.forecast.len(), 134);
    assert_eq!(
        outcome.forecast.tail(1)[0].date,
        NaiveDate::from_ymd_opt(2016, 7, 12).unwrap()
    );
    assert!(outcome.forecast.tail(1)[0].point_estimate > 900.0);
}

#[test]
fn test_unknown_series() {
    let file = sales_csv();
    let mut cache = TableCache::new();
    let sales = cache.get_or_load(file.path()).unwrap();

    let request = ForecastRequest::new("7", "BEVERAGES");
    let result = run_forecast(
        &sales,
        &SalesColumns::default(),
        &HolidayTable::empty(),
        &ForecastConfig::default(),
        &request,
    );
    assert!(matches!(result, Err(AppError::NoSuchSeries { .. })));
}

#[test]
fn test_batch_reports_each_family() {
    let file = sales_csv();
    let mut cache = TableCache::new();
    let sales = cache.get_or_load(file.path()).unwrap();

    let results = run_batch(
        &sales,
        &SalesColumns::default(),
        &HolidayTable::empty(),
        &ForecastConfig::default(),
        "2",
        7,
    )
    .unwrap();

    let families: Vec<&str> = results.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(families, vec!["BEVERAGES", "BREAD/BAKERY"]);
    // one observation is not enough; the other family has none at this store
    assert!(matches!(
        results[0].1,
        Err(AppError::Forecast(demand_forecast::ForecastError::InsufficientData(_)))
    ));
    assert!(matches!(results[1].1, Err(AppError::NoSuchSeries { .. })));
}

#[test]
fn test_cache_reloads_changed_file() {
    let file = sales_csv();
    let mut cache = TableCache::new();
    let before = cache.get_or_load(file.path()).unwrap();
    let again = cache.get_or_load(file.path()).unwrap();
    assert!(Arc::ptr_eq(&before, &again));

    let mut contents = fs::read_to_string(file.path()).unwrap();
    contents.push_str("9999,2016-03-02,2,BEVERAGES,11.0,0\n");
    fs::write(file.path(), contents).unwrap();

    let after = cache.get_or_load(file.path()).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.height(), before.height() + 1);
    assert_eq!(cache.len(), 1);
}
