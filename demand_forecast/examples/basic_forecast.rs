use chrono::{Datelike, Duration, NaiveDate, Weekday};
use demand_forecast::metrics::{evaluate_holdout, in_sample_accuracy};
use demand_forecast::models::TrainedForecastModel;
use demand_forecast::{fit, ForecastConfig, Frequency, HolidayTableBuilder, Series};
use polars::df;
use polars::prelude::NamedFrom;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Demand Forecast: Basic Forecasting Example");
    println!("==========================================\n");

    // Two years of daily sales with a trend, a weekend dip and a Christmas spike
    let series = create_sample_sales()?;
    println!(
        "Sample data created: {} daily points from {} to {}\n",
        series.len(),
        series.first_date().ok_or("empty series")?,
        series.last_date().ok_or("empty series")?
    );

    // Christmas moves sales on the day before and after as well
    let config = ForecastConfig::default().with_holiday_window(1, 1);
    let calendar = df!(
        "date" => &["2015-12-25", "2016-12-25", "2016-08-10"],
        "description" => &["Navidad", "Navidad", "Fundacion de Guayaquil"],
        "locale" => &["National", "National", "Local"]
    )?;
    let holidays = HolidayTableBuilder::default()
        .with_config(&config)
        .build(&calendar)?;
    println!("Holiday events in scope: {}\n", holidays.len());

    let model = fit(&series, &holidays, &config)?;
    println!("Model fitted: {:?}\n", model.diagnostics());

    let forecast = model.forecast(30, Frequency::Daily)?;
    println!("Last 5 forecast rows:");
    for row in forecast.tail(5) {
        println!(
            "  {} {:>8.1} [{:>8.1}, {:>8.1}]",
            row.date, row.point_estimate, row.lower_bound, row.upper_bound
        );
    }

    println!("\nChangepoints: {}", model.changepoints().len());
    println!("In-sample accuracy: {}", in_sample_accuracy(&model)?);
    let holdout = evaluate_holdout(&series, &holidays, &config, 28)?;
    println!(
        "Holdout accuracy (28 days): {}, coverage {:.0}%",
        holdout.accuracy,
        holdout.coverage * 100.0
    );

    Ok(())
}

fn create_sample_sales() -> Result<Series, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).ok_or("bad date")?;
    let dates: Vec<NaiveDate> = (0..730).map(|i| start + Duration::days(i)).collect();
    let values: Vec<f64> = dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let trend = 500.0 + 0.3 * i as f64;
            let weekly = match date.weekday() {
                Weekday::Sat | Weekday::Sun => -60.0,
                _ => 20.0,
            };
            let holiday = if date.month() == 12 && (24..=26).contains(&date.day()) {
                200.0
            } else {
                0.0
            };
            trend + weekly + holiday + ((i * 37) % 11) as f64 - 5.0
        })
        .collect();
    Ok(Series::from_parts(&dates, &values)?)
}
