//! # forecast_sales
//!
//! Command-line forecasting of daily sales per store and product family.

use clap::{Parser, Subcommand};
use demand_forecast::metrics::evaluate_holdout;
use demand_forecast::models::TrainedForecastModel;
use demand_forecast::persistence;
use demand_forecast::{Forecast, ForecastConfig, Frequency, HolidayTable, HolidayTableBuilder};
use forecast_app::{
    distinct_values, run_batch, run_forecast, select_series, ForecastRequest, Result,
    SalesColumns, TableCache,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forecast_sales")]
#[command(about = "Forecast daily sales per store and product family", long_about = None)]
struct Cli {
    /// Sales table with store_nbr, family, date and sales columns
    #[arg(long, default_value = "train.csv", global = true)]
    sales: PathBuf,

    /// Holiday calendar with date, description and locale columns
    #[arg(long, global = true)]
    holidays: Option<PathBuf>,

    /// JSON model configuration (defaults apply to missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the stores and product families in the sales table
    Options {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fit one store/family series and forecast past its end
    Forecast {
        #[arg(short, long)]
        store: String,

        #[arg(short, long)]
        family: String,

        /// Number of days to forecast
        #[arg(long, default_value = "90")]
        horizon: usize,

        /// Number of final rows to print
        #[arg(long, default_value = "5")]
        tail: usize,

        /// Write the full forecast with components as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save the fitted model for later `predict` runs
        #[arg(long)]
        save_model: Option<PathBuf>,

        /// Also score a fit on all but the last N days against those days
        #[arg(long)]
        holdout: Option<usize>,
    },

    /// Forecast from a saved model without refitting
    Predict {
        #[arg(short, long)]
        model: PathBuf,

        #[arg(long, default_value = "90")]
        horizon: usize,

        #[arg(long, default_value = "5")]
        tail: usize,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Forecast every family of one store in parallel
    Batch {
        #[arg(short, long)]
        store: String,

        #[arg(long, default_value = "90")]
        horizon: usize,

        /// Directory receiving one CSV per family
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<ForecastConfig> {
    match path {
        Some(path) => Ok(ForecastConfig::from_file(path)?),
        None => Ok(ForecastConfig::default()),
    }
}

fn load_holidays(
    cache: &mut TableCache,
    path: Option<&Path>,
    config: &ForecastConfig,
) -> Result<HolidayTable> {
    match path {
        Some(path) => {
            let frame = cache.get_or_load(path)?;
            Ok(HolidayTableBuilder::default()
                .with_config(config)
                .build(&frame)?)
        }
        None => Ok(HolidayTable::empty()),
    }
}

fn print_tail(forecast: &Forecast, tail: usize) {
    println!("{:<12} {:>12} {:>12} {:>12}", "date", "yhat", "yhat_lower", "yhat_upper");
    for row in forecast.tail(tail) {
        println!(
            "{:<12} {:>12.2} {:>12.2} {:>12.2}",
            row.date, row.point_estimate, row.lower_bound, row.upper_bound
        );
    }
}

fn file_stem(family: &str) -> String {
    family
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn run(cli: Cli) -> Result<()> {
    let mut cache = TableCache::new();
    let columns = SalesColumns::default();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Options { json } => {
            let sales = cache.get_or_load(&cli.sales)?;
            let stores = distinct_values(&sales, &columns.store)?;
            let families = distinct_values(&sales, &columns.family)?;
            if json {
                let listing = serde_json::json!({ "stores": stores, "families": families });
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!("Stores: {}", stores.join(", "));
                println!("Families: {}", families.join(", "));
            }
        }
        Commands::Forecast {
            store,
            family,
            horizon,
            tail,
            output,
            save_model,
            holdout,
        } => {
            let sales = cache.get_or_load(&cli.sales)?;
            let holidays = load_holidays(&mut cache, cli.holidays.as_deref(), &config)?;
            let request = ForecastRequest::new(store.as_str(), family.as_str()).with_horizon(horizon);
            let outcome = run_forecast(&sales, &columns, &holidays, &config, &request)?;

            print_tail(&outcome.forecast, tail);
            if let Some(path) = output {
                outcome.forecast.to_csv_file(&path)?;
                info!(path = %path.display(), "wrote forecast");
            }
            if let Some(path) = save_model {
                persistence::save(&outcome.model, &path)?;
            }
            if let Some(test_size) = holdout {
                let series = select_series(&sales, &columns, &store, &family)?;
                let evaluation = evaluate_holdout(&series, &holidays, &config, test_size)?;
                println!(
                    "Holdout ({} days): {}, coverage {:.1}%",
                    evaluation.test_size,
                    evaluation.accuracy,
                    evaluation.coverage * 100.0
                );
            }
        }
        Commands::Predict {
            model,
            horizon,
            tail,
            output,
        } => {
            let model = persistence::load(&model)?;
            let forecast = model.forecast(horizon, Frequency::Daily)?;
            print_tail(&forecast, tail);
            if let Some(path) = output {
                forecast.to_csv_file(&path)?;
            }
        }
        Commands::Batch {
            store,
            horizon,
            output_dir,
        } => {
            let sales = cache.get_or_load(&cli.sales)?;
            let holidays = load_holidays(&mut cache, cli.holidays.as_deref(), &config)?;
            if let Some(dir) = &output_dir {
                fs::create_dir_all(dir)?;
            }

            let results = run_batch(&sales, &columns, &holidays, &config, &store, horizon)?;
            let mut failures = 0usize;
            for (family, result) in results {
                match result {
                    Ok(outcome) => {
                        let last = outcome.forecast.tail(1);
                        if let Some(row) = last.first() {
                            println!(
                                "{:<32} {} {:>12.2} [{:.2}, {:.2}]",
                                family, row.date, row.point_estimate, row.lower_bound, row.upper_bound
                            );
                        }
                        if let Some(dir) = &output_dir {
                            let path = dir.join(format!("{}_{}.csv", store, file_stem(&family)));
                            outcome.forecast.to_csv_file(path)?;
                        }
                    }
                    Err(err) => {
                        failures += 1;
                        println!("{:<32} skipped: {}", family, err.user_message());
                    }
                }
            }
            info!(store = %store, failures, "batch finished");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
    }
}
