//! # Demand Forecast
//!
//! A Rust library for forecasting daily sales per store and product family.
//!
//! ## Features
//!
//! - Series preparation from raw sales tables (polars `DataFrame`s)
//! - Holiday calendars as regressors with configurable effect windows
//! - An additive decomposable model: piecewise-linear, flat or logistic
//!   trend with changepoints, Fourier seasonality and holiday effects, fitted
//!   jointly by MAP estimation
//! - Prediction intervals from a Laplace approximation, analytic or simulated
//! - Horizon generation, holdout metrics and versioned model persistence
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demand_forecast::data::{DataLoader, SeriesPreparer};
//! use demand_forecast::holidays::HolidayTableBuilder;
//! use demand_forecast::horizon::Frequency;
//! use demand_forecast::models::{fit, TrainedForecastModel};
//! use demand_forecast::ForecastConfig;
//!
//! # fn main() -> demand_forecast::Result<()> {
//! let sales = DataLoader::from_csv("train.csv")?;
//! let series = SeriesPreparer::new("date", "sales").prepare(&sales)?;
//!
//! let config = ForecastConfig::default().with_holiday_window(0, 1);
//! let holidays = DataLoader::from_csv("holidays_events.csv")?;
//! let holidays = HolidayTableBuilder::default()
//!     .with_config(&config)
//!     .build(&holidays)?;
//!
//! let model = fit(&series, &holidays, &config)?;
//! let forecast = model.forecast(90, Frequency::Daily)?;
//! for row in forecast.tail(5) {
//!     println!("{} {:.1} [{:.1}, {:.1}]", row.date, row.point_estimate, row.lower_bound, row.upper_bound);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod holidays;
pub mod horizon;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{ForecastConfig, Growth, SeasonalitySpec, UncertaintyMethod};
pub use crate::data::{DataLoader, Observation, Series, SeriesPreparer};
pub use crate::error::{ForecastError, Result};
pub use crate::holidays::{HolidayEvent, HolidayTable, HolidayTableBuilder};
pub use crate::horizon::{extend_horizon, Frequency};
pub use crate::models::{
    fit, predict, DecomposableModel, FittedModel, Forecast, ForecastModel, ForecastRow,
    TrainedForecastModel,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
