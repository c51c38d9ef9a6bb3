//! # Demand Forecast Workspace
//!
//! Umbrella crate re-exporting the workspace members:
//!
//! - [`forecast_math`]: dense linear algebra, Fourier bases and L-BFGS
//! - [`demand_forecast`]: series preparation, holidays and the decomposable model
//! - [`forecast_app`]: table cache, store/family selection and batch runs
//!
//! ```
//! use demand_forecast_workspace::demand_forecast::{Frequency, Series};
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
//! let series = Series::from_parts(&[start, start.succ_opt().unwrap()], &[1.0, 2.0]).unwrap();
//! let dates = demand_forecast_workspace::demand_forecast::extend_horizon(&series, 3, Frequency::Daily).unwrap();
//! assert_eq!(dates.len(), 5);
//! ```

pub use demand_forecast;
pub use forecast_app;
pub use forecast_math;
