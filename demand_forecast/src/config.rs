//! Model configuration
//!
//! Every field has a serde default, so a JSON file only needs to name the
//! settings it changes.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Trend family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Growth {
    /// Piecewise-linear trend with changepoints
    Linear,
    /// Constant level
    Flat,
    /// Saturating trend between `floor` and `cap`
    Logistic {
        cap: f64,
        #[serde(default)]
        floor: f64,
    },
}

impl Default for Growth {
    fn default() -> Self {
        Growth::Linear
    }
}

/// An extra periodic component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalitySpec {
    pub name: String,
    /// Period in days
    pub period: f64,
    /// Number of Fourier pairs
    pub order: usize,
    /// Overrides `seasonality_prior_scale` for this component
    #[serde(default)]
    pub prior_scale: Option<f64>,
}

impl SeasonalitySpec {
    pub fn new(name: impl Into<String>, period: f64, order: usize) -> Self {
        Self {
            name: name.into(),
            period,
            order,
            prior_scale: None,
        }
    }
}

/// How prediction intervals are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UncertaintyMethod {
    /// Closed-form normal intervals from the Laplace approximation
    Analytic,
    /// Empirical quantiles of seeded posterior draws
    Simulated {
        #[serde(default = "default_samples")]
        samples: usize,
        #[serde(default)]
        seed: u64,
    },
}

impl Default for UncertaintyMethod {
    fn default() -> Self {
        UncertaintyMethod::Analytic
    }
}

/// Optimizer budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Wall-clock budget in seconds
    #[serde(default)]
    pub max_seconds: Option<f64>,
    #[serde(default = "default_memory")]
    pub memory: usize,
    /// Relative objective decrease treated as converged
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_seconds: None,
            memory: default_memory(),
            tolerance: default_tolerance(),
        }
    }
}

/// Configuration of the decomposable forecast model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub growth: Growth,

    #[serde(default = "default_true")]
    pub yearly_seasonality: bool,
    #[serde(default = "default_true")]
    pub weekly_seasonality: bool,
    #[serde(default = "default_yearly_order")]
    pub yearly_fourier_order: usize,
    #[serde(default = "default_weekly_order")]
    pub weekly_fourier_order: usize,
    #[serde(default)]
    pub seasonalities: Vec<SeasonalitySpec>,

    /// Days before and after each holiday the effect covers
    #[serde(default)]
    pub holiday_window: (u32, u32),

    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,

    #[serde(default = "default_changepoint_count")]
    pub changepoint_count: usize,
    #[serde(default = "default_changepoint_range")]
    pub changepoint_range: f64,
    /// Explicit changepoint dates; replaces automatic placement when non-empty
    #[serde(default)]
    pub changepoints: Vec<NaiveDate>,

    #[serde(default = "default_changepoint_prior_scale")]
    pub changepoint_prior_scale: f64,
    #[serde(default = "default_prior_scale")]
    pub seasonality_prior_scale: f64,
    #[serde(default = "default_prior_scale")]
    pub holidays_prior_scale: f64,

    #[serde(default)]
    pub uncertainty: UncertaintyMethod,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            growth: Growth::default(),
            yearly_seasonality: true,
            weekly_seasonality: true,
            yearly_fourier_order: default_yearly_order(),
            weekly_fourier_order: default_weekly_order(),
            seasonalities: Vec::new(),
            holiday_window: (0, 0),
            confidence_level: default_confidence_level(),
            changepoint_count: default_changepoint_count(),
            changepoint_range: default_changepoint_range(),
            changepoints: Vec::new(),
            changepoint_prior_scale: default_changepoint_prior_scale(),
            seasonality_prior_scale: default_prior_scale(),
            holidays_prior_scale: default_prior_scale(),
            uncertainty: UncertaintyMethod::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl ForecastConfig {
    /// Parse a configuration from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_growth(mut self, growth: Growth) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_yearly_seasonality(mut self, enabled: bool) -> Self {
        self.yearly_seasonality = enabled;
        self
    }

    pub fn with_weekly_seasonality(mut self, enabled: bool) -> Self {
        self.weekly_seasonality = enabled;
        self
    }

    pub fn with_seasonality(mut self, seasonality: SeasonalitySpec) -> Self {
        self.seasonalities.push(seasonality);
        self
    }

    pub fn with_holiday_window(mut self, lower: u32, upper: u32) -> Self {
        self.holiday_window = (lower, upper);
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_changepoint_count(mut self, count: usize) -> Self {
        self.changepoint_count = count;
        self
    }

    pub fn with_changepoint_range(mut self, range: f64) -> Self {
        self.changepoint_range = range;
        self
    }

    pub fn with_changepoints(mut self, dates: Vec<NaiveDate>) -> Self {
        self.changepoints = dates;
        self
    }

    pub fn with_uncertainty(mut self, method: UncertaintyMethod) -> Self {
        self.uncertainty = method;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Check every setting, returning `InvalidArgument` for the first bad one
    pub fn validate(&self) -> Result<()> {
        if let Growth::Logistic { cap, floor } = self.growth {
            if !cap.is_finite() || !floor.is_finite() || cap <= floor {
                return Err(invalid(format!(
                    "Logistic growth needs finite cap > floor, got cap {} and floor {}",
                    cap, floor
                )));
            }
        }
        if self.yearly_seasonality && self.yearly_fourier_order == 0 {
            return Err(invalid("Yearly Fourier order must be at least 1"));
        }
        if self.weekly_seasonality && self.weekly_fourier_order == 0 {
            return Err(invalid("Weekly Fourier order must be at least 1"));
        }
        for (i, s) in self.seasonalities.iter().enumerate() {
            if s.name.is_empty() || s.name == "yearly" || s.name == "weekly" {
                return Err(invalid(format!(
                    "Seasonality name '{}' is empty or reserved",
                    s.name
                )));
            }
            if self.seasonalities[..i].iter().any(|o| o.name == s.name) {
                return Err(invalid(format!("Seasonality '{}' declared twice", s.name)));
            }
            if !(s.period.is_finite() && s.period > 0.0) || s.order == 0 {
                return Err(invalid(format!(
                    "Seasonality '{}' needs a positive period and order",
                    s.name
                )));
            }
            if let Some(scale) = s.prior_scale {
                check_positive("seasonality prior scale", scale)?;
            }
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(invalid(format!(
                "Confidence level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(invalid(format!(
                "Changepoint range must lie in (0, 1], got {}",
                self.changepoint_range
            )));
        }
        check_positive("changepoint prior scale", self.changepoint_prior_scale)?;
        check_positive("seasonality prior scale", self.seasonality_prior_scale)?;
        check_positive("holidays prior scale", self.holidays_prior_scale)?;

        if let UncertaintyMethod::Simulated { samples, .. } = self.uncertainty {
            if samples < 2 {
                return Err(invalid("Simulated intervals need at least 2 samples"));
            }
        }
        if self.optimizer.max_iterations == 0 {
            return Err(invalid("Optimizer iteration budget must be at least 1"));
        }
        if self.optimizer.memory == 0 {
            return Err(invalid("Optimizer memory must be at least 1"));
        }
        if !(self.optimizer.tolerance.is_finite() && self.optimizer.tolerance >= 0.0) {
            return Err(invalid("Optimizer tolerance must be non-negative"));
        }
        if let Some(seconds) = self.optimizer.max_seconds {
            check_positive("optimizer time budget", seconds)?;
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ForecastError {
    ForecastError::InvalidArgument(msg.into())
}

fn check_positive(what: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("The {} must be positive, got {}", what, value)))
    }
}

fn default_true() -> bool {
    true
}
fn default_yearly_order() -> usize {
    10
}
fn default_weekly_order() -> usize {
    3
}
fn default_confidence_level() -> f64 {
    0.8
}
fn default_changepoint_count() -> usize {
    25
}
fn default_changepoint_range() -> f64 {
    0.8
}
fn default_changepoint_prior_scale() -> f64 {
    0.05
}
fn default_prior_scale() -> f64 {
    10.0
}
fn default_samples() -> usize {
    1000
}
fn default_max_iterations() -> usize {
    10_000
}
fn default_memory() -> usize {
    10
}
fn default_tolerance() -> f64 {
    1e-12
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = ForecastConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ForecastConfig::default());
        assert_eq!(config.changepoint_count, 25);
        assert_eq!(config.confidence_level, 0.8);
    }

    #[test]
    fn test_partial_json() {
        let config = ForecastConfig::from_json_str(
            r#"{
                "growth": {"type": "logistic", "cap": 500.0},
                "holiday_window": [0, 1],
                "uncertainty": {"type": "simulated", "seed": 7},
                "optimizer": {"max_seconds": 2.5}
            }"#,
        )
        .unwrap();
        assert_eq!(config.growth, Growth::Logistic { cap: 500.0, floor: 0.0 });
        assert_eq!(config.holiday_window, (0, 1));
        assert_eq!(
            config.uncertainty,
            UncertaintyMethod::Simulated { samples: 1000, seed: 7 }
        );
        assert_eq!(config.optimizer.max_seconds, Some(2.5));
        assert_eq!(config.optimizer.max_iterations, 10_000);
    }

    #[rstest]
    #[case(ForecastConfig::default().with_confidence_level(1.0))]
    #[case(ForecastConfig::default().with_confidence_level(0.0))]
    #[case(ForecastConfig::default().with_changepoint_range(0.0))]
    #[case(ForecastConfig::default().with_changepoint_range(1.5))]
    #[case(ForecastConfig::default().with_growth(Growth::Logistic { cap: 1.0, floor: 2.0 }))]
    #[case(ForecastConfig::default().with_seasonality(SeasonalitySpec::new("weekly", 7.0, 3)))]
    #[case(ForecastConfig::default().with_seasonality(SeasonalitySpec::new("monthly", 0.0, 3)))]
    #[case(ForecastConfig::default().with_uncertainty(UncertaintyMethod::Simulated { samples: 1, seed: 0 }))]
    fn test_invalid_configs(#[case] config: ForecastConfig) {
        assert!(matches!(
            config.validate(),
            Err(ForecastError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_duplicate_seasonality_names() {
        let config = ForecastConfig::default()
            .with_seasonality(SeasonalitySpec::new("monthly", 30.5, 5))
            .with_seasonality(SeasonalitySpec::new("monthly", 30.5, 3));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        let result = ForecastConfig::from_json_str("{\"growth\": 3}");
        assert!(matches!(result, Err(ForecastError::SerializationError(_))));
    }
}
