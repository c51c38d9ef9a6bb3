//! Additive decomposable model: `y(t) = trend(t) + seasonality(t) + holidays(t) + ε(t)`
//!
//! Fitting finds the MAP estimate of all components jointly: a ridge solve
//! gives the starting point and L-BFGS then minimises the full objective
//! with its Laplace prior on trend rate changes. Intervals come from a
//! Laplace approximation of the trend parameters at the optimum, see
//! [`uncertainty`](super::uncertainty).

use crate::config::{ForecastConfig, Growth, UncertaintyMethod};
use crate::data::Series;
use crate::error::{ForecastError, Result};
use crate::holidays::HolidayTable;
use crate::horizon::{extend_horizon, Frequency};
use crate::models::features::RegressorLayout;
use crate::models::objective::{Design, MapObjective};
use crate::models::trend::{place_changepoints, TrendKind, TrendSpec};
use crate::models::uncertainty::{normal_quantile, quantile, Posterior};
use crate::models::{Component, Forecast, ForecastModel, ForecastRow, TrainedForecastModel};
use chrono::{Duration, NaiveDate};
use forecast_math::linalg::{ridge_solve, Cholesky, Matrix};
use forecast_math::optimize::{Lbfgs, Minimizer, Termination};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Lower bound on the noise scale used for weighting, in scaled units
const MIN_SIGMA: f64 = 1e-3;

/// Maps dates and values to the unit-scaled problem and back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    start: NaiveDate,
    span_days: f64,
    floor: f64,
    y_scale: f64,
}

impl Scaling {
    fn new(start: NaiveDate, end: NaiveDate, floor: f64, values: &[f64]) -> Self {
        let span_days = ((end - start).num_days() as f64).max(1.0);
        let y_scale = values
            .iter()
            .map(|v| (v - floor).abs())
            .fold(0.0, f64::max);
        Self {
            start,
            span_days,
            floor,
            y_scale: if y_scale > 0.0 { y_scale } else { 1.0 },
        }
    }

    /// Scaled time; the history covers `[0, 1]`
    pub fn time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days
    }

    /// Date at scaled time `t`, rounded to the nearest day
    pub fn date(&self, t: f64) -> NaiveDate {
        self.start + Duration::days((t * self.span_days).round() as i64)
    }

    pub fn scale(&self, value: f64) -> f64 {
        (value - self.floor) / self.y_scale
    }

    pub fn unscale(&self, value: f64) -> f64 {
        value * self.y_scale + self.floor
    }

    pub fn y_scale(&self) -> f64 {
        self.y_scale
    }
}

/// How the optimizer finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub iterations: usize,
    pub termination: Termination,
    /// Negative log posterior at the optimum
    pub objective: f64,
}

/// Untrained decomposable model holding its configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposableModel {
    config: ForecastConfig,
}

impl Default for DecomposableModel {
    fn default() -> Self {
        Self {
            config: ForecastConfig::default(),
        }
    }
}

impl DecomposableModel {
    /// Create a model, validating the configuration
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    fn trend_spec(&self, scaling: &Scaling, times: &[f64], first: NaiveDate, last: NaiveDate) -> Result<TrendSpec> {
        let config = &self.config;
        let kind = match config.growth {
            Growth::Linear => TrendKind::Linear,
            Growth::Flat => TrendKind::Flat,
            Growth::Logistic { cap, floor } => TrendKind::Logistic {
                cap: (cap - floor) / scaling.y_scale,
            },
        };

        let changepoints = if config.changepoints.is_empty() {
            place_changepoints(times, config.changepoint_count, config.changepoint_range)
        } else {
            config
                .changepoints
                .iter()
                .map(|&date| {
                    if date <= first || date >= last {
                        return Err(ForecastError::InvalidArgument(format!(
                            "Changepoint {} lies outside the history {} to {}",
                            date, first, last
                        )));
                    }
                    Ok(scaling.time(date))
                })
                .collect::<Result<Vec<_>>>()?
        };

        TrendSpec::new(kind, changepoints)
    }

    /// Fit to a series and holiday table
    pub fn fit(&self, series: &Series, holidays: &HolidayTable) -> Result<FittedModel> {
        let config = &self.config;
        let (first, last) = match (series.first_date(), series.last_date()) {
            (Some(first), Some(last)) if series.len() >= 2 => (first, last),
            _ => {
                return Err(ForecastError::InsufficientData(format!(
                    "Need at least 2 observations to fit, got {}",
                    series.len()
                )))
            }
        };

        let floor = match config.growth {
            Growth::Logistic { floor, .. } => floor,
            _ => 0.0,
        };
        let dates = series.dates();
        let values = series.values();
        let scaling = Scaling::new(first, last, floor, &values);
        let times: Vec<f64> = dates.iter().map(|&d| scaling.time(d)).collect();
        let y: Vec<f64> = values.iter().map(|&v| scaling.scale(v)).collect();

        let trend = self.trend_spec(&scaling, &times, first, last)?;
        let layout = RegressorLayout::new(config, first, last, holidays)?;
        let regressors = layout.matrix(&dates);
        let design = Design {
            trend: &trend,
            times: &times,
            regressors: &regressors,
        };

        let mut precision = trend.prior_precision(config.changepoint_prior_scale);
        precision.extend(layout.prior_precision());

        let start = initial_params(&design, &y, &precision)?;
        let sigma_fit = rms_residual(&y, &design.fitted(&start)).max(MIN_SIGMA);
        debug!(
            observations = y.len(),
            parameters = design.param_count(),
            changepoints = trend.changepoints().len(),
            sigma = sigma_fit,
            "initialised from ridge solution"
        );

        let objective = MapObjective::new(
            design,
            &y,
            sigma_fit,
            &precision,
            trend.delta_range(),
            config.changepoint_prior_scale,
            &start,
        );
        let mut minimizer = Lbfgs::new(config.optimizer.memory, config.optimizer.max_iterations)?
            .with_objective_tolerance(config.optimizer.tolerance);
        if let Some(seconds) = config.optimizer.max_seconds {
            minimizer = minimizer.with_time_limit(std::time::Duration::from_secs_f64(seconds));
        }
        let minimum = minimizer.minimize(&objective, objective.to_scaled(&start))?;
        let params = objective.to_params(&minimum.x);
        if !minimum.value.is_finite() || params.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::ConvergenceError(
                "Optimizer produced non-finite parameters".to_string(),
            ));
        }
        debug!(
            iterations = minimum.iterations,
            termination = ?minimum.termination,
            objective = minimum.value,
            "optimizer finished"
        );

        let sigma_obs = rms_residual(&y, &design.fitted(&params));
        let sigma_h = sigma_obs.max(MIN_SIGMA);
        let mut hessian = design.jacobian(&params).gram();
        hessian.scale(1.0 / (sigma_h * sigma_h));
        hessian.add_diagonal(&precision)?;
        // seasonal and holiday coefficients are held at their MAP values
        let cholesky = Cholesky::factor(&hessian.leading_block(trend.param_count())?)?;

        let deltas = &params[trend.delta_range()];
        let delta_scale = if deltas.is_empty() {
            0.0
        } else {
            deltas.iter().map(|d| d.abs()).sum::<f64>() / deltas.len() as f64
        };
        let posterior = Posterior::new(
            cholesky,
            sigma_obs,
            trend.changepoints().len() as f64,
            delta_scale,
        );

        info!(
            observations = series.len(),
            first = %first,
            last = %last,
            changepoints = trend.changepoints().len(),
            holidays = layout.holiday_regressors().len(),
            sigma = sigma_obs * scaling.y_scale,
            iterations = minimum.iterations,
            "fitted decomposable model"
        );

        Ok(FittedModel {
            config: config.clone(),
            history: series.clone(),
            scaling,
            trend,
            layout,
            params,
            posterior,
            diagnostics: FitDiagnostics {
                iterations: minimum.iterations,
                termination: minimum.termination,
                objective: minimum.value,
            },
        })
    }
}

impl ForecastModel for DecomposableModel {
    type Trained = FittedModel;

    fn train(&self, series: &Series, holidays: &HolidayTable) -> Result<FittedModel> {
        self.fit(series, holidays)
    }

    fn name(&self) -> &str {
        "Decomposable Model"
    }
}

/// Ridge solution of the Gaussian surrogate problem
///
/// The logistic trend is not linear in its parameters, so it starts from the
/// curve through the first and last points and only the regressors are solved for.
fn initial_params(design: &Design<'_>, y: &[f64], precision: &[f64]) -> Result<Vec<f64>> {
    let tp = design.trend.param_count();
    match design.trend.logistic_start(design.times, y) {
        Some(mut params) => {
            let base = design.trend.values(&params, design.times);
            let residual: Vec<f64> = y.iter().zip(&base).map(|(y, b)| y - b).collect();
            params.extend(two_pass_ridge(design.regressors, &residual, &precision[tp..])?);
            Ok(params)
        }
        None => {
            let x = design.jacobian(&vec![0.0; design.param_count()]);
            two_pass_ridge(&x, y, precision)
        }
    }
}

/// Ridge with unit noise, then again with the noise scale of the first residuals
fn two_pass_ridge(x: &Matrix, y: &[f64], precision: &[f64]) -> Result<Vec<f64>> {
    let first = ridge_solve(x, y, precision)?;
    let sigma = rms_residual(y, &x.mul_vec(&first)?).max(MIN_SIGMA);
    let penalty: Vec<f64> = precision.iter().map(|p| p * sigma * sigma).collect();
    Ok(ridge_solve(x, y, &penalty)?)
}

fn rms_residual(y: &[f64], fitted: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let ss: f64 = y.iter().zip(fitted).map(|(a, b)| (a - b).powi(2)).sum();
    (ss / y.len() as f64).sqrt()
}

/// A fitted decomposable model; immutable, predicts any number of times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    config: ForecastConfig,
    history: Series,
    scaling: Scaling,
    trend: TrendSpec,
    layout: RegressorLayout,
    params: Vec<f64>,
    posterior: Posterior,
    diagnostics: FitDiagnostics,
}

impl FittedModel {
    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// The training series
    pub fn history(&self) -> &Series {
        &self.history
    }

    pub fn diagnostics(&self) -> &FitDiagnostics {
        &self.diagnostics
    }

    pub fn trend_spec(&self) -> &TrendSpec {
        &self.trend
    }

    pub fn layout(&self) -> &RegressorLayout {
        &self.layout
    }

    pub fn posterior(&self) -> &Posterior {
        &self.posterior
    }

    /// Parameters in scaled units, `[trend.., regressors..]`
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Residual noise scale in original units
    pub fn noise_scale(&self) -> f64 {
        self.posterior.sigma_obs() * self.scaling.y_scale()
    }

    /// Changepoint dates
    pub fn changepoints(&self) -> Vec<NaiveDate> {
        self.trend
            .changepoints()
            .iter()
            .map(|&t| self.scaling.date(t))
            .collect()
    }

    /// Fitted rate adjustment at each changepoint, in original units per day
    pub fn changepoint_deltas(&self) -> Vec<f64> {
        let per_day = self.scaling.y_scale() / self.scaling.span_days;
        self.params[self.trend.delta_range()]
            .iter()
            .map(|d| d * per_day)
            .collect()
    }

    /// Names of the holidays with a fitted effect
    pub fn holiday_names(&self) -> Vec<&str> {
        self.layout
            .holiday_regressors()
            .iter()
            .map(|h| h.name.as_str())
            .collect()
    }

    /// History dates followed by `periods` future dates
    pub fn extend_horizon(&self, periods: usize, frequency: Frequency) -> Result<Vec<NaiveDate>> {
        extend_horizon(&self.history, periods, frequency)
    }

    /// Check that restored parts fit together before any prediction indexes into them
    pub(crate) fn validate(&self) -> Result<()> {
        let tp = self.trend.param_count();
        let expected = tp + self.layout.width();
        if self.params.len() != expected {
            return Err(ForecastError::DataError(format!(
                "Model has {} parameters, its trend and regressors need {}",
                self.params.len(),
                expected
            )));
        }
        if self.params.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::DataError(
                "Model parameters must be finite".to_string(),
            ));
        }
        let scaling = &self.scaling;
        if !(scaling.span_days.is_finite() && scaling.span_days > 0.0)
            || !(scaling.y_scale.is_finite() && scaling.y_scale > 0.0)
            || !scaling.floor.is_finite()
        {
            return Err(ForecastError::DataError(
                "Model scaling must be finite and positive".to_string(),
            ));
        }
        if self.history.is_empty() {
            return Err(ForecastError::DataError(
                "Model carries no history".to_string(),
            ));
        }
        self.posterior.validate(tp)
    }

    /// Predict at the given dates, keeping their order
    pub fn predict(&self, dates: &[NaiveDate]) -> Result<Forecast> {
        let times: Vec<f64> = dates.iter().map(|&d| self.scaling.time(d)).collect();
        let regressors = self.layout.matrix(dates);
        let design = Design {
            trend: &self.trend,
            times: &times,
            regressors: &regressors,
        };
        let tp = self.trend.param_count();
        let (trend_params, beta) = self.params.split_at(tp);
        let y_scale = self.scaling.y_scale();

        let trend_scaled = self.trend.values(trend_params, &times);
        let trend: Vec<f64> = trend_scaled.iter().map(|&v| self.scaling.unscale(v)).collect();

        let contribution = |i: usize, columns: std::ops::Range<usize>| -> f64 {
            let row = regressors.row(i);
            columns.map(|c| row[c] * beta[c]).sum::<f64>() * y_scale
        };

        let seasonal: Vec<Component> = self
            .layout
            .seasonal_ranges()
            .into_iter()
            .map(|(name, range)| Component {
                name: name.to_string(),
                values: (0..dates.len())
                    .map(|i| contribution(i, range.clone()))
                    .collect(),
            })
            .collect();
        let holidays: Vec<Component> = self
            .layout
            .holiday_columns()
            .into_iter()
            .map(|(name, column)| Component {
                name: name.to_string(),
                values: (0..dates.len())
                    .map(|i| contribution(i, column..column + 1))
                    .collect(),
            })
            .collect();
        let holidays_total: Vec<f64> = (0..dates.len())
            .map(|i| holidays.iter().map(|c| c.values[i]).sum())
            .collect();

        let point: Vec<f64> = (0..dates.len())
            .map(|i| {
                trend[i] + seasonal.iter().map(|c| c.values[i]).sum::<f64>() + holidays_total[i]
            })
            .collect();

        let bounds = match self.config.uncertainty {
            UncertaintyMethod::Analytic => self.analytic_bounds(&design, &trend_scaled, &point)?,
            UncertaintyMethod::Simulated { samples, seed } => {
                self.simulated_bounds(&design, samples, seed)?
            }
        };

        let rows = dates
            .iter()
            .zip(&point)
            .zip(bounds)
            .map(|((&date, &point_estimate), (lower_bound, upper_bound))| ForecastRow {
                date,
                point_estimate,
                lower_bound,
                upper_bound,
            })
            .collect();

        debug!(dates = dates.len(), "predicted");
        Forecast::new(rows, trend, seasonal, holidays, holidays_total)
    }

    /// `ŷ ± z·√(σ² + jᵀH_tt⁻¹j + trend extrapolation variance)` with `j` the trend Jacobian row
    fn analytic_bounds(
        &self,
        design: &Design<'_>,
        trend_scaled: &[f64],
        point: &[f64],
    ) -> Result<Vec<(f64, f64)>> {
        let z = normal_quantile(self.config.confidence_level)?;
        let tp = self.trend.param_count();
        let jacobian = self.trend.jacobian(&self.params[..tp], design.times);
        let sigma = self.posterior.sigma_obs();
        let y_scale = self.scaling.y_scale();

        (0..point.len())
            .map(|i| {
                let slope = self.trend.deviation_slope(trend_scaled[i]);
                let variance = sigma * sigma
                    + self.posterior.parameter_variance(jacobian.row(i))?
                    + slope * slope * self.posterior.extrapolation_variance(design.times[i]);
                let half = z * variance.max(0.0).sqrt() * y_scale;
                Ok((point[i] - half, point[i] + half))
            })
            .collect()
    }

    /// Empirical quantiles of seeded posterior trajectories
    fn simulated_bounds(&self, design: &Design<'_>, samples: usize, seed: u64) -> Result<Vec<(f64, f64)>> {
        let n = design.times.len();
        let horizon = design.times.iter().cloned().fold(1.0, f64::max);
        let tp = self.trend.param_count();
        let (mode, beta) = self.params.split_at(tp);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut draws: Vec<Vec<f64>> = vec![Vec::with_capacity(samples); n];

        for _ in 0..samples {
            let trend_params = self.posterior.draw_parameters(mode, &mut rng)?;
            let changes = self.posterior.draw_future_changes(horizon, &mut rng)?;
            let trend = self.trend.values(&trend_params, design.times);
            for i in 0..n {
                let t = design.times[i];
                let trend_i = self.trend.perturb(trend[i], changes.deviation(t));
                let seasonal = forecast_math::dot(design.regressors.row(i), beta);
                let noise = self.posterior.draw_noise(&mut rng);
                draws[i].push(self.scaling.unscale(trend_i + seasonal + noise));
            }
        }

        let level = self.config.confidence_level;
        let (lo_q, hi_q) = ((1.0 - level) / 2.0, (1.0 + level) / 2.0);
        Ok(draws
            .into_iter()
            .map(|mut values| {
                values.sort_by(f64::total_cmp);
                (quantile(&values, lo_q), quantile(&values, hi_q))
            })
            .collect())
    }
}

impl TrainedForecastModel for FittedModel {
    fn predict(&self, dates: &[NaiveDate]) -> Result<Forecast> {
        FittedModel::predict(self, dates)
    }

    fn forecast(&self, periods: usize, frequency: Frequency) -> Result<Forecast> {
        let dates = self.extend_horizon(periods, frequency)?;
        FittedModel::predict(self, &dates)
    }

    fn name(&self) -> &str {
        "Decomposable Model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn linear_series(n: usize) -> Series {
        let start = d(2016, 1, 1);
        let dates: Vec<NaiveDate> = (0..n as i64).map(|i| start + Duration::days(i)).collect();
        let values: Vec<f64> = (0..n).map(|i| 50.0 + 0.5 * i as f64).collect();
        Series::from_parts(&dates, &values).unwrap()
    }

    fn plain_config() -> ForecastConfig {
        ForecastConfig::default()
            .with_yearly_seasonality(false)
            .with_weekly_seasonality(false)
    }

    #[test]
    fn test_scaling() {
        let scaling = Scaling::new(d(2017, 1, 1), d(2017, 1, 11), 0.0, &[-4.0, 2.0]);
        assert_relative_eq!(scaling.time(d(2017, 1, 6)), 0.5);
        assert_relative_eq!(scaling.scale(2.0), 0.5);
        assert_relative_eq!(scaling.unscale(0.5), 2.0);
        assert_eq!(scaling.date(0.3), d(2017, 1, 4));

        let constant = Scaling::new(d(2017, 1, 1), d(2017, 1, 2), 0.0, &[0.0, 0.0]);
        assert_relative_eq!(constant.y_scale(), 1.0);
    }

    #[test]
    fn test_linear_series_is_recovered() {
        let series = linear_series(120);
        let model = DecomposableModel::new(plain_config()).unwrap();
        let fitted = model.fit(&series, &HolidayTable::empty()).unwrap();
        let forecast = fitted.predict(&series.dates()).unwrap();
        for (row, actual) in forecast.rows().iter().zip(series.values()) {
            assert_relative_eq!(row.point_estimate, actual, epsilon = 0.5);
        }
        // slope of half a unit per day continues
        let future = fitted.predict(&[d(2016, 6, 1)]).unwrap();
        let expected = 50.0 + 0.5 * (d(2016, 6, 1) - d(2016, 1, 1)).num_days() as f64;
        assert_relative_eq!(future.rows()[0].point_estimate, expected, epsilon = 2.0);
    }

    #[test]
    fn test_explicit_changepoints() {
        let series = linear_series(60);
        let config = plain_config().with_changepoints(vec![d(2016, 1, 20), d(2016, 2, 10)]);
        let fitted = DecomposableModel::new(config)
            .unwrap()
            .fit(&series, &HolidayTable::empty())
            .unwrap();
        assert_eq!(fitted.changepoints(), vec![d(2016, 1, 20), d(2016, 2, 10)]);
        assert_eq!(fitted.changepoint_deltas().len(), 2);

        let outside = plain_config().with_changepoints(vec![d(2015, 1, 1)]);
        let result = DecomposableModel::new(outside)
            .unwrap()
            .fit(&series, &HolidayTable::empty());
        assert!(matches!(result, Err(ForecastError::InvalidArgument(_))));
    }

    #[test]
    fn test_flat_growth() {
        let series = linear_series(30);
        let config = plain_config().with_growth(Growth::Flat);
        let fitted = DecomposableModel::new(config)
            .unwrap()
            .fit(&series, &HolidayTable::empty())
            .unwrap();
        let forecast = fitted.predict(&[d(2016, 1, 1), d(2016, 3, 1)]).unwrap();
        assert_relative_eq!(forecast.trend()[0], forecast.trend()[1], epsilon = 1e-9);
        assert!(fitted.changepoints().is_empty());
    }

    #[test]
    fn test_logistic_growth_respects_capacity() {
        let start = d(2016, 1, 1);
        let dates: Vec<NaiveDate> = (0..200).map(|i| start + Duration::days(i)).collect();
        let values: Vec<f64> = (0..200)
            .map(|i| 100.0 / (1.0 + (-(i as f64 - 100.0) / 20.0).exp()))
            .collect();
        let series = Series::from_parts(&dates, &values).unwrap();
        let config = plain_config().with_growth(Growth::Logistic {
            cap: 110.0,
            floor: 0.0,
        });
        let fitted = DecomposableModel::new(config)
            .unwrap()
            .fit(&series, &HolidayTable::empty())
            .unwrap();
        let far = fitted.predict(&[start + Duration::days(2000)]).unwrap();
        assert!(far.trend()[0] <= 110.0 + 1e-9);
        assert!(far.trend()[0] > 80.0);
    }

    #[test]
    fn test_simulated_intervals_are_deterministic() {
        let series = linear_series(90);
        let config = plain_config().with_uncertainty(UncertaintyMethod::Simulated {
            samples: 200,
            seed: 11,
        });
        let fitted = DecomposableModel::new(config)
            .unwrap()
            .fit(&series, &HolidayTable::empty())
            .unwrap();
        let dates = fitted.extend_horizon(10, Frequency::Daily).unwrap();
        let a = fitted.predict(&dates).unwrap();
        let b = fitted.predict(&dates).unwrap();
        assert_eq!(a, b);
        for row in a.rows() {
            assert!(row.lower_bound <= row.upper_bound);
        }
    }

    #[test]
    fn test_iteration_budget_is_a_convergence_error() {
        let series = linear_series(60);
        let mut config = ForecastConfig::default();
        config.optimizer.max_iterations = 1;
        config.optimizer.tolerance = 0.0;
        let result = DecomposableModel::new(config)
            .unwrap()
            .fit(&series, &HolidayTable::empty());
        assert!(matches!(result, Err(ForecastError::ConvergenceError(_))));
    }
}
