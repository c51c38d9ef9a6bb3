//! Prediction intervals from a Laplace approximation of the posterior
//!
//! The posterior over the trend parameters is approximated by a normal
//! centred at the MAP point. Its precision is the trend block `H_tt` of
//! `H = JᵀJ/σ² + prior precision`, i.e. the trend precision conditional on
//! the seasonal and holiday coefficients, which stay at their MAP values.
//! On top of parameter uncertainty, forecasts past the history carry trend
//! uncertainty:
//! new changepoints keep arriving at the historical rate `ρ` with
//! Laplace(0, λ) rate changes, so the rate-space deviation at scaled time
//! `t > 1` has variance `ρ·2λ²·(t - 1)³ / 3`.

use crate::error::{ForecastError, Result};
use forecast_math::linalg::Cholesky;
use rand::Rng;
use rand_distr::{Distribution, Exp, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided standard normal quantile for a central interval of width `level`
pub fn normal_quantile(level: f64) -> Result<f64> {
    if !(level > 0.0 && level < 1.0) {
        return Err(ForecastError::InvalidArgument(format!(
            "Confidence level must lie in (0, 1), got {}",
            level
        )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| ForecastError::MathError(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + level / 2.0))
}

/// Linear-interpolated quantile of sorted samples
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let w = pos - lo as f64;
            sorted[lo] * (1.0 - w) + sorted[hi] * w
        }
    }
}

/// Posterior summary stored with a fitted model, in scaled units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    /// Cholesky factor of the trend precision `H_tt`
    precision: Cholesky,
    /// RMS of the final residuals
    sigma_obs: f64,
    /// Changepoints per unit of scaled time
    changepoint_rate: f64,
    /// Mean absolute fitted rate change
    delta_scale: f64,
}

/// Future changepoints drawn for one simulated trajectory
#[derive(Debug, Clone, Default)]
pub struct FutureChanges {
    changes: Vec<(f64, f64)>,
}

impl FutureChanges {
    /// Rate-space deviation `Σ δ_c (t - c)` over changes before `t`
    pub fn deviation(&self, t: f64) -> f64 {
        self.changes
            .iter()
            .filter(|(c, _)| *c < t)
            .map(|(c, delta)| delta * (t - c))
            .sum()
    }
}

impl Posterior {
    pub fn new(
        precision: Cholesky,
        sigma_obs: f64,
        changepoint_rate: f64,
        delta_scale: f64,
    ) -> Self {
        Self {
            precision,
            sigma_obs,
            changepoint_rate,
            delta_scale,
        }
    }

    pub fn sigma_obs(&self) -> f64 {
        self.sigma_obs
    }

    pub fn changepoint_rate(&self) -> f64 {
        self.changepoint_rate
    }

    pub fn delta_scale(&self) -> f64 {
        self.delta_scale
    }

    pub fn dimension(&self) -> usize {
        self.precision.dim()
    }

    /// Variance of the fitted trend with trend Jacobian row `j`, `jᵀH_tt⁻¹j`
    pub fn parameter_variance(&self, jacobian_row: &[f64]) -> Result<f64> {
        Ok(self.precision.inverse_quadratic_form(jacobian_row)?)
    }

    /// Variance of the rate-space trend deviation at scaled time `t`
    pub fn extrapolation_variance(&self, t: f64) -> f64 {
        if t <= 1.0 {
            return 0.0;
        }
        let lambda = self.delta_scale;
        self.changepoint_rate * 2.0 * lambda * lambda * (t - 1.0).powi(3) / 3.0
    }

    /// Check the stored summary against a trend with `trend_params` parameters
    pub fn validate(&self, trend_params: usize) -> Result<()> {
        if self.dimension() != trend_params {
            return Err(ForecastError::DataError(format!(
                "Posterior covers {} parameters but the trend has {}",
                self.dimension(),
                trend_params
            )));
        }
        if !self.precision.is_valid() {
            return Err(ForecastError::DataError(
                "Posterior precision factor is not a valid Cholesky factor".to_string(),
            ));
        }
        let scalars = [self.sigma_obs, self.changepoint_rate, self.delta_scale];
        if scalars.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ForecastError::DataError(
                "Posterior noise and changepoint scales must be finite and non-negative"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Draw trend parameters from the approximate posterior around `mode`
    pub fn draw_parameters<R: Rng>(&self, mode: &[f64], rng: &mut R) -> Result<Vec<f64>> {
        let z: Vec<f64> = (0..mode.len()).map(|_| rng.sample(StandardNormal)).collect();
        // Lᵀx = z gives x with covariance H_tt⁻¹
        let offset = self.precision.solve_upper(&z)?;
        Ok(mode.iter().zip(&offset).map(|(m, o)| m + o).collect())
    }

    /// Draw future changepoints over `(1, horizon]`
    pub fn draw_future_changes<R: Rng>(&self, horizon: f64, rng: &mut R) -> Result<FutureChanges> {
        let expected = self.changepoint_rate * (horizon - 1.0);
        if horizon <= 1.0 || expected <= 0.0 || self.delta_scale <= 0.0 {
            return Ok(FutureChanges::default());
        }
        let poisson = Poisson::new(expected).map_err(|e| ForecastError::MathError(e.to_string()))?;
        let size = Exp::new(1.0 / self.delta_scale)
            .map_err(|e| ForecastError::MathError(e.to_string()))?;

        let count = poisson.sample(rng) as usize;
        let changes = (0..count)
            .map(|_| {
                let at = rng.gen_range(1.0..horizon);
                let magnitude: f64 = size.sample(rng);
                let delta = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
                (at, delta)
            })
            .collect();
        Ok(FutureChanges { changes })
    }

    /// Draw observation noise
    pub fn draw_noise<R: Rng>(&self, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        self.sigma_obs * z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use forecast_math::linalg::Matrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn posterior() -> Posterior {
        let h = Matrix::from_rows(&[vec![4.0, 0.0], vec![0.0, 25.0]]).unwrap();
        Posterior::new(Cholesky::factor(&h).unwrap(), 0.1, 25.0, 0.02)
    }

    #[test]
    fn test_normal_quantile() {
        assert_relative_eq!(normal_quantile(0.95).unwrap(), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(normal_quantile(0.8).unwrap(), 1.281552, epsilon = 1e-5);
        assert!(normal_quantile(1.0).is_err());
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile(&sorted, 0.5), 3.0);
        assert_relative_eq!(quantile(&sorted, 0.1), 1.4);
        assert_relative_eq!(quantile(&sorted, 1.0), 5.0);
    }

    #[test]
    fn test_extrapolation_variance_grows_cubically() {
        let p = posterior();
        assert_eq!(p.extrapolation_variance(0.5), 0.0);
        assert_eq!(p.extrapolation_variance(1.0), 0.0);
        let a = p.extrapolation_variance(1.1);
        let b = p.extrapolation_variance(1.2);
        assert_relative_eq!(b / a, 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parameter_draws_match_covariance() {
        let p = posterior();
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let mut sums = [0.0, 0.0];
        for _ in 0..n {
            let draw = p.draw_parameters(&[1.0, -1.0], &mut rng).unwrap();
            sums[0] += (draw[0] - 1.0).powi(2);
            sums[1] += (draw[1] + 1.0).powi(2);
        }
        // covariance is diag(1/4, 1/25)
        assert_relative_eq!(sums[0] / n as f64, 0.25, max_relative = 0.05);
        assert_relative_eq!(sums[1] / n as f64, 0.04, max_relative = 0.05);
    }

    #[test]
    fn test_validate() {
        let p = posterior();
        assert!(p.validate(2).is_ok());
        assert!(matches!(p.validate(3), Err(ForecastError::DataError(_))));

        let negative = Posterior::new(p.precision.clone(), -0.1, 25.0, 0.02);
        assert!(negative.validate(2).is_err());
    }

    #[test]
    fn test_future_changes_only_after_history() {
        let p = posterior();
        let mut rng = StdRng::seed_from_u64(7);
        let changes = p.draw_future_changes(2.0, &mut rng).unwrap();
        assert_eq!(changes.deviation(1.0), 0.0);
        assert!(changes.changes.iter().all(|(c, _)| *c >= 1.0 && *c < 2.0));
        assert!(p.draw_future_changes(0.9, &mut rng).unwrap().changes.is_empty());
    }
}
