//! MAP objective of the decomposable model
//!
//! Negative log posterior in scaled units:
//!
//! `½σ⁻²Σ(y - ŷ)² + ½Σ prec_i θ_i² + Σ_j |δ_j| / τ`
//!
//! where the Gaussian part covers the base rate, offset and regressor
//! coefficients and the Laplace part the trend rate adjustments. `|x|` is
//! smoothed to `sqrt(x² + ε²) - ε` so the objective is differentiable.

use crate::models::trend::TrendSpec;
use forecast_math::linalg::Matrix;
use forecast_math::optimize::Objective;
use std::ops::Range;

/// Smoothing width of the absolute value
pub const ABS_SMOOTHING: f64 = 1e-4;

/// Trend structure plus regressors evaluated at the training times
#[derive(Debug, Clone, Copy)]
pub struct Design<'a> {
    pub trend: &'a TrendSpec,
    pub times: &'a [f64],
    pub regressors: &'a Matrix,
}

impl<'a> Design<'a> {
    pub fn param_count(&self) -> usize {
        self.trend.param_count() + self.regressors.cols()
    }

    pub fn rows(&self) -> usize {
        self.times.len()
    }

    /// Fitted values for the parameter vector `[trend.., regressors..]`
    pub fn fitted(&self, params: &[f64]) -> Vec<f64> {
        let (trend_params, beta) = params.split_at(self.trend.param_count());
        let mut fitted = self.trend.values(trend_params, self.times);
        for (i, value) in fitted.iter_mut().enumerate() {
            *value += forecast_math::dot(self.regressors.row(i), beta);
        }
        fitted
    }

    /// Full Jacobian of the fitted values
    pub fn jacobian(&self, params: &[f64]) -> Matrix {
        let tp = self.trend.param_count();
        let trend_jac = self.trend.jacobian(&params[..tp], self.times);
        let mut jac = Matrix::zeros(self.rows(), self.param_count());
        for i in 0..self.rows() {
            let row = jac.row_mut(i);
            row[..tp].copy_from_slice(trend_jac.row(i));
            row[tp..].copy_from_slice(self.regressors.row(i));
        }
        jac
    }

    /// `Jᵀ v` without materialising the regressor part twice
    fn jacobian_transpose_mul(&self, params: &[f64], v: &[f64], out: &mut [f64]) {
        let tp = self.trend.param_count();
        let trend_jac = self.trend.jacobian(&params[..tp], self.times);
        out.iter_mut().for_each(|o| *o = 0.0);
        for (i, &vi) in v.iter().enumerate() {
            if vi == 0.0 {
                continue;
            }
            for (o, j) in out[..tp].iter_mut().zip(trend_jac.row(i)) {
                *o += vi * j;
            }
            for (o, x) in out[tp..].iter_mut().zip(self.regressors.row(i)) {
                *o += vi * x;
            }
        }
    }
}

/// Negative log posterior over diagonally rescaled parameters
///
/// The optimizer works on `u = c ⊙ θ`, where `c` is the square root of the
/// diagonal of the Gauss-Newton Hessian at the start point.
pub struct MapObjective<'a> {
    design: Design<'a>,
    y: &'a [f64],
    inv_variance: f64,
    gaussian_precision: Vec<f64>,
    laplace: Range<usize>,
    laplace_scale: f64,
    scaling: Vec<f64>,
}

impl<'a> MapObjective<'a> {
    /// `gaussian_precision` holds one entry per parameter; entries in
    /// `laplace` are ignored and replaced by the Laplace prior of scale `laplace_scale`
    pub fn new(
        design: Design<'a>,
        y: &'a [f64],
        sigma: f64,
        gaussian_precision: &[f64],
        laplace: Range<usize>,
        laplace_scale: f64,
        start: &[f64],
    ) -> Self {
        let mut precision = gaussian_precision.to_vec();
        for p in &mut precision[laplace.clone()] {
            *p = 0.0;
        }
        let inv_variance = 1.0 / (sigma * sigma);

        // diag(JᵀJ)/σ² + prior precision, with the Gaussian stand-in for the Laplace terms
        let jac = design.jacobian(start);
        let scaling = (0..design.param_count())
            .map(|j| {
                let data: f64 = (0..jac.rows()).map(|i| jac[(i, j)] * jac[(i, j)]).sum();
                let prior = if laplace.contains(&j) {
                    1.0 / (2.0 * laplace_scale * laplace_scale)
                } else {
                    precision[j]
                };
                let c = (data * inv_variance + prior).sqrt();
                if c.is_finite() && c > 0.0 {
                    c
                } else {
                    1.0
                }
            })
            .collect();

        Self {
            design,
            y,
            inv_variance,
            gaussian_precision: precision,
            laplace,
            laplace_scale,
            scaling,
        }
    }

    /// Map model parameters to optimizer coordinates
    pub fn to_scaled(&self, params: &[f64]) -> Vec<f64> {
        params.iter().zip(&self.scaling).map(|(p, c)| p * c).collect()
    }

    /// Map optimizer coordinates back to model parameters
    pub fn to_params(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().zip(&self.scaling).map(|(u, c)| u / c).collect()
    }

    /// Objective value and gradient with respect to the model parameters
    pub fn value_and_gradient(&self, params: &[f64], gradient: &mut [f64]) -> f64 {
        let fitted = self.design.fitted(params);
        let residuals: Vec<f64> = self.y.iter().zip(&fitted).map(|(y, f)| y - f).collect();

        let mut value = 0.5 * self.inv_variance * residuals.iter().map(|r| r * r).sum::<f64>();
        let weighted: Vec<f64> = residuals.iter().map(|r| -r * self.inv_variance).collect();
        self.design
            .jacobian_transpose_mul(params, &weighted, gradient);

        for (j, &theta) in params.iter().enumerate() {
            if self.laplace.contains(&j) {
                let smooth = (theta * theta + ABS_SMOOTHING * ABS_SMOOTHING).sqrt();
                value += (smooth - ABS_SMOOTHING) / self.laplace_scale;
                gradient[j] += theta / (smooth * self.laplace_scale);
            } else {
                let p = self.gaussian_precision[j];
                value += 0.5 * p * theta * theta;
                gradient[j] += p * theta;
            }
        }
        value
    }
}

impl Objective for MapObjective<'_> {
    fn dimension(&self) -> usize {
        self.design.param_count()
    }

    fn evaluate(&self, x: &[f64], gradient: &mut [f64]) -> f64 {
        let params = self.to_params(x);
        let value = self.value_and_gradient(&params, gradient);
        for (g, c) in gradient.iter_mut().zip(&self.scaling) {
            *g /= c;
        }
        value
    }
}
