//! Trend component
//!
//! Times are scaled so the history covers `[0, 1]` and values so the history
//! fits in `[-1, 1]`. Parameters are laid out as `[k, m, δ_1..δ_S]` for the
//! linear and logistic trends and `[m]` for the flat trend.

use crate::error::{ForecastError, Result};
use forecast_math::linalg::Matrix;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Prior standard deviation of the base rate and offset
pub const BASE_PRIOR_SCALE: f64 = 5.0;

/// Smallest rate magnitude used as a divisor in the logistic offsets
const MIN_RATE: f64 = 1e-10;

/// Trend family with its fixed (non-fitted) settings, in scaled units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrendKind {
    Linear,
    Flat,
    Logistic { cap: f64 },
}

/// Trend structure: family plus changepoint locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSpec {
    kind: TrendKind,
    changepoints: Vec<f64>,
}

/// Evenly spaced changepoints within the first `range` of the history
///
/// `times` must be sorted. Fewer than `count` changepoints are placed when
/// the history is short.
pub fn place_changepoints(times: &[f64], count: usize, range: f64) -> Vec<f64> {
    let hist_size = (times.len() as f64 * range).floor() as usize;
    let count = count.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }
    let last = (hist_size - 1) as f64;
    (1..=count)
        .map(|i| {
            let index = (last * i as f64 / count as f64).round() as usize;
            times[index]
        })
        .collect()
}

impl TrendSpec {
    /// Create a trend; changepoints are sorted and ignored for the flat family
    pub fn new(kind: TrendKind, mut changepoints: Vec<f64>) -> Result<Self> {
        if let TrendKind::Logistic { cap } = kind {
            if !(cap.is_finite() && cap > 0.0) {
                return Err(ForecastError::InvalidArgument(format!(
                    "Logistic capacity must lie above the floor, got {} in scaled units",
                    cap
                )));
            }
        }
        if changepoints.iter().any(|s| !s.is_finite()) {
            return Err(ForecastError::InvalidArgument(
                "Changepoints must be finite".to_string(),
            ));
        }
        if kind == TrendKind::Flat {
            changepoints.clear();
        }
        changepoints.sort_by(f64::total_cmp);
        changepoints.dedup();
        Ok(Self { kind, changepoints })
    }

    pub fn kind(&self) -> TrendKind {
        self.kind
    }

    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }

    /// Number of trend parameters
    pub fn param_count(&self) -> usize {
        match self.kind {
            TrendKind::Flat => 1,
            _ => 2 + self.changepoints.len(),
        }
    }

    /// Positions of the rate adjustments in the parameter vector
    pub fn delta_range(&self) -> Range<usize> {
        match self.kind {
            TrendKind::Flat => 0..0,
            _ => 2..2 + self.changepoints.len(),
        }
    }

    /// Gaussian prior precision per trend parameter
    ///
    /// Rate adjustments get the precision of a normal with the variance of
    /// their Laplace prior, `1 / (2τ²)`.
    pub fn prior_precision(&self, changepoint_prior_scale: f64) -> Vec<f64> {
        let base = 1.0 / (BASE_PRIOR_SCALE * BASE_PRIOR_SCALE);
        match self.kind {
            TrendKind::Flat => vec![base],
            _ => {
                let delta =
                    1.0 / (2.0 * changepoint_prior_scale * changepoint_prior_scale);
                let mut precision = vec![base, base];
                precision.extend(std::iter::repeat(delta).take(self.changepoints.len()));
                precision
            }
        }
    }

    /// Number of changepoints at or before `t`
    fn active(&self, t: f64) -> usize {
        self.changepoints.partition_point(|&s| s <= t)
    }

    /// Trend values at every time
    pub fn values(&self, params: &[f64], times: &[f64]) -> Vec<f64> {
        match self.kind {
            TrendKind::Flat => vec![params[0]; times.len()],
            TrendKind::Linear => times
                .iter()
                .map(|&t| self.linear_value(params, t))
                .collect(),
            TrendKind::Logistic { cap } => {
                let offsets = LogisticOffsets::new(&self.changepoints, params, false);
                times
                    .iter()
                    .map(|&t| {
                        let (_, _, z) = self.logistic_argument(params, &offsets, t);
                        cap * sigmoid(z)
                    })
                    .collect()
            }
        }
    }

    fn linear_value(&self, params: &[f64], t: f64) -> f64 {
        let (k, m) = (params[0], params[1]);
        let bends: f64 = self
            .changepoints
            .iter()
            .zip(&params[2..])
            .map(|(s, d)| d * (t - s).max(0.0))
            .sum();
        k * t + m + bends
    }

    /// Rate `K(t)`, offset `M(t)` and logistic argument `K(t)(t - M(t))`
    fn logistic_argument(&self, params: &[f64], offsets: &LogisticOffsets, t: f64) -> (f64, f64, f64) {
        let active = self.active(t);
        let rate = params[0] + params[2..2 + active].iter().sum::<f64>();
        let offset = offsets.offset[active];
        (rate, offset, rate * (t - offset))
    }

    /// Jacobian of the trend values with respect to the trend parameters
    pub fn jacobian(&self, params: &[f64], times: &[f64]) -> Matrix {
        let p = self.param_count();
        let mut jac = Matrix::zeros(times.len(), p);
        match self.kind {
            TrendKind::Flat => {
                for i in 0..times.len() {
                    jac[(i, 0)] = 1.0;
                }
            }
            TrendKind::Linear => {
                for (i, &t) in times.iter().enumerate() {
                    let row = jac.row_mut(i);
                    row[0] = t;
                    row[1] = 1.0;
                    for (cell, s) in row[2..].iter_mut().zip(&self.changepoints) {
                        *cell = (t - s).max(0.0);
                    }
                }
            }
            TrendKind::Logistic { cap } => {
                let offsets = LogisticOffsets::new(&self.changepoints, params, true);
                for (i, &t) in times.iter().enumerate() {
                    let active = self.active(t);
                    let (rate, offset, z) = self.logistic_argument(params, &offsets, t);
                    let g = cap * sigmoid(z);
                    let slope = g * (1.0 - g / cap);
                    let d_offset = &offsets.gradient[active];
                    let row = jac.row_mut(i);
                    for (j, cell) in row.iter_mut().enumerate() {
                        let d_rate = if j == 0 || (j >= 2 && j < 2 + active) {
                            1.0
                        } else {
                            0.0
                        };
                        *cell = slope * (d_rate * (t - offset) - rate * d_offset[j]);
                    }
                }
            }
        }
        jac
    }

    /// Factor mapping a rate-space deviation to a change of the trend value
    pub fn deviation_slope(&self, value: f64) -> f64 {
        match self.kind {
            TrendKind::Logistic { cap } => value * (1.0 - value / cap),
            _ => 1.0,
        }
    }

    /// Apply a rate-space deviation to a trend value
    pub fn perturb(&self, value: f64, deviation: f64) -> f64 {
        match self.kind {
            TrendKind::Logistic { cap } => {
                let share = (value / cap).clamp(1e-12, 1.0 - 1e-12);
                let z = (share / (1.0 - share)).ln();
                cap * sigmoid(z + deviation)
            }
            _ => value + deviation,
        }
    }

    /// Starting values for the logistic trend from the first and last points
    ///
    /// Rate adjustments start at zero. Returns `None` for other families.
    pub fn logistic_start(&self, times: &[f64], y: &[f64]) -> Option<Vec<f64>> {
        let cap = match self.kind {
            TrendKind::Logistic { cap } => cap,
            _ => return None,
        };
        let (t0, t1) = (*times.first()?, *times.last()?);
        let (y0, y1) = (*y.first()?, *y.last()?);
        let span = (t1 - t0).max(f64::EPSILON);

        let clamp = |v: f64| v.min(0.99 * cap).max(0.01 * cap);
        let mut r0 = cap / clamp(y0);
        let r1 = cap / clamp(y1);
        if (r0 - r1).abs() <= 0.01 {
            r0 *= 1.05;
        }
        let l0 = (r0 - 1.0).ln();
        let l1 = (r1 - 1.0).ln();
        let m = l0 * span / (l0 - l1) + t0;
        let k = (l0 - l1) / span;

        let mut params = vec![0.0; self.param_count()];
        params[0] = k;
        params[1] = m;
        Some(params)
    }
}

/// Offsets `M` after each changepoint that keep the logistic trend continuous,
/// with their gradients when requested
struct LogisticOffsets {
    offset: Vec<f64>,
    gradient: Vec<Vec<f64>>,
}

impl LogisticOffsets {
    fn new(changepoints: &[f64], params: &[f64], with_gradient: bool) -> Self {
        let p = params.len();
        let mut offset = Vec::with_capacity(changepoints.len() + 1);
        let mut gradient = Vec::new();

        offset.push(params[1]);
        let mut d_offset = vec![0.0; if with_gradient { p } else { 0 }];
        if with_gradient {
            d_offset[1] = 1.0;
            gradient.push(d_offset.clone());
        }

        let mut rate_prev = params[0];
        let mut d_rate_prev = vec![0.0; if with_gradient { p } else { 0 }];
        if with_gradient {
            d_rate_prev[0] = 1.0;
        }

        for (j, &s) in changepoints.iter().enumerate() {
            let rate = params[0] + params[2..=2 + j].iter().sum::<f64>();
            let denom = if rate.abs() < MIN_RATE {
                MIN_RATE.copysign(rate)
            } else {
                rate
            };
            let ratio = rate_prev / denom;
            let previous = offset[j];
            // continuity at s: (s - M_j) K_j = (s - M_{j-1}) K_{j-1}
            offset.push(s - (s - previous) * ratio);

            if with_gradient {
                let mut d_rate = d_rate_prev.clone();
                d_rate[2 + j] += 1.0;
                let next: Vec<f64> = (0..p)
                    .map(|i| {
                        let d_ratio = d_rate_prev[i] / denom - rate_prev * d_rate[i] / (denom * denom);
                        d_offset[i] * ratio - (s - previous) * d_ratio
                    })
                    .collect();
                gradient.push(next.clone());
                d_offset = next;
                d_rate_prev = d_rate;
            }
            rate_prev = rate;
        }

        Self { offset, gradient }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
