//! Fourier bases for periodic effects
//!
//! A periodic effect with period `P` is approximated by
//! `Σ_{n=1..N} a_n sin(2πnt/P) + b_n cos(2πnt/P)`.

use crate::{MathError, Result};
use std::f64::consts::PI;

/// Number of columns a Fourier basis of the given order occupies
pub fn basis_width(order: usize) -> usize {
    2 * order
}

/// Validate a period/order pair
pub fn validate(period: f64, order: usize) -> Result<()> {
    if !(period.is_finite() && period > 0.0) {
        return Err(MathError::InvalidInput(format!(
            "Fourier period must be positive, got {}",
            period
        )));
    }
    if order == 0 {
        return Err(MathError::InvalidInput(
            "Fourier order must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Append the basis evaluated at `t` to `out`: `[sin(2π·1·t/P), cos(2π·1·t/P), sin(2π·2·t/P), ...]`
pub fn extend_row(t: f64, period: f64, order: usize, out: &mut Vec<f64>) {
    for n in 1..=order {
        let x = 2.0 * PI * n as f64 * t / period;
        out.push(x.sin());
        out.push(x.cos());
    }
}

/// Evaluate the basis at every time point
pub fn basis(times: &[f64], period: f64, order: usize) -> Result<Vec<Vec<f64>>> {
    validate(period, order)?;
    Ok(times
        .iter()
        .map(|&t| {
            let mut row = Vec::with_capacity(basis_width(order));
            extend_row(t, period, order, &mut row);
            row
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basis_shape_and_values() {
        let rows = basis(&[0.0, 1.75], 7.0, 3).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 6);

        // t = 0: all sines 0, all cosines 1
        for n in 0..3 {
            assert_relative_eq!(rows[0][2 * n], 0.0);
            assert_relative_eq!(rows[0][2 * n + 1], 1.0);
        }
        // quarter period: sin(π/2) = 1, cos(π/2) = 0
        assert_relative_eq!(rows[1][0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(rows[1][1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_basis_is_periodic() {
        let rows = basis(&[3.0, 3.0 + 365.25 * 4.0], 365.25, 10).unwrap();
        for (a, b) in rows[0].iter().zip(&rows[1]) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(basis(&[0.0], 0.0, 3).is_err());
        assert!(basis(&[0.0], 7.0, 0).is_err());
        assert!(validate(f64::NAN, 2).is_err());
    }
}
