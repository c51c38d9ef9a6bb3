//! Dense linear algebra for small symmetric systems
//!
//! Design matrices have one row per observation and a few dozen to a few
//! hundred columns. They are stored row-major so a single observation's
//! features can be borrowed as a slice; normal equations and posterior
//! precisions are handed to `nalgebra` for the Cholesky factorization.

use crate::{dot, MathError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Row-major dense matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create an identity matrix
    pub fn identity(size: usize) -> Self {
        let mut m = Self::zeros(size, size);
        for i in 0..size {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Create a matrix from row-major data
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(MathError::InvalidInput(format!(
                "Expected {} values for a {}x{} matrix, got {}",
                rows * cols,
                rows,
                cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Create a matrix from a list of equally sized rows
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(MathError::InvalidInput(format!(
                    "Row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow one row
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Borrow one row mutably
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Matrix-vector product `A x`
    pub fn mul_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.cols {
            return Err(MathError::InvalidInput(format!(
                "Vector length {} does not match {} columns",
                x.len(),
                self.cols
            )));
        }
        Ok((0..self.rows).map(|i| dot(self.row(i), x)).collect())
    }

    /// Transposed product `Aᵀ x`
    pub fn transpose_mul_vec(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.len() != self.rows {
            return Err(MathError::InvalidInput(format!(
                "Vector length {} does not match {} rows",
                x.len(),
                self.rows
            )));
        }
        let mut out = vec![0.0; self.cols];
        for (i, &xi) in x.iter().enumerate() {
            if xi == 0.0 {
                continue;
            }
            for (o, a) in out.iter_mut().zip(self.row(i)) {
                *o += a * xi;
            }
        }
        Ok(out)
    }

    /// Gram matrix `Aᵀ A`
    pub fn gram(&self) -> Matrix {
        let dense = self.to_dmatrix();
        Matrix::from_dmatrix(&dense.tr_mul(&dense))
    }

    /// Top-left `size x size` block of a square matrix
    pub fn leading_block(&self, size: usize) -> Result<Matrix> {
        if self.rows != self.cols || size > self.rows {
            return Err(MathError::InvalidInput(format!(
                "Cannot take a {}x{} block of a {}x{} matrix",
                size, size, self.rows, self.cols
            )));
        }
        let mut block = Matrix::zeros(size, size);
        for i in 0..size {
            block.row_mut(i).copy_from_slice(&self.row(i)[..size]);
        }
        Ok(block)
    }

    /// Copy into an `nalgebra` matrix
    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.rows, self.cols, &self.data)
    }

    /// Copy out of an `nalgebra` matrix
    pub fn from_dmatrix(dense: &DMatrix<f64>) -> Self {
        // column-major storage of the transpose is row-major storage of `dense`
        Self {
            rows: dense.nrows(),
            cols: dense.ncols(),
            data: dense.transpose().as_slice().to_vec(),
        }
    }

    /// Add `values[i]` to the i-th diagonal entry
    pub fn add_diagonal(&mut self, values: &[f64]) -> Result<()> {
        if self.rows != self.cols || values.len() != self.rows {
            return Err(MathError::InvalidInput(
                "Diagonal update requires a square matrix of matching size".to_string(),
            ));
        }
        for (i, v) in values.iter().enumerate() {
            self[(i, i)] += v;
        }
        Ok(())
    }

    /// Scale every entry in place
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.data {
            *v *= factor;
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
}

/// Cholesky factorization `A = L Lᵀ` of a symmetric positive definite matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cholesky {
    lower: DMatrix<f64>,
}

impl Cholesky {
    /// Factor a symmetric positive definite matrix
    pub fn factor(a: &Matrix) -> Result<Self> {
        if a.rows != a.cols {
            return Err(MathError::InvalidInput(format!(
                "Cholesky needs a square matrix, got {}x{}",
                a.rows, a.cols
            )));
        }
        let dimension = a.rows;
        let lower = nalgebra::linalg::Cholesky::new(a.to_dmatrix())
            .map(|c| c.l())
            .filter(|l| l.iter().all(|v| v.is_finite()))
            .ok_or(MathError::NotPositiveDefinite { dimension })?;
        Ok(Self { lower })
    }

    /// Dimension of the factored matrix
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// The lower-triangular factor
    pub fn lower(&self) -> &DMatrix<f64> {
        &self.lower
    }

    /// Solve `L z = b`
    pub fn solve_lower(&self, b: &[f64]) -> Result<Vec<f64>> {
        self.check_len(b.len())?;
        self.lower
            .solve_lower_triangular(&DVector::from_column_slice(b))
            .map(|z| z.as_slice().to_vec())
            .ok_or_else(|| MathError::CalculationError("Singular triangular factor".to_string()))
    }

    /// Solve `Lᵀ x = z`
    pub fn solve_upper(&self, z: &[f64]) -> Result<Vec<f64>> {
        self.check_len(z.len())?;
        self.lower
            .tr_solve_lower_triangular(&DVector::from_column_slice(z))
            .map(|x| x.as_slice().to_vec())
            .ok_or_else(|| MathError::CalculationError("Singular triangular factor".to_string()))
    }

    /// Solve `A x = b`
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        let z = self.solve_lower(b)?;
        self.solve_upper(&z)
    }

    /// Quadratic form `vᵀ A⁻¹ v`
    pub fn inverse_quadratic_form(&self, v: &[f64]) -> Result<f64> {
        let z = self.solve_lower(v)?;
        Ok(dot(&z, &z))
    }

    /// Whether every entry of the factor is finite and the diagonal is positive
    pub fn is_valid(&self) -> bool {
        self.lower.is_square()
            && self.lower.iter().all(|v| v.is_finite())
            && self.lower.diagonal().iter().all(|d| *d > 0.0)
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.dim() {
            return Err(MathError::InvalidInput(format!(
                "Vector length {} does not match factor dimension {}",
                len,
                self.dim()
            )));
        }
        Ok(())
    }
}

/// Solve the ridge system `(XᵀX + diag(penalty)) β = Xᵀ y`
pub fn ridge_solve(x: &Matrix, y: &[f64], penalty: &[f64]) -> Result<Vec<f64>> {
    if x.rows() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but target has {} values",
            x.rows(),
            y.len()
        )));
    }
    if x.cols() == 0 {
        return Ok(Vec::new());
    }
    let mut normal = x.gram();
    normal.add_diagonal(penalty)?;
    let rhs = x.transpose_mul_vec(y)?;
    Cholesky::factor(&normal)?.solve(&rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cholesky_solves_spd_system() {
        let a = Matrix::from_rows(&[
            vec![4.0, 12.0, -16.0],
            vec![12.0, 37.0, -43.0],
            vec![-16.0, -43.0, 98.0],
        ])
        .unwrap();
        let chol = Cholesky::factor(&a).unwrap();

        // Known factor of this textbook matrix
        assert_relative_eq!(chol.lower()[(0, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(chol.lower()[(1, 0)], 6.0, epsilon = 1e-12);
        assert_relative_eq!(chol.lower()[(2, 2)], 3.0, epsilon = 1e-12);

        let x = chol.solve(&[1.0, 2.0, 3.0]).unwrap();
        let back = a.mul_vec(&x).unwrap();
        for (b, expected) in back.iter().zip([1.0, 2.0, 3.0]) {
            assert_relative_eq!(*b, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 1.0]]).unwrap();
        assert!(matches!(
            Cholesky::factor(&a),
            Err(MathError::NotPositiveDefinite { dimension: 2 })
        ));
    }

    #[test]
    fn test_inverse_quadratic_form() {
        let mut a = Matrix::identity(2);
        a[(0, 0)] = 4.0;
        let chol = Cholesky::factor(&a).unwrap();
        // [2, 1] diag(1/4, 1) [2, 1]ᵀ = 1 + 1
        assert_relative_eq!(
            chol.inverse_quadratic_form(&[2.0, 1.0]).unwrap(),
            2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_gram_matches_explicit_product() {
        let x = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let g = x.gram();
        assert_eq!(g[(0, 0)], 35.0);
        assert_eq!(g[(0, 1)], 44.0);
        assert_eq!(g[(1, 0)], 44.0);
        assert_eq!(g[(1, 1)], 56.0);
    }

    #[test]
    fn test_leading_block() {
        let a = Matrix::from_rows(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        let block = a.leading_block(2).unwrap();
        assert_eq!(block.row(0), &[1.0, 2.0]);
        assert_eq!(block.row(1), &[4.0, 5.0]);
        assert!(a.leading_block(4).is_err());
    }

    #[test]
    fn test_dmatrix_round_trip_keeps_layout() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let dense = a.to_dmatrix();
        assert_eq!(dense[(0, 2)], 3.0);
        assert_eq!(dense[(1, 0)], 4.0);
        assert_eq!(Matrix::from_dmatrix(&dense), a);
    }

    #[test]
    fn test_ridge_recovers_line() {
        // y = 2 + 3x, tiny penalty
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| 2.0 + 3.0 * i as f64).collect();
        let x = Matrix::from_rows(&rows).unwrap();
        let beta = ridge_solve(&x, &y, &[1e-9, 1e-9]).unwrap();
        assert_relative_eq!(beta[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(beta[1], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_shape_errors() {
        assert!(Matrix::from_vec(2, 2, vec![1.0]).is_err());
        assert!(Matrix::from_rows(&[vec![1.0, 2.0], vec![1.0]]).is_err());
        let x = Matrix::identity(2);
        assert!(x.mul_vec(&[1.0]).is_err());
        assert!(ridge_solve(&x, &[1.0], &[0.0, 0.0]).is_err());
    }
}
