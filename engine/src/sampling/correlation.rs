//! Correlation matrices and the Gaussian copula
//!
//! # Key Principles
//!
//! 1. **Semi-definite aware**: singular but valid matrices (perfect
//!    correlation) factor through their eigen decomposition instead of
//!    being rejected
//! 2. **Rank coefficients by default**: Spearman coefficients are mapped to
//!    the copula's Gaussian correlation before factoring
//! 3. **Declared matrix decides validity**: only the matrix the model
//!    declares is tested for positive semi-definiteness. A converted
//!    Gaussian matrix that loses it is repaired, not rejected.

use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Eigenvalue tolerance for positive semi-definiteness
pub const PSD_TOLERANCE: f64 = 1e-9;

/// Tolerance for unit diagonal and symmetry checks
const MATRIX_TOLERANCE: f64 = 1e-9;

/// Meaning of the coefficients in a correlation group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationKind {
    /// Rank correlation between the sampled marginals
    #[default]
    Spearman,
    /// Correlation of the underlying Gaussian variates
    Pearson,
}

impl CorrelationKind {
    /// Gaussian copula correlation producing this coefficient
    pub fn to_gaussian(self, coefficient: f64) -> f64 {
        match self {
            CorrelationKind::Spearman => 2.0 * (PI * coefficient / 6.0).sin(),
            CorrelationKind::Pearson => coefficient,
        }
    }
}

/// Structural checks: square `size`×`size`, unit diagonal, entries in
/// [-1, 1], symmetric
pub fn check_correlation_matrix(matrix: &[Vec<f64>], size: usize) -> Result<(), String> {
    if matrix.len() != size {
        return Err(format!("expected {} rows, found {}", size, matrix.len()));
    }
    for (i, row) in matrix.iter().enumerate() {
        if row.len() != size {
            return Err(format!("row {} has {} entries, expected {}", i, row.len(), size));
        }
        for (j, value) in row.iter().enumerate() {
            if !value.is_finite() || value.abs() > 1.0 + MATRIX_TOLERANCE {
                return Err(format!("entry [{}][{}] = {} outside [-1, 1]", i, j, value));
            }
        }
        if (row[i] - 1.0).abs() > MATRIX_TOLERANCE {
            return Err(format!("diagonal entry [{}][{}] = {} is not 1", i, i, row[i]));
        }
    }
    for i in 0..size {
        for j in (i + 1)..size {
            if (matrix[i][j] - matrix[j][i]).abs() > MATRIX_TOLERANCE {
                return Err(format!(
                    "not symmetric at [{}][{}]: {} vs {}",
                    i, j, matrix[i][j], matrix[j][i]
                ));
            }
        }
    }
    Ok(())
}

/// Square matrix from validated rows
pub fn to_matrix(rows: &[Vec<f64>]) -> na::DMatrix<f64> {
    let n = rows.len();
    na::DMatrix::from_fn(n, n, |i, j| rows[i][j])
}

/// Map every off-diagonal coefficient to its Gaussian counterpart
pub fn to_gaussian_matrix(matrix: &na::DMatrix<f64>, kind: CorrelationKind) -> na::DMatrix<f64> {
    na::DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| {
        if i == j {
            1.0
        } else {
            kind.to_gaussian(matrix[(i, j)])
        }
    })
}

/// Smallest eigenvalue of a symmetric matrix
pub fn min_eigenvalue(matrix: &na::DMatrix<f64>) -> f64 {
    matrix.clone().symmetric_eigen().eigenvalues.min()
}

/// Smallest eigenvalue is no lower than `-PSD_TOLERANCE`
pub fn is_positive_semi_definite(matrix: &na::DMatrix<f64>) -> bool {
    matrix.nrows() == 0 || min_eigenvalue(matrix) >= -PSD_TOLERANCE
}

/// Closest correlation matrix by eigenvalue clipping
///
/// Negative eigenvalues are raised to zero and the rebuilt matrix is
/// rescaled back to a unit diagonal. Clipping only raises the spectrum, so
/// every rebuilt diagonal entry is at least 1.
pub fn repair(matrix: &na::DMatrix<f64>) -> na::DMatrix<f64> {
    let eigen = matrix.clone().symmetric_eigen();
    let clipped = eigen.eigenvalues.map(|lambda| lambda.max(0.0));
    let rebuilt =
        &eigen.eigenvectors * na::DMatrix::from_diagonal(&clipped) * eigen.eigenvectors.transpose();
    let scale = rebuilt.diagonal().map(|d| d.sqrt().recip());

    na::DMatrix::from_fn(rebuilt.nrows(), rebuilt.ncols(), |i, j| {
        if i == j {
            1.0
        } else {
            rebuilt[(i, j)] * scale[i] * scale[j]
        }
    })
}

/// L with L·Lᵀ = matrix
///
/// Positive-definite matrices get their Cholesky factor. Singular but valid
/// matrices (perfect correlation) fall back to the eigen square root
/// Q·diag(√λ). Returns `None` when the matrix is not positive semi-definite.
pub fn factor(matrix: &na::DMatrix<f64>) -> Option<na::DMatrix<f64>> {
    if let Some(cholesky) = na::Cholesky::new(matrix.clone()) {
        return Some(cholesky.l());
    }

    let eigen = matrix.clone().symmetric_eigen();
    if eigen.eigenvalues.min() < -PSD_TOLERANCE {
        return None;
    }
    let roots = eigen.eigenvalues.map(|lambda| lambda.max(0.0).sqrt());
    Some(eigen.eigenvectors * na::DMatrix::from_diagonal(&roots))
}

/// L·z
pub fn correlate(factor: &na::DMatrix<f64>, independent: na::DVector<f64>) -> na::DVector<f64> {
    factor * independent
}

fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        // Ties share their average rank
        let rank = (start + end) as f64 / 2.0;
        for &position in &order[start..=end] {
            ranks[position] = rank;
        }
        start = end + 1;
    }
    ranks
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    cov / (var_x * var_y).sqrt()
}

/// Spearman rank correlation of two equally long samples
pub fn spearman_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    pearson(&ranks(xs), &ranks(ys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn matrix(rows: &[&[f64]]) -> na::DMatrix<f64> {
        to_matrix(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>())
    }

    fn assert_reconstructs(factor: &na::DMatrix<f64>, expected: &na::DMatrix<f64>, tolerance: f64) {
        let rebuilt = factor * factor.transpose();
        assert!(
            (rebuilt - expected).abs().max() < tolerance,
            "L·Lᵀ does not match {}",
            expected
        );
    }

    #[test]
    fn test_factor_two_by_two() {
        let factor = factor(&matrix(&[&[1.0, -0.4], &[-0.4, 1.0]])).unwrap();
        assert!((factor[(0, 0)] - 1.0).abs() < 1e-15);
        assert_eq!(factor[(0, 1)], 0.0);
        assert!((factor[(1, 0)] + 0.4).abs() < 1e-15);
        assert!((factor[(1, 1)] - (1.0f64 - 0.16).sqrt()).abs() < 1e-15);
    }

    #[test]
    fn test_factor_accepts_perfect_correlation() {
        let perfect = matrix(&[&[1.0, 1.0], &[1.0, 1.0]]);
        let factor = factor(&perfect).unwrap();
        assert_reconstructs(&factor, &perfect, 1e-12);

        let z = correlate(&factor, na::DVector::from_vec(vec![0.3, -1.2]));
        assert!((z[0] - z[1]).abs() < 1e-12);
    }

    #[test]
    fn test_factor_rejects_indefinite_matrix() {
        let indefinite = matrix(&[&[1.0, 0.9, -0.9], &[0.9, 1.0, 0.9], &[-0.9, 0.9, 1.0]]);
        assert!(!is_positive_semi_definite(&indefinite));
        assert!(factor(&indefinite).is_none());
    }

    #[test]
    fn test_spearman_conversion_can_lose_definiteness() {
        let declared = matrix(&[&[1.0, 0.9, 0.9], &[0.9, 1.0, 0.625], &[0.9, 0.625, 1.0]]);
        assert!(is_positive_semi_definite(&declared));

        let gaussian = to_gaussian_matrix(&declared, CorrelationKind::Spearman);
        assert!(min_eigenvalue(&gaussian) < -PSD_TOLERANCE);

        let repaired = repair(&gaussian);
        assert!(is_positive_semi_definite(&repaired));
        for i in 0..3 {
            assert_eq!(repaired[(i, i)], 1.0);
            for j in 0..3 {
                assert!((repaired[(i, j)] - repaired[(j, i)]).abs() < 1e-12);
                assert!((repaired[(i, j)] - gaussian[(i, j)]).abs() < 0.05);
            }
        }
        assert!(factor(&repaired).is_some());
    }

    #[test]
    fn test_repair_keeps_valid_matrix() {
        let valid = matrix(&[&[1.0, 0.3], &[0.3, 1.0]]);
        assert!((repair(&valid) - &valid).abs().max() < 1e-12);
    }

    #[test]
    fn test_check_matrix_structure() {
        assert!(check_correlation_matrix(&[vec![1.0, 0.2], vec![0.2, 1.0]], 2).is_ok());
        assert!(check_correlation_matrix(&[vec![1.0, 0.2], vec![0.3, 1.0]], 2)
            .unwrap_err()
            .contains("symmetric"));
        assert!(check_correlation_matrix(&[vec![0.5, 0.2], vec![0.2, 1.0]], 2)
            .unwrap_err()
            .contains("diagonal"));
        assert!(check_correlation_matrix(&[vec![1.0, 1.5], vec![1.5, 1.0]], 2).is_err());
        assert!(check_correlation_matrix(&[vec![1.0]], 2).is_err());
    }

    #[test]
    fn test_spearman_to_gaussian() {
        let kind = CorrelationKind::Spearman;
        assert_eq!(kind.to_gaussian(0.0), 0.0);
        assert!((kind.to_gaussian(1.0) - 1.0).abs() < 1e-15);
        assert!((kind.to_gaussian(-0.4) + 0.4158).abs() < 1e-4);
        assert_eq!(CorrelationKind::Pearson.to_gaussian(-0.4), -0.4);
    }

    #[test]
    fn test_spearman_correlation_handles_ties() {
        let xs = [1.0, 2.0, 2.0, 3.0];
        let ys = [10.0, 20.0, 20.0, 30.0];
        assert!((spearman_correlation(&xs, &ys) - 1.0).abs() < 1e-12);

        let reversed = [4.0, 3.0, 2.0, 1.0];
        assert!((spearman_correlation(&[1.0, 2.0, 3.0, 4.0], &reversed) + 1.0).abs() < 1e-12);
    }

    fn lower_triangular() -> impl Strategy<Value = na::DMatrix<f64>> {
        (
            prop::collection::vec(0.5f64..2.0, 3),
            prop::collection::vec(-1.0f64..1.0, 3),
        )
            .prop_map(|(diagonal, off)| {
                na::DMatrix::from_row_slice(
                    3,
                    3,
                    &[
                        diagonal[0], 0.0, 0.0,
                        off[0], diagonal[1], 0.0,
                        off[1], off[2], diagonal[2],
                    ],
                )
            })
    }

    proptest! {
        #[test]
        fn prop_factor_reconstructs_positive_definite(lower in lower_triangular()) {
            let matrix = &lower * lower.transpose();
            let factor = factor(&matrix).unwrap();
            let rebuilt = &factor * factor.transpose();
            prop_assert!((rebuilt - &matrix).abs().max() < 1e-9);
        }
    }
}
