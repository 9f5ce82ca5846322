//! Matrix conditioning helpers
//!
//! Symmetrization, diagonal flooring and eigenvalue clipping used to turn a
//! raw covariance estimate into one an optimizer can rely on. Eigenvalues
//! come from a cyclic Jacobi sweep, which is exact enough for the small,
//! dense matrices of a portfolio universe.

use crate::error::RiskError;
use ndarray::{Array1, Array2};

/// Result of eigenvalue decomposition
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// Eigenvalues (sorted in descending order)
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors (columns are eigenvectors)
    pub eigenvectors: Array2<f64>,
}

impl EigenDecomposition {
    /// Rebuild `V * diag(values) * V^T`.
    pub fn reconstruct(&self, values: &Array1<f64>) -> Array2<f64> {
        let scaled = &self.eigenvectors * &values.view().insert_axis(ndarray::Axis(0));
        scaled.dot(&self.eigenvectors.t())
    }
}

fn require_square(matrix: &Array2<f64>) -> Result<usize, RiskError> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(RiskError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }
    Ok(n)
}

/// `(M + M^T) / 2`
pub fn symmetrize(matrix: &Array2<f64>) -> Result<Array2<f64>, RiskError> {
    require_square(matrix)?;
    Ok((matrix + &matrix.t()) / 2.0)
}

/// Raise every diagonal element to at least `floor`.
pub fn floor_diagonal(matrix: &mut Array2<f64>, floor: f64) {
    for value in matrix.diag_mut().iter_mut() {
        if !(*value >= floor) {
            *value = floor;
        }
    }
}

/// Eigen-decompose a symmetric matrix with cyclic Jacobi rotations.
///
/// Sweeps over every off-diagonal pair until the off-diagonal Frobenius norm
/// falls below `tolerance` or `max_sweeps` is reached.
pub fn jacobi_eigendecomp(
    matrix: &Array2<f64>,
    max_sweeps: usize,
    tolerance: f64,
) -> Result<EigenDecomposition, RiskError> {
    let n = require_square(matrix)?;
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..max_sweeps {
        let off_norm: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]] * a[[i, j]])
            .sum::<f64>()
            .sqrt();
        if off_norm < tolerance {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let (c, s) = rotation(a[[p, p]], a[[q, q]], a[[p, q]]);
                rotate(&mut a, &mut v, p, q, c, s);
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

    let eigenvalues = order.iter().map(|&i| a[[i, i]]).collect();
    let mut eigenvectors = Array2::<f64>::zeros((n, n));
    for (col, &src) in order.iter().enumerate() {
        eigenvectors.column_mut(col).assign(&v.column(src));
    }

    Ok(EigenDecomposition {
        eigenvalues,
        eigenvectors,
    })
}

/// (cos, sin) of the rotation annihilating `a_pq`.
fn rotation(app: f64, aqq: f64, apq: f64) -> (f64, f64) {
    let theta = (aqq - app) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    (c, t * c)
}

fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize, c: f64, s: f64) {
    let n = a.nrows();

    for k in 0..n {
        let akp = a[[k, p]];
        let akq = a[[k, q]];
        a[[k, p]] = c * akp - s * akq;
        a[[k, q]] = s * akp + c * akq;
    }
    for k in 0..n {
        let apk = a[[p, k]];
        let aqk = a[[q, k]];
        a[[p, k]] = c * apk - s * aqk;
        a[[q, k]] = s * apk + c * aqk;
    }
    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = c * vkp - s * vkq;
        v[[k, q]] = s * vkp + c * vkq;
    }
}

/// Clip eigenvalues below zero and rebuild the matrix.
///
/// A matrix whose eigenvalues are all at least `-tolerance` is returned
/// unchanged, so well-formed inputs keep their exact values.
pub fn clip_negative_eigenvalues(
    matrix: &Array2<f64>,
    tolerance: f64,
) -> Result<Array2<f64>, RiskError> {
    let decomp = jacobi_eigendecomp(matrix, 100, 1e-15)?;
    if decomp.eigenvalues.iter().all(|&v| v >= -tolerance) {
        return Ok(matrix.clone());
    }

    let clipped = decomp.eigenvalues.mapv(|v| v.max(0.0));
    let rebuilt = decomp.reconstruct(&clipped);
    symmetrize(&rebuilt)
}

/// Whether every eigenvalue is at least `-tolerance`.
pub fn is_positive_semidefinite(matrix: &Array2<f64>, tolerance: f64) -> bool {
    match jacobi_eigendecomp(matrix, 100, 1e-15) {
        Ok(decomp) => decomp.eigenvalues.iter().all(|&v| v >= -tolerance),
        Err(_) => false,
    }
}

/// Ratio of the largest to the smallest eigenvalue (infinity when singular).
pub fn condition_number(matrix: &Array2<f64>) -> f64 {
    match jacobi_eigendecomp(matrix, 100, 1e-15) {
        Ok(decomp) if !decomp.eigenvalues.is_empty() => {
            let max = decomp.eigenvalues[0];
            let min = decomp.eigenvalues[decomp.eigenvalues.len() - 1];
            if min.abs() < 1e-15 {
                f64::INFINITY
            } else {
                max / min
            }
        }
        _ => f64::INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_eigendecomp_diagonal_sorted() {
        let matrix = array![[1.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 2.0]];
        let decomp = jacobi_eigendecomp(&matrix, 100, 1e-15).unwrap();
        assert_eq!(decomp.eigenvalues.to_vec(), vec![4.0, 2.0, 1.0]);
    }

    #[test]
    fn test_eigendecomp_reconstructs_input() {
        let matrix = array![[2.0, 1.0, 1.0], [1.0, 2.0, 1.0], [1.0, 1.0, 2.0]];
        let decomp = jacobi_eigendecomp(&matrix, 100, 1e-15).unwrap();

        assert_abs_diff_eq!(decomp.eigenvalues[0], 4.0, epsilon = 1e-10);
        assert_abs_diff_eq!(decomp.eigenvalues[2], 1.0, epsilon = 1e-10);

        let rebuilt = decomp.reconstruct(&decomp.eigenvalues);
        for (a, b) in matrix.iter().zip(rebuilt.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_clip_makes_matrix_psd() {
        // eigenvalues 3 and -1
        let matrix = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(!is_positive_semidefinite(&matrix, 1e-12));

        let clipped = clip_negative_eigenvalues(&matrix, 1e-12).unwrap();
        assert!(is_positive_semidefinite(&clipped, 1e-12));
        assert_abs_diff_eq!(clipped[[0, 1]], clipped[[1, 0]], epsilon = 1e-15);
        assert_abs_diff_eq!(clipped[[0, 0]], 1.5, epsilon = 1e-10);
    }

    #[test]
    fn test_clip_leaves_psd_input_untouched() {
        let matrix = array![[0.0004, 0.0], [0.0, 0.0009]];
        assert_eq!(clip_negative_eigenvalues(&matrix, 1e-12).unwrap(), matrix);
    }

    #[test]
    fn test_symmetrize_and_floor() {
        let matrix = array![[0.0, 2.0], [4.0, f64::NAN]];
        let mut sym = symmetrize(&matrix).unwrap();
        assert_eq!(sym[[0, 1]], 3.0);
        floor_diagonal(&mut sym, 1e-6);
        assert_eq!(sym[[0, 0]], 1e-6);
        assert_eq!(sym[[1, 1]], 1e-6);
    }

    #[test]
    fn test_symmetrize_rejects_non_square() {
        let matrix = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            symmetrize(&matrix),
            Err(RiskError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_condition_number() {
        assert_abs_diff_eq!(condition_number(&Array2::eye(3)), 1.0, epsilon = 1e-12);
        let singular = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(condition_number(&singular).is_infinite());
    }
}
