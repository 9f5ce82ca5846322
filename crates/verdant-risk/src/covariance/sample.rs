//! Pairwise-complete sample covariance.
//!
//! Each pair (i, j) uses only the rows where both assets are observed, centers
//! on the means of those rows, and divides by `n - 1`. Pairs with fewer than
//! `min_periods` overlapping rows (and never fewer than two) are NaN.

use super::CovarianceEstimator;
use crate::error::RiskError;
use ndarray::Array2;

/// Sample covariance estimator with a minimum-overlap threshold.
#[derive(Debug, Clone, Copy)]
pub struct SampleCovarianceEstimator {
    min_periods: usize,
}

impl Default for SampleCovarianceEstimator {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SampleCovarianceEstimator {
    /// Create an estimator requiring `min_periods` overlapping observations
    /// per pair.
    pub const fn new(min_periods: usize) -> Self {
        Self { min_periods }
    }

    /// Effective overlap threshold.
    pub fn min_periods(&self) -> usize {
        self.min_periods.max(2)
    }

    fn pair_covariance(&self, returns: &Array2<f64>, i: usize, j: usize) -> f64 {
        let pairs: Vec<(f64, f64)> = returns
            .column(i)
            .iter()
            .zip(returns.column(j).iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(&x, &y)| (x, y))
            .collect();

        let n = pairs.len();
        if n < self.min_periods() {
            return f64::NAN;
        }

        let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
        let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
        pairs
            .iter()
            .map(|(x, y)| (x - mean_x) * (y - mean_y))
            .sum::<f64>()
            / (n - 1) as f64
    }
}

impl CovarianceEstimator for SampleCovarianceEstimator {
    fn estimate(&self, returns: &Array2<f64>) -> Result<Array2<f64>, RiskError> {
        let n_assets = returns.ncols();
        let mut cov = Array2::<f64>::zeros((n_assets, n_assets));

        for i in 0..n_assets {
            for j in i..n_assets {
                let value = self.pair_covariance(returns, i, j);
                cov[[i, j]] = value;
                cov[[j, i]] = value;
            }
        }

        Ok(cov)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_matches_textbook_sample_covariance() {
        let returns = array![[1.0, 2.0], [2.0, 4.0], [3.0, 7.0]];
        let cov = SampleCovarianceEstimator::default().estimate(&returns).unwrap();

        assert_abs_diff_eq!(cov[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[0, 1]], 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 1]], 6.333_333_333_333, epsilon = 1e-9);
        assert_eq!(cov[[0, 1]], cov[[1, 0]]);
    }

    #[test]
    fn test_pairwise_exclusion_and_min_periods() {
        let returns = array![
            [0.01, f64::NAN],
            [0.02, f64::NAN],
            [0.03, 0.01],
            [0.01, 0.02],
        ];

        let lenient = SampleCovarianceEstimator::new(2).estimate(&returns).unwrap();
        assert!(lenient[[0, 1]].is_finite());
        assert!(lenient[[1, 1]].is_finite());

        let strict = SampleCovarianceEstimator::new(3).estimate(&returns).unwrap();
        assert!(strict[[0, 0]].is_finite());
        assert!(strict[[0, 1]].is_nan());
        assert!(strict[[1, 1]].is_nan());
    }

    #[test]
    fn test_single_observation_is_nan() {
        let returns = array![[0.01, 0.02]];
        let cov = SampleCovarianceEstimator::new(1).estimate(&returns).unwrap();
        assert!(cov.iter().all(|v| v.is_nan()));
    }
}
