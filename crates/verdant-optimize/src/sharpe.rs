//! Annualized Sharpe ratio of daily excess-return statistics.

use crate::solver::Objective;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use verdant_data::TRADING_DAYS;
use verdant_risk::ExcessReturnStats;

/// `sqrt(252)`: daily to annual scaling.
fn annualization() -> f64 {
    TRADING_DAYS.sqrt()
}

/// Annualized Sharpe ratio `(wᵀμ) / sqrt(wᵀΣw) · sqrt(252)`.
///
/// Zero when the portfolio variance is zero (or numerically negative).
pub fn sharpe_ratio(weights: &Array1<f64>, mean: &Array1<f64>, covariance: &Array2<f64>) -> f64 {
    let variance = weights.dot(&covariance.dot(weights));
    if variance <= 0.0 {
        return 0.0;
    }
    weights.dot(mean) / variance.sqrt() * annualization()
}

/// Negative Sharpe ratio as a minimization objective.
#[derive(Debug, Clone, Copy)]
pub struct SharpeObjective<'a> {
    mean: &'a Array1<f64>,
    covariance: &'a Array2<f64>,
}

impl<'a> SharpeObjective<'a> {
    /// Objective over the given statistics.
    pub const fn new(mean: &'a Array1<f64>, covariance: &'a Array2<f64>) -> Self {
        Self { mean, covariance }
    }

    /// Objective over [`ExcessReturnStats`].
    pub fn from_stats(stats: &'a ExcessReturnStats) -> Self {
        Self::new(&stats.mean, stats.covariance.values())
    }

    /// Annualized Sharpe ratio of `weights`.
    pub fn sharpe(&self, weights: &Array1<f64>) -> f64 {
        sharpe_ratio(weights, self.mean, self.covariance)
    }
}

impl Objective for SharpeObjective<'_> {
    fn value(&self, x: &Array1<f64>) -> f64 {
        -self.sharpe(x)
    }

    // ∇S = k (μ/σ − r·Σw/σ³)
    fn gradient(&self, x: &Array1<f64>) -> Array1<f64> {
        let sigma_w = self.covariance.dot(x);
        let variance = x.dot(&sigma_w);
        if variance <= 0.0 {
            return Array1::zeros(x.len());
        }
        let sigma = variance.sqrt();
        let ret = x.dot(self.mean);
        let grad = self.mean / sigma - sigma_w * (ret / (sigma * variance));
        grad * -annualization()
    }
}

/// Stand-alone Sharpe ratio of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSharpe {
    /// Asset identifier.
    pub asset_id: String,

    /// Annualized Sharpe ratio, zero for a riskless asset.
    pub sharpe: f64,
}

/// Per-asset annualized Sharpe ratios in the statistics' asset order.
pub fn asset_sharpes(stats: &ExcessReturnStats) -> Vec<AssetSharpe> {
    let variances = stats.covariance.variances();
    stats
        .assets
        .iter()
        .zip(stats.mean.iter().zip(variances.iter()))
        .map(|(asset, (&mu, &var))| AssetSharpe {
            asset_id: asset.clone(),
            sharpe: if var <= 0.0 {
                0.0
            } else {
                mu / var.sqrt() * annualization()
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use verdant_risk::{ConditioningConfig, CovarianceMatrix};

    #[test]
    fn test_sharpe_value() {
        let mean = array![0.001, 0.002];
        let cov = array![[0.0004, 0.0], [0.0, 0.0009]];
        let w = array![0.5, 0.5];
        let expected = 0.0015 / 0.000325_f64.sqrt() * 252.0_f64.sqrt();
        assert_abs_diff_eq!(sharpe_ratio(&w, &mean, &cov), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_variance_is_zero_sharpe() {
        let mean = array![0.001, 0.002];
        let cov = Array2::zeros((2, 2));
        assert_eq!(sharpe_ratio(&array![0.5, 0.5], &mean, &cov), 0.0);

        let objective = SharpeObjective::new(&mean, &cov);
        assert!(objective.gradient(&array![0.5, 0.5]).iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mean = array![0.0008, 0.0012, 0.0005];
        let cov = array![
            [0.0004, 0.0001, 0.00005],
            [0.0001, 0.0009, 0.0002],
            [0.00005, 0.0002, 0.0003]
        ];
        let objective = SharpeObjective::new(&mean, &cov);
        let x = array![0.2, 0.5, 0.3];
        let grad = objective.gradient(&x);

        let h = 1e-7;
        for i in 0..3 {
            let mut up = x.clone();
            let mut down = x.clone();
            up[i] += h;
            down[i] -= h;
            let numeric = (objective.value(&up) - objective.value(&down)) / (2.0 * h);
            assert_abs_diff_eq!(grad[i], numeric, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_asset_sharpes() {
        let cov = CovarianceMatrix::from_raw(
            vec!["A".into(), "B".into()],
            &array![[0.0004, 0.0], [0.0, 0.0009]],
            &ConditioningConfig::default(),
        )
        .unwrap();
        let stats = ExcessReturnStats::from_parts(array![0.001, -0.003], cov).unwrap();

        let sharpes = asset_sharpes(&stats);
        assert_eq!(sharpes[0].asset_id, "A");
        assert_abs_diff_eq!(sharpes[0].sharpe, 0.05 * 252.0_f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(sharpes[1].sharpe, -0.1 * 252.0_f64.sqrt(), epsilon = 1e-12);
    }
}
