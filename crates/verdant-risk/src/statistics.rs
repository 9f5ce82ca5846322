//! Mean excess return and covariance from a price panel.
//!
//! Prices are forward-filled per asset, turned into simple daily returns and
//! restricted to dates where every asset has a return. The daily risk-free
//! rate, forward-filled and zero before its first quote, is subtracted from
//! each row before the sample mean and sample covariance are taken.

use crate::covariance::{
    ConditioningConfig, CovarianceEstimator, CovarianceMatrix, SampleCovarianceEstimator,
};
use crate::error::RiskError;
use chrono::NaiveDate;
use ndarray::{Array1, Array2, Axis};
use verdant_data::{PricePanel, RiskFreeSeries};

/// Statistics consumed by the Sharpe optimizers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcessReturnStats {
    /// Asset ordering shared by `mean` and `covariance`.
    pub assets: Vec<String>,

    /// Dates of the complete excess-return rows used.
    pub dates: Vec<NaiveDate>,

    /// Sample mean daily excess return per asset.
    pub mean: Array1<f64>,

    /// Conditioned sample covariance of daily excess returns.
    pub covariance: CovarianceMatrix,
}

impl ExcessReturnStats {
    /// Assemble statistics estimated elsewhere.
    pub fn from_parts(mean: Array1<f64>, covariance: CovarianceMatrix) -> Result<Self, RiskError> {
        if mean.len() != covariance.len() {
            return Err(RiskError::DimensionMismatch {
                expected: covariance.len(),
                actual: mean.len(),
            });
        }
        Ok(Self {
            assets: covariance.assets().to_vec(),
            dates: Vec::new(),
            mean,
            covariance,
        })
    }

    /// Number of return observations behind the estimate.
    pub fn observations(&self) -> usize {
        self.dates.len()
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the universe is empty.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Derives [`ExcessReturnStats`] from prices and a risk-free series.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsEngine {
    conditioning: ConditioningConfig,
}

impl StatisticsEngine {
    /// Create an engine with custom covariance conditioning.
    pub const fn new(conditioning: ConditioningConfig) -> Self {
        Self { conditioning }
    }

    /// Compute mean excess returns and their covariance.
    ///
    /// # Errors
    /// [`RiskError::InsufficientData`] when fewer than two complete return
    /// rows remain.
    pub fn compute(
        &self,
        panel: &PricePanel,
        risk_free: &RiskFreeSeries,
    ) -> Result<ExcessReturnStats, RiskError> {
        let prices = panel.forward_filled();
        let n_assets = panel.assets().len();
        if n_assets == 0 {
            return Err(RiskError::InsufficientData {
                required: 2,
                actual: 0,
            });
        }

        let mut dates = Vec::new();
        let mut rows: Vec<f64> = Vec::new();
        for t in 1..prices.nrows() {
            let previous = prices.row(t - 1);
            let current = prices.row(t);
            let returns: Vec<f64> = previous
                .iter()
                .zip(current.iter())
                .map(|(p, c)| c / p - 1.0)
                .collect();
            if returns.iter().all(|r| r.is_finite()) {
                dates.push(panel.dates()[t]);
                rows.extend(returns);
            }
        }

        if dates.len() < 2 {
            return Err(RiskError::InsufficientData {
                required: 2,
                actual: dates.len(),
            });
        }

        let mut excess = Array2::from_shape_vec((dates.len(), n_assets), rows).map_err(|e| {
            RiskError::InvalidParameter(format!("failed to shape return panel: {e}"))
        })?;
        for (mut row, rf) in excess.rows_mut().into_iter().zip(risk_free.align(&dates)) {
            row.mapv_inplace(|r| r - rf);
        }

        let mean = excess
            .mean_axis(Axis(0))
            .ok_or(RiskError::InsufficientData {
                required: 2,
                actual: 0,
            })?;
        let raw = SampleCovarianceEstimator::default().estimate(&excess)?;
        let covariance =
            CovarianceMatrix::from_raw(panel.assets().to_vec(), &raw, &self.conditioning)?;

        tracing::debug!(
            assets = n_assets,
            observations = dates.len(),
            "estimated excess-return statistics"
        );

        Ok(ExcessReturnStats {
            assets: panel.assets().to_vec(),
            dates,
            mean,
            covariance,
        })
    }
}
