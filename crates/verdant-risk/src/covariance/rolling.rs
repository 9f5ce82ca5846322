//! Rolling (trailing-window) covariance over calendar time
//!
//! Long-format returns are pivoted into a dates x assets panel (missing cells
//! NaN). For every row index `t >= W - 1` the trailing `W` rows are reduced to
//! a pairwise-complete sample covariance with `min_periods = W / 2`. Earlier
//! dates produce nothing.

use super::{CovarianceEstimator, SampleCovarianceEstimator};
use crate::error::RiskError;
use chrono::NaiveDate;
use ndarray::{Array2, s};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use verdant_data::{CovarianceEntry, ReturnRecord};

/// Rolling covariance configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingCovarianceConfig {
    /// Trailing window length in trading days (default: 20)
    pub window: usize,
}

impl Default for RollingCovarianceConfig {
    fn default() -> Self {
        Self { window: 20 }
    }
}

impl RollingCovarianceConfig {
    /// Minimum overlapping observations for a pair to be estimated.
    pub const fn min_periods(&self) -> usize {
        self.window / 2
    }
}

/// Raw covariance estimate for one window-end date.
///
/// Cells are NaN where the pair lacked `min_periods` overlapping returns.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedCovariance {
    /// Window-end date.
    pub date: NaiveDate,

    /// Row and column labels.
    pub assets: Vec<String>,

    /// Sample covariance values.
    pub values: Array2<f64>,
}

impl DatedCovariance {
    /// Flatten into long-form entries, row-major.
    pub fn to_entries(&self) -> Vec<CovarianceEntry> {
        let mut entries = Vec::with_capacity(self.assets.len() * self.assets.len());
        for (i, asset_i) in self.assets.iter().enumerate() {
            for (j, asset_j) in self.assets.iter().enumerate() {
                entries.push(CovarianceEntry {
                    date: self.date,
                    asset_i: asset_i.clone(),
                    asset_j: asset_j.clone(),
                    cov: self.values[[i, j]],
                });
            }
        }
        entries
    }
}

/// Builds one covariance matrix per date with a full trailing window.
#[derive(Debug)]
pub struct RollingCovarianceBuilder {
    config: RollingCovarianceConfig,
    estimator: SampleCovarianceEstimator,
}

impl RollingCovarianceBuilder {
    /// Create a builder; the window must span at least two days.
    pub fn new(config: RollingCovarianceConfig) -> Result<Self, RiskError> {
        if config.window < 2 {
            return Err(RiskError::InvalidParameter(format!(
                "covariance window must be at least 2, got {}",
                config.window
            )));
        }
        Ok(Self {
            config,
            estimator: SampleCovarianceEstimator::new(config.min_periods()),
        })
    }

    /// Create with default configuration.
    ///
    /// # Errors
    /// Returns an error if the default configuration is invalid (should not happen).
    pub fn try_default() -> Result<Self, RiskError> {
        Self::new(RollingCovarianceConfig::default())
    }

    /// Builder configuration.
    pub const fn config(&self) -> &RollingCovarianceConfig {
        &self.config
    }

    /// Estimate the covariance for every eligible date, in date order.
    pub fn build(&self, returns: &[ReturnRecord]) -> Result<Vec<DatedCovariance>, RiskError> {
        let (dates, assets, panel) = pivot(returns)?;
        let window = self.config.window;
        if dates.len() < window {
            tracing::debug!(
                dates = dates.len(),
                window,
                "not enough dates for a full covariance window"
            );
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(dates.len() + 1 - window);
        for end in (window - 1)..dates.len() {
            let slice = panel.slice(s![end + 1 - window..=end, ..]).to_owned();
            out.push(DatedCovariance {
                date: dates[end],
                assets: assets.clone(),
                values: self.estimator.estimate(&slice)?,
            });
        }

        tracing::debug!(matrices = out.len(), window, "built rolling covariances");
        Ok(out)
    }

    /// Same as [`build`](Self::build), flattened into long form.
    pub fn build_entries(&self, returns: &[ReturnRecord]) -> Result<Vec<CovarianceEntry>, RiskError> {
        Ok(self
            .build(returns)?
            .iter()
            .flat_map(DatedCovariance::to_entries)
            .collect())
    }
}

/// Pivot long returns into (dates, assets, dates x assets panel).
fn pivot(returns: &[ReturnRecord]) -> Result<(Vec<NaiveDate>, Vec<String>, Array2<f64>), RiskError> {
    let dates: Vec<NaiveDate> = returns
        .iter()
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let assets: Vec<String> = returns
        .iter()
        .map(|r| r.asset_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let row_of: BTreeMap<NaiveDate, usize> = dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();
    let col_of: BTreeMap<&str, usize> = assets
        .iter()
        .enumerate()
        .map(|(i, a)| (a.as_str(), i))
        .collect();

    let mut panel = Array2::from_elem((dates.len(), assets.len()), f64::NAN);
    let mut seen = BTreeSet::new();
    for r in returns {
        if !seen.insert((r.date, r.asset_id.as_str())) {
            return Err(RiskError::InvalidParameter(format!(
                "duplicate return for {} on {}",
                r.asset_id, r.date
            )));
        }
        panel[[row_of[&r.date], col_of[r.asset_id.as_str()]]] = r.return_1d;
    }

    Ok((dates, assets, panel))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample_returns() -> Vec<ReturnRecord> {
        let a = [0.01, -0.02, 0.015, 0.003, -0.007, 0.012];
        let b = [0.002, 0.01, -0.004, 0.006, 0.001, -0.009];
        let mut out = Vec::new();
        for (t, (ra, rb)) in a.iter().zip(b.iter()).enumerate() {
            out.push(ReturnRecord::new("A", day(t as u32 + 1), *ra));
            out.push(ReturnRecord::new("B", day(t as u32 + 1), *rb));
        }
        out
    }

    #[test]
    fn test_invalid_window() {
        let result = RollingCovarianceBuilder::new(RollingCovarianceConfig { window: 1 });
        assert!(result.is_err());
    }

    #[test]
    fn test_one_matrix_per_eligible_date() {
        let builder = RollingCovarianceBuilder::new(RollingCovarianceConfig { window: 4 }).unwrap();
        let matrices = builder.build(&sample_returns()).unwrap();

        assert_eq!(matrices.len(), 3);
        assert_eq!(matrices[0].date, day(4));
        assert_eq!(matrices[2].date, day(6));
        for m in &matrices {
            assert_eq!(m.values[[0, 1]], m.values[[1, 0]]);
            assert!(m.values[[0, 0]] > 0.0 && m.values[[1, 1]] > 0.0);
        }
    }

    #[test]
    fn test_short_history_emits_nothing() {
        let builder = RollingCovarianceBuilder::try_default().unwrap();
        assert!(builder.build(&sample_returns()).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_records_rejected() {
        let mut returns = sample_returns();
        returns.push(ReturnRecord::new("A", day(1), 0.0));
        let builder = RollingCovarianceBuilder::new(RollingCovarianceConfig { window: 2 }).unwrap();
        assert!(builder.build(&returns).is_err());
    }

    #[test]
    fn test_sparse_pairs_left_nan() {
        let mut returns = sample_returns();
        // C only trades on the last day of the window
        returns.push(ReturnRecord::new("C", day(6), 0.02));
        let builder = RollingCovarianceBuilder::new(RollingCovarianceConfig { window: 4 }).unwrap();
        let matrices = builder.build(&returns).unwrap();

        let last = matrices.last().unwrap();
        assert_eq!(last.assets, vec!["A", "B", "C"]);
        assert!(last.values[[2, 2]].is_nan());
        assert!(last.values[[0, 2]].is_nan());
        assert!(last.values[[0, 0]].is_finite());

        let entries = builder.build_entries(&returns).unwrap();
        assert_eq!(entries.len(), 3 * 9);
    }
}
