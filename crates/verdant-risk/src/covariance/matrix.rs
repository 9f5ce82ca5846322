//! Labelled, conditioned covariance matrices.

use super::utils::{clip_negative_eigenvalues, floor_diagonal, symmetrize};
use crate::error::RiskError;
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use verdant_data::CovarianceEntry;

/// How raw estimates are conditioned into a [`CovarianceMatrix`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConditioningConfig {
    /// Smallest allowed variance on the diagonal (default: 1e-10)
    pub diagonal_floor: f64,

    /// Eigenvalues above `-eigenvalue_tolerance` are accepted as-is
    /// (default: 1e-12)
    pub eigenvalue_tolerance: f64,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            diagonal_floor: 1e-10,
            eigenvalue_tolerance: 1e-12,
        }
    }
}

impl ConditioningConfig {
    /// Default conditioning with a custom diagonal floor.
    pub fn with_floor(diagonal_floor: f64) -> Self {
        Self {
            diagonal_floor,
            ..Self::default()
        }
    }
}

/// Symmetric, positive semidefinite covariance over a fixed asset ordering.
///
/// The diagonal is strictly positive. Construction is the only way in, so
/// every instance has been conditioned.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    assets: Vec<String>,
    values: Array2<f64>,
}

impl CovarianceMatrix {
    /// Condition a raw estimate.
    ///
    /// Missing (NaN) cells become zero, the matrix is symmetrized as
    /// `(M + M^T) / 2`, negative eigenvalues are clipped and the diagonal is
    /// floored.
    pub fn from_raw(
        assets: Vec<String>,
        raw: &Array2<f64>,
        config: &ConditioningConfig,
    ) -> Result<Self, RiskError> {
        if raw.nrows() != assets.len() || raw.ncols() != assets.len() {
            return Err(RiskError::DimensionMismatch {
                expected: assets.len(),
                actual: raw.nrows().max(raw.ncols()),
            });
        }
        if !(config.diagonal_floor > 0.0) {
            return Err(RiskError::InvalidParameter(format!(
                "diagonal floor must be positive, got {}",
                config.diagonal_floor
            )));
        }

        let filled = raw.mapv(|v| if v.is_finite() { v } else { 0.0 });
        let symmetric = symmetrize(&filled)?;
        let mut values = clip_negative_eigenvalues(&symmetric, config.eigenvalue_tolerance)?;
        floor_diagonal(&mut values, config.diagonal_floor);

        Ok(Self { assets, values })
    }

    /// Pivot the long-form entries for `date` into a matrix over `assets`.
    ///
    /// Pairs absent from the table are treated as zero covariance. Fails when
    /// no entry exists for `date`.
    pub fn from_entries(
        entries: &[CovarianceEntry],
        date: NaiveDate,
        assets: &[String],
        config: &ConditioningConfig,
    ) -> Result<Self, RiskError> {
        let index: HashMap<&str, usize> = assets
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect();

        let mut raw = Array2::from_elem((assets.len(), assets.len()), f64::NAN);
        let mut found = false;
        for entry in entries.iter().filter(|e| e.date == date) {
            found = true;
            if let (Some(&i), Some(&j)) = (
                index.get(entry.asset_i.as_str()),
                index.get(entry.asset_j.as_str()),
            ) {
                raw[[i, j]] = entry.cov;
            }
        }
        if !found {
            return Err(RiskError::MissingCovariance(date.to_string()));
        }

        Self::from_raw(assets.to_vec(), &raw, config)
    }

    /// Asset ordering of rows and columns.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Matrix values.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the matrix is empty.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Variances along the diagonal.
    pub fn variances(&self) -> Array1<f64> {
        self.values.diag().to_owned()
    }

    /// `w^T Σ w`
    pub fn portfolio_variance(&self, weights: &Array1<f64>) -> Result<f64, RiskError> {
        if weights.len() != self.len() {
            return Err(RiskError::DimensionMismatch {
                expected: self.len(),
                actual: weights.len(),
            });
        }
        Ok(weights.dot(&self.values.dot(weights)))
    }

    /// Flatten into long-form entries dated `date`.
    pub fn to_entries(&self, date: NaiveDate) -> Vec<CovarianceEntry> {
        let mut entries = Vec::with_capacity(self.len() * self.len());
        for (i, asset_i) in self.assets.iter().enumerate() {
            for (j, asset_j) in self.assets.iter().enumerate() {
                entries.push(CovarianceEntry {
                    date,
                    asset_i: asset_i.clone(),
                    asset_j: asset_j.clone(),
                    cov: self.values[[i, j]],
                });
            }
        }
        entries
    }
}
