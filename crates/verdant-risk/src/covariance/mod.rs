//! Covariance estimation and conditioning
//!
//! Raw estimates come from [`CovarianceEstimator`] implementations and are
//! turned into a [`CovarianceMatrix`] before any optimizer sees them.

pub mod matrix;
pub mod rolling;
pub mod sample;
pub mod utils;

pub use matrix::{ConditioningConfig, CovarianceMatrix};
pub use rolling::{DatedCovariance, RollingCovarianceBuilder, RollingCovarianceConfig};
pub use sample::SampleCovarianceEstimator;
pub use utils::{
    EigenDecomposition, clip_negative_eigenvalues, condition_number, floor_diagonal,
    is_positive_semidefinite, jacobi_eigendecomp, symmetrize,
};

use crate::error::RiskError;
use ndarray::Array2;

/// Trait for covariance matrix estimators
pub trait CovarianceEstimator {
    /// Estimate the covariance matrix from a return panel
    ///
    /// # Arguments
    /// * `returns` - Matrix where each row is a date and each column an asset;
    ///   NaN marks a missing observation
    ///
    /// # Returns
    /// * Raw N x N estimate; cells without enough data are NaN
    fn estimate(&self, returns: &Array2<f64>) -> Result<Array2<f64>, RiskError>;
}
