//! Error types for statistics and covariance estimation.

use thiserror::Error;

/// Errors that can occur while estimating statistics.
#[derive(Debug, Error)]
pub enum RiskError {
    /// Insufficient data for estimation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// No covariance estimate exists for the requested date
    #[error("No covariance matrix available for {0}")]
    MissingCovariance(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input data error
    #[error("Data error: {0}")]
    Data(#[from] verdant_data::DataError),
}
