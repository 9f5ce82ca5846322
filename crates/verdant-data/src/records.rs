//! Long-format records exchanged between pipeline stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One simple daily return for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    /// Asset identifier.
    pub asset_id: String,

    /// Trading date of the return.
    #[serde(rename = "dt")]
    pub date: NaiveDate,

    /// Simple return versus the previous observation.
    pub return_1d: f64,
}

impl ReturnRecord {
    /// Create a new return record.
    pub fn new(asset_id: impl Into<String>, date: NaiveDate, return_1d: f64) -> Self {
        Self {
            asset_id: asset_id.into(),
            date,
            return_1d,
        }
    }
}

/// One cell of a covariance matrix in long form.
///
/// `cov` is NaN when the pair had too few overlapping observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceEntry {
    /// Window-end date of the estimate.
    #[serde(rename = "dt")]
    pub date: NaiveDate,

    /// Row asset.
    pub asset_i: String,

    /// Column asset.
    pub asset_j: String,

    /// Sample covariance.
    pub cov: f64,
}

/// Daily portfolio performance produced by the backtest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Evaluation date.
    #[serde(rename = "dt")]
    pub date: NaiveDate,

    /// Weighted sum of the day's asset returns.
    pub portfolio_return: f64,

    /// Compounded return since the first evaluated date.
    pub cumulative_return: f64,
}
