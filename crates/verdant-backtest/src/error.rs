//! Backtest errors.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while replaying a weight history.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// Two return records for the same asset and date
    #[error("Duplicate return for {asset} on {date}")]
    DuplicateReturn {
        /// Asset identifier
        asset: String,
        /// Trading date
        date: NaiveDate,
    },

    /// Two weight snapshots share a date
    #[error("Duplicate weight snapshot on {0}")]
    DuplicateSnapshot(NaiveDate),

    /// Not enough records to compute a statistic
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

/// Result type for backtest operations
pub type Result<T> = std::result::Result<T, BacktestError>;
