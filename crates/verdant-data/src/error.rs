//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while building or loading data.
#[derive(Debug, Error)]
pub enum DataError {
    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// A required column is absent from an input table
    #[error("Missing column '{column}' in {table}")]
    MissingColumn {
        /// Name of the missing column
        column: String,
        /// Logical name of the table being read
        table: String,
    },

    /// Dates of a series are not strictly increasing
    #[error("Dates for {asset} are not strictly increasing at {date}")]
    UnorderedDates {
        /// Asset whose series is malformed
        asset: String,
        /// First offending date
        date: String,
    },

    /// Non-finite or non-positive price
    #[error("Invalid price {price} for {asset} on {date}")]
    InvalidPrice {
        /// Asset identifier
        asset: String,
        /// Observation date
        date: String,
        /// Offending price
        price: f64,
    },

    /// Missing data
    #[error("Missing data for {asset}: {reason}")]
    MissingData {
        /// Asset that was queried
        asset: String,
        /// Reason for missing data
        reason: String,
    },

    /// ESG score outside [0, 1]
    #[error("ESG score {score} for {asset} is outside [0, 1]")]
    InvalidEsgScore {
        /// Asset identifier
        asset: String,
        /// Offending score
        score: f64,
    },

    /// More than one ESG score for an asset
    #[error("ESG score for {asset} given more than once")]
    DuplicateEsgScore {
        /// Asset identifier
        asset: String,
    },

    /// Weight vector violates its invariants
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
