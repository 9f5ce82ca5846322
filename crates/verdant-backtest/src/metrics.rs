//! Summary statistics of a performance series.

use crate::error::{BacktestError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use verdant_data::{PerformanceRecord, TRADING_DAYS};

/// Performance summary of a backtest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// First evaluated date.
    pub start: NaiveDate,

    /// Last evaluated date.
    pub end: NaiveDate,

    /// Number of evaluated days.
    pub days: usize,

    /// Cumulative return at `end`.
    pub total_return: f64,

    /// Geometric annualized return, assuming 252 trading days.
    pub annualized_return: f64,

    /// Sample standard deviation of daily returns, annualized.
    pub annualized_volatility: f64,

    /// Mean daily return over its standard deviation, annualized (0 when flat).
    pub sharpe: f64,

    /// Largest peak-to-trough loss of the wealth curve, as a positive fraction.
    pub max_drawdown: f64,
}

impl PerformanceMetrics {
    /// Summarize records ordered by date.
    pub fn from_records(records: &[PerformanceRecord]) -> Result<Self> {
        let (first, last) = match (records.first(), records.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(BacktestError::InsufficientData(
                    "no performance records".into(),
                ));
            }
        };

        let days = records.len();
        let n = days as f64;
        let total_return = last.cumulative_return;
        let annualized_return = (1.0 + total_return).powf(TRADING_DAYS / n) - 1.0;

        let mean = records.iter().map(|r| r.portfolio_return).sum::<f64>() / n;
        let std = if days < 2 {
            0.0
        } else {
            let var = records
                .iter()
                .map(|r| (r.portfolio_return - mean).powi(2))
                .sum::<f64>()
                / (n - 1.0);
            var.sqrt()
        };
        let scale = TRADING_DAYS.sqrt();
        let sharpe = if std > 0.0 { mean / std * scale } else { 0.0 };

        let mut peak = 1.0_f64;
        let mut max_drawdown = 0.0_f64;
        for r in records {
            let wealth = 1.0 + r.cumulative_return;
            peak = peak.max(wealth);
            max_drawdown = max_drawdown.max(1.0 - wealth / peak);
        }

        Ok(Self {
            start: first.date,
            end: last.date,
            days,
            total_return,
            annualized_return,
            annualized_volatility: std * scale,
            sharpe,
            max_drawdown,
        })
    }
}
