//! Risk-free rate series with forward-fill lookup.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trading days per year used to de-annualize quoted yields.
pub const TRADING_DAYS: f64 = 252.0;

/// Daily risk-free rate keyed by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskFreeSeries {
    rates: BTreeMap<NaiveDate, f64>,
}

impl RiskFreeSeries {
    /// Create a series from daily rates.
    pub fn new(rates: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        Self {
            rates: rates.into_iter().collect(),
        }
    }

    /// Create a series from annualized percentage yields (e.g. a 3M T-bill
    /// quote of `5.25`), converting each to a daily rate.
    pub fn from_annual_percent(quotes: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        Self::new(
            quotes
                .into_iter()
                .map(|(date, pct)| (date, pct / 100.0 / TRADING_DAYS)),
        )
    }

    /// Rate in effect on `date`: the latest quote at or before it.
    ///
    /// Returns `None` before the first quote; values are never propagated
    /// backward.
    pub fn as_of(&self, date: NaiveDate) -> Option<f64> {
        self.rates.range(..=date).next_back().map(|(_, &r)| r)
    }

    /// Forward-filled rates for each date, with zero before the first quote.
    pub fn align(&self, dates: &[NaiveDate]) -> Vec<f64> {
        dates
            .iter()
            .map(|&d| self.as_of(d).unwrap_or(0.0))
            .collect()
    }

    /// Number of explicit quotes.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Whether the series has no quotes.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_forward_fill_without_backfill() {
        let rf = RiskFreeSeries::new([(day(4), 0.0002), (day(6), 0.0003)]);
        let aligned = rf.align(&[day(1), day(4), day(5), day(6), day(7)]);
        assert_eq!(aligned, vec![0.0, 0.0002, 0.0002, 0.0003, 0.0003]);
        assert!(rf.as_of(day(3)).is_none());
    }

    #[test]
    fn test_from_annual_percent() {
        let rf = RiskFreeSeries::from_annual_percent([(day(1), 5.04)]);
        assert_relative_eq!(rf.as_of(day(1)).unwrap(), 0.0002, epsilon = 1e-12);
    }
}
