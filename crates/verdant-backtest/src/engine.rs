//! As-of weight backtest.

use crate::error::{BacktestError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use verdant_data::{PerformanceRecord, ReturnRecord, WeightSnapshot};

/// A date on which the weights and the returns covered different assets.
///
/// The portfolio return for that date is computed over the intersection only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageGap {
    /// Trading date.
    #[serde(rename = "dt")]
    pub date: NaiveDate,

    /// Date of the snapshot in effect.
    pub snapshot_date: NaiveDate,

    /// Weighted assets with no return that day.
    pub missing_returns: Vec<String>,

    /// Assets with a return but no weight.
    pub unweighted: Vec<String>,
}

/// Backtest output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestOutcome {
    /// One record per evaluated date, in date order.
    pub records: Vec<PerformanceRecord>,

    /// Dates where the join narrowed the portfolio.
    pub coverage_gaps: Vec<CoverageGap>,
}

impl BacktestOutcome {
    /// Cumulative return at the last evaluated date.
    pub fn final_cumulative_return(&self) -> Option<f64> {
        self.records.last().map(|r| r.cumulative_return)
    }
}

/// Replays weight snapshots against realized returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktestEngine;

impl BacktestEngine {
    /// Create an engine.
    pub const fn new() -> Self {
        Self
    }

    /// Run the backtest.
    ///
    /// Neither input needs to be sorted. Dates before the first snapshot, and
    /// dates where no weighted asset has a return, produce no record and do
    /// not compound.
    ///
    /// # Errors
    /// Duplicate `(asset, date)` returns and duplicate snapshot dates are
    /// rejected.
    pub fn run(
        &self,
        returns: &[ReturnRecord],
        snapshots: &[WeightSnapshot],
    ) -> Result<BacktestOutcome> {
        let by_date = group_returns(returns)?;

        let mut schedule: BTreeMap<NaiveDate, &WeightSnapshot> = BTreeMap::new();
        for snapshot in snapshots {
            if schedule.insert(snapshot.date, snapshot).is_some() {
                return Err(BacktestError::DuplicateSnapshot(snapshot.date));
            }
        }

        let mut outcome = BacktestOutcome::default();
        let mut wealth = 1.0;

        // Compounding is sequential in date order
        for (&date, day_returns) in &by_date {
            let Some((_, snapshot)) = schedule.range(..=date).next_back() else {
                continue;
            };

            let mut daily_return = 0.0;
            let mut matched = 0;
            let mut missing_returns = Vec::new();
            for (asset, weight) in snapshot.weights.iter() {
                match day_returns.get(asset) {
                    Some(&r) => {
                        matched += 1;
                        let contribution = r * weight;
                        if contribution.is_finite() {
                            daily_return += contribution;
                        }
                    }
                    None => missing_returns.push(asset.to_string()),
                }
            }
            let unweighted: Vec<String> = day_returns
                .keys()
                .filter(|a| snapshot.weights.get(a).is_none())
                .map(|a| (*a).to_string())
                .collect();

            if !missing_returns.is_empty() || !unweighted.is_empty() {
                tracing::warn!(
                    %date,
                    snapshot = %snapshot.date,
                    missing_returns = missing_returns.len(),
                    unweighted = unweighted.len(),
                    "weights and returns cover different assets, joining on the intersection"
                );
                outcome.coverage_gaps.push(CoverageGap {
                    date,
                    snapshot_date: snapshot.date,
                    missing_returns,
                    unweighted,
                });
            }

            if matched == 0 {
                continue;
            }

            wealth *= 1.0 + daily_return;
            outcome.records.push(PerformanceRecord {
                date,
                portfolio_return: daily_return,
                cumulative_return: wealth - 1.0,
            });
        }

        tracing::debug!(
            records = outcome.records.len(),
            gaps = outcome.coverage_gaps.len(),
            "backtest complete"
        );
        Ok(outcome)
    }
}

fn group_returns(returns: &[ReturnRecord]) -> Result<BTreeMap<NaiveDate, BTreeMap<&str, f64>>> {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<&str, f64>> = BTreeMap::new();
    let mut seen = BTreeSet::new();
    for r in returns {
        if !seen.insert((r.date, r.asset_id.as_str())) {
            return Err(BacktestError::DuplicateReturn {
                asset: r.asset_id.clone(),
                date: r.date,
            });
        }
        by_date
            .entry(r.date)
            .or_default()
            .insert(r.asset_id.as_str(), r.return_1d);
    }
    Ok(by_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use verdant_data::WeightVector;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn snapshot(date: NaiveDate, pairs: &[(&str, f64)]) -> WeightSnapshot {
        WeightSnapshot::new(
            date,
            WeightVector::new(pairs.iter().map(|&(a, w)| (a.to_string(), w))).unwrap(),
        )
    }

    #[test]
    fn test_compounds_in_date_order() {
        let returns = vec![
            ReturnRecord::new("A", day(3), -0.05),
            ReturnRecord::new("A", day(2), 0.10),
            ReturnRecord::new("B", day(2), 0.00),
            ReturnRecord::new("B", day(3), 0.05),
        ];
        let snapshots = vec![snapshot(day(1), &[("A", 0.5), ("B", 0.5)])];

        let outcome = BacktestEngine::new().run(&returns, &snapshots).unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_abs_diff_eq!(outcome.records[0].portfolio_return, 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(outcome.records[1].portfolio_return, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(outcome.records[1].cumulative_return, 0.05, epsilon = 1e-12);
        assert!(outcome.coverage_gaps.is_empty());
    }

    #[test]
    fn test_dates_before_first_snapshot_skipped() {
        let returns = vec![
            ReturnRecord::new("A", day(1), 0.5),
            ReturnRecord::new("A", day(3), 0.1),
        ];
        let snapshots = vec![snapshot(day(2), &[("A", 1.0)])];

        let outcome = BacktestEngine::new().run(&returns, &snapshots).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].date, day(3));
        assert_abs_diff_eq!(outcome.records[0].cumulative_return, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_as_of_switches_snapshots() {
        let returns = vec![
            ReturnRecord::new("A", day(2), 0.01),
            ReturnRecord::new("B", day(2), 0.02),
            ReturnRecord::new("A", day(5), 0.01),
            ReturnRecord::new("B", day(5), 0.02),
        ];
        let snapshots = vec![
            snapshot(day(4), &[("B", 1.0)]),
            snapshot(day(1), &[("A", 1.0)]),
        ];

        let outcome = BacktestEngine::new().run(&returns, &snapshots).unwrap();
        assert_abs_diff_eq!(outcome.records[0].portfolio_return, 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(outcome.records[1].portfolio_return, 0.02, epsilon = 1e-12);
        // Returned-but-unweighted assets narrow both days
        assert_eq!(outcome.coverage_gaps.len(), 2);
        assert_eq!(outcome.coverage_gaps[0].unweighted, vec!["B"]);
    }

    #[test]
    fn test_join_narrowing_recorded() {
        let returns = vec![
            ReturnRecord::new("A", day(2), 0.02),
            ReturnRecord::new("C", day(2), 0.50),
        ];
        let snapshots = vec![snapshot(day(1), &[("A", 0.6), ("B", 0.4)])];

        let outcome = BacktestEngine::new().run(&returns, &snapshots).unwrap();
        // B's weight is dropped, not renormalized
        assert_abs_diff_eq!(outcome.records[0].portfolio_return, 0.012, epsilon = 1e-12);

        let gap = &outcome.coverage_gaps[0];
        assert_eq!(gap.missing_returns, vec!["B"]);
        assert_eq!(gap.unweighted, vec!["C"]);
        assert_eq!(gap.snapshot_date, day(1));
    }

    #[test]
    fn test_empty_join_produces_no_record() {
        let returns = vec![ReturnRecord::new("Z", day(2), 0.02)];
        let snapshots = vec![snapshot(day(1), &[("A", 1.0)])];

        let outcome = BacktestEngine::new().run(&returns, &snapshots).unwrap();
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.coverage_gaps.len(), 1);
        assert_eq!(outcome.final_cumulative_return(), None);
    }

    #[test]
    fn test_duplicates_rejected() {
        let returns = vec![
            ReturnRecord::new("A", day(2), 0.02),
            ReturnRecord::new("A", day(2), 0.03),
        ];
        let snapshots = vec![snapshot(day(1), &[("A", 1.0)])];
        assert!(matches!(
            BacktestEngine::new().run(&returns, &snapshots),
            Err(BacktestError::DuplicateReturn { .. })
        ));

        let returns = vec![ReturnRecord::new("A", day(2), 0.02)];
        let snapshots = vec![snapshot(day(1), &[("A", 1.0)]), snapshot(day(1), &[("A", 1.0)])];
        assert!(matches!(
            BacktestEngine::new().run(&returns, &snapshots),
            Err(BacktestError::DuplicateSnapshot(_))
        ));
    }
}
