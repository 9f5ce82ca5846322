//! Backtest scenarios over multi-asset return tables.

use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use rstest::rstest;
use verdant_backtest::{BacktestEngine, PerformanceMetrics};
use verdant_data::{ReturnRecord, WeightSnapshot, WeightVector};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn weights(pairs: &[(&str, f64)]) -> WeightVector {
    WeightVector::new(pairs.iter().map(|&(a, w)| (a.to_string(), w))).unwrap()
}

#[test]
fn test_all_zero_returns_stay_flat() {
    let returns: Vec<ReturnRecord> = [3, 4, 5]
        .iter()
        .flat_map(|&d| ["A", "B", "C"].map(|a| ReturnRecord::new(a, day(d), 0.0)))
        .collect();
    let snapshots = vec![WeightSnapshot::new(
        day(1),
        weights(&[("A", 0.4), ("B", 0.3), ("C", 0.3)]),
    )];

    let outcome = BacktestEngine::new().run(&returns, &snapshots).unwrap();

    assert_eq!(outcome.records.len(), 3);
    for record in &outcome.records {
        assert_eq!(record.portfolio_return, 0.0);
        assert_eq!(record.cumulative_return, 0.0);
    }
    assert!(outcome.coverage_gaps.is_empty());
}

#[rstest]
#[case(&[0.01, -0.02, 0.03, 0.005])]
#[case(&[0.0, 0.0, 0.1])]
#[case(&[-0.5, 0.5])]
fn test_cumulative_is_product_of_daily(#[case] daily: &[f64]) {
    let returns: Vec<ReturnRecord> = daily
        .iter()
        .enumerate()
        .flat_map(|(i, &r)| {
            let date = day(i as u32 + 2);
            [
                ReturnRecord::new("X", date, r),
                ReturnRecord::new("Y", date, r),
            ]
        })
        .collect();
    let snapshots = vec![WeightSnapshot::new(day(1), weights(&[("X", 0.7), ("Y", 0.3)]))];

    let outcome = BacktestEngine::new().run(&returns, &snapshots).unwrap();

    let mut product = 1.0;
    for (record, &r) in outcome.records.iter().zip(daily) {
        product *= 1.0 + r;
        assert_abs_diff_eq!(record.portfolio_return, r, epsilon = 1e-12);
        assert_abs_diff_eq!(record.cumulative_return, product - 1.0, epsilon = 1e-12);
    }

    let metrics = PerformanceMetrics::from_records(&outcome.records).unwrap();
    assert_abs_diff_eq!(metrics.total_return, product - 1.0, epsilon = 1e-12);
}

#[test]
fn test_single_snapshot_resolves_for_every_later_date() {
    let returns: Vec<ReturnRecord> = (2..=10)
        .map(|d| ReturnRecord::new("A", day(d), 0.001 * d as f64))
        .collect();
    let snapshots = vec![WeightSnapshot::new(day(2), weights(&[("A", 1.0)]))];

    let outcome = BacktestEngine::new().run(&returns, &snapshots).unwrap();
    assert_eq!(outcome.records.len(), 9);
    for (record, d) in outcome.records.iter().zip(2..=10) {
        assert_eq!(record.date, day(d));
        assert_abs_diff_eq!(record.portfolio_return, 0.001 * d as f64, epsilon = 1e-15);
    }
}

#[test]
fn test_no_snapshots_gives_empty_outcome() {
    let returns = vec![ReturnRecord::new("A", day(2), 0.01)];
    let outcome = BacktestEngine::new().run(&returns, &[]).unwrap();
    assert!(outcome.records.is_empty());
}
