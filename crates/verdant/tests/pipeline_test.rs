//! End-to-end runs from CSV tables.

use approx::assert_abs_diff_eq;
use chrono::{Duration, NaiveDate};
use rstest::rstest;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use verdant::data::frames::{esg_scores_from_frame, prices_from_frame, read_csv};
use verdant::data::{PricePanel, RiskFreeSeries};
use verdant::optimize::AllocatorConfig;
use verdant::output::{ExportFormat, Exporter};
use verdant::risk::RollingCovarianceConfig;
use verdant::{Pipeline, PipelineConfig, run_frontier};

const ASSETS: [&str; 5] = ["AAA", "BBB", "CCC", "DDD", "EEE"];

fn fixture_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("verdant-pipeline-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn prices_csv(days: i64) -> PathBuf {
    let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
    let mut csv = String::from("Asset_ID,Date,Adj_Close\n");
    for (i, asset) in ASSETS.iter().enumerate() {
        let k = (i + 1) as f64;
        for t in 0..days {
            let x = t as f64;
            let price = 50.0 * k * (1.0 + 0.0005 * k).powf(x) * (1.0 + 0.015 * (0.9 * k * x).sin());
            writeln!(csv, "{asset},{},{price:.6}", start + Duration::days(t)).unwrap();
        }
    }
    let path = fixture_dir().join(format!("prices-{days}.csv"));
    fs::write(&path, csv).unwrap();
    path
}

fn config() -> PipelineConfig {
    PipelineConfig {
        allocator: AllocatorConfig {
            weight_cap: 0.3,
            ..AllocatorConfig::default()
        },
        rolling: RollingCovarianceConfig { window: 15 },
        ..PipelineConfig::default()
    }
}

#[rstest]
#[case::short_history(20)]
#[case::long_history(45)]
fn test_pipeline_from_csv(#[case] days: i64) {
    let df = read_csv(&prices_csv(days)).unwrap();
    let prices = prices_from_frame(&df).unwrap();
    assert_eq!(prices.len(), ASSETS.len());

    let artifacts = Pipeline::new(config()).run(&prices, &[]).unwrap();

    let allocation = artifacts.allocation.expect("latest date has a covariance");
    assert_abs_diff_eq!(allocation.snapshot.weights.total(), 1.0, epsilon = 1e-6);
    for (_, weight) in allocation.snapshot.weights.iter() {
        assert!((0.0..=0.3 + 1e-9).contains(&weight));
    }
    assert!(allocation.stats.volatility > 0.0);

    // the only snapshot is dated on the last return date
    assert_eq!(artifacts.backtest.records.len(), 1);
    assert_eq!(artifacts.backtest.records[0].date, allocation.snapshot.date);

    let csv = artifacts
        .snapshots
        .export_to_string(ExportFormat::Csv)
        .unwrap();
    assert_eq!(csv.lines().count(), ASSETS.len() + 1);
}

#[test]
fn test_frontier_from_csv() {
    let df = read_csv(&prices_csv(60)).unwrap();
    let panel = PricePanel::from_series(&prices_from_frame(&df).unwrap()).unwrap();

    let esg_path = fixture_dir().join("esg.csv");
    fs::write(
        &esg_path,
        "asset_id,dt,esg\nAAA,2024-01-01,0.1\nAAA,2024-03-01,0.3\nBBB,2024-03-01,0.5\n\
         CCC,2024-03-01,0.7\nDDD,2024-03-01,0.9\nEEE,2024-03-01,0.6\n",
    )
    .unwrap();
    let esg = esg_scores_from_frame(&read_csv(&esg_path).unwrap()).unwrap();
    assert_eq!(esg.get("AAA"), Some(0.3));

    let report = run_frontier(&panel, &RiskFreeSeries::default(), &esg, &config()).unwrap();
    assert!(report.optimized.is_none());
    assert_eq!(report.asset_sharpes.len(), ASSETS.len());
    assert!(
        report
            .frontier
            .windows(2)
            .all(|w| w[0].target_esg < w[1].target_esg)
    );
    for point in &report.frontier {
        assert!(point.sharpe <= report.tangency.sharpe + 1e-6);
    }
}
