//! Batch pipeline wiring the component crates together.
//!
//! Each stage is also exposed as a free function so callers (and the CLI)
//! can run one stage against their own inputs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use verdant_backtest::{BacktestEngine, BacktestError, BacktestOutcome};
use verdant_data::{
    AssetSeries, CovarianceEntry, DataError, EsgScores, FirstReturn, PricePanel, ReturnRecord,
    RiskFreeSeries, WeightSnapshot, simple_returns,
};
use verdant_optimize::{
    AllocationArtifacts, AllocatorConfig, AssetSharpe, ConstrainedOptimizer, FrontierPoint,
    FrontierSweeper, OptimizationResult, OptimizeError, OptimizerConfig, ProjectedGradientSolver,
    SolverConfig, TemporalAllocator, asset_sharpes,
};
use verdant_risk::{
    ConditioningConfig, ExcessReturnStats, RiskError, RollingCovarianceBuilder,
    RollingCovarianceConfig, StatisticsEngine,
};

/// Errors raised by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input data error.
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Statistics or covariance error.
    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    /// Optimization error.
    #[error("Optimization error: {0}")]
    Optimize(#[from] OptimizeError),

    /// Backtest error.
    #[error("Backtest error: {0}")]
    Backtest(#[from] BacktestError),

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stage, used to tag log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Stage {
    /// Returns and rolling covariances.
    #[display("features")]
    Features,

    /// Mean-variance allocation.
    #[display("allocation")]
    Allocation,

    /// As-of backtest.
    #[display("backtest")]
    Backtest,

    /// ESG/Sharpe frontier.
    #[display("frontier")]
    Frontier,
}

/// Every tunable of the pipeline.
///
/// Missing fields in a JSON file take their defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sharpe/ESG optimizer settings.
    pub optimizer: OptimizerConfig,

    /// Mean-variance allocator settings.
    pub allocator: AllocatorConfig,

    /// Rolling covariance window.
    pub rolling: RollingCovarianceConfig,

    /// Numerical solver settings.
    pub solver: SolverConfig,

    /// Conditioning of the sample covariance used by the frontier.
    pub conditioning: ConditioningConfig,

    /// ESG target of the optimized portfolio reported beside the frontier.
    pub target_esg: Option<f64>,
}

impl PipelineConfig {
    /// Parse a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Solver built from the `solver` settings.
    pub const fn build_solver(&self) -> ProjectedGradientSolver {
        ProjectedGradientSolver::new(self.solver)
    }

    /// Sharpe/ESG optimizer.
    pub const fn optimizer(&self) -> ConstrainedOptimizer {
        ConstrainedOptimizer::with_solver(self.optimizer, self.build_solver())
    }

    /// Frontier sweeper.
    pub const fn sweeper(&self) -> FrontierSweeper {
        FrontierSweeper::with_optimizer(self.optimizer())
    }

    /// Mean-variance allocator.
    pub const fn allocator(&self) -> TemporalAllocator {
        TemporalAllocator::with_solver(self.allocator, self.build_solver())
    }
}

/// Long-format feature tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    /// Daily simple returns, zero on each asset's first date.
    pub returns: Vec<ReturnRecord>,

    /// Rolling covariances for every date with a full window.
    pub covariances: Vec<CovarianceEntry>,
}

impl FeatureSet {
    /// Whether no returns were derived.
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// Derive the return and covariance tables from price histories.
pub fn run_features(prices: &[AssetSeries], config: &PipelineConfig) -> Result<FeatureSet> {
    let returns: Vec<ReturnRecord> = prices
        .iter()
        .flat_map(|series| simple_returns(series, FirstReturn::Zero))
        .collect();
    if returns.is_empty() {
        tracing::info!(stage = %Stage::Features, "no prices, features are empty");
        return Ok(FeatureSet::default());
    }

    let covariances = RollingCovarianceBuilder::new(config.rolling)?.build_entries(&returns)?;
    tracing::info!(
        stage = %Stage::Features,
        assets = prices.len(),
        returns = returns.len(),
        covariances = covariances.len(),
        "built feature tables"
    );
    Ok(FeatureSet {
        returns,
        covariances,
    })
}

/// Allocate as of the latest return date, or `None` without returns or
/// without any full covariance window.
pub fn run_allocation(
    features: &FeatureSet,
    config: &PipelineConfig,
) -> Result<Option<AllocationArtifacts>> {
    if features.is_empty() {
        tracing::info!(stage = %Stage::Allocation, "no returns, skipping allocation");
        return Ok(None);
    }
    if features.covariances.is_empty() {
        tracing::info!(
            stage = %Stage::Allocation,
            window = config.rolling.window,
            "history shorter than the covariance window, skipping allocation"
        );
        return Ok(None);
    }
    let artifacts = config
        .allocator()
        .allocate_latest(&features.returns, &features.covariances)?;
    tracing::info!(
        stage = %Stage::Allocation,
        date = %artifacts.snapshot.date,
        holdings = artifacts.snapshot.weights.iter().filter(|(_, w)| *w > 0.0).count(),
        "allocation complete"
    );
    Ok(Some(artifacts))
}

/// Replay weight snapshots against the return table.
pub fn run_backtest(
    returns: &[ReturnRecord],
    snapshots: &[WeightSnapshot],
) -> Result<BacktestOutcome> {
    let outcome = BacktestEngine::new().run(returns, snapshots)?;
    tracing::info!(
        stage = %Stage::Backtest,
        records = outcome.records.len(),
        coverage_gaps = outcome.coverage_gaps.len(),
        cumulative_return = outcome.final_cumulative_return().unwrap_or(0.0),
        "backtest complete"
    );
    Ok(outcome)
}

/// Frontier stage output.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierReport {
    /// Portfolio at [`PipelineConfig::target_esg`], when one is configured.
    pub optimized: Option<OptimizationResult>,

    /// Sharpe-maximizing portfolio without an ESG constraint.
    pub tangency: OptimizationResult,

    /// Frontier points in increasing target ESG.
    pub frontier: Vec<FrontierPoint>,

    /// Stand-alone Sharpe ratio of each asset.
    pub asset_sharpes: Vec<AssetSharpe>,
}

/// Excess-return statistics over the assets that have both prices and an
/// ESG score.
pub fn frontier_statistics(
    prices: &PricePanel,
    risk_free: &RiskFreeSeries,
    esg: &EsgScores,
    config: &PipelineConfig,
) -> Result<ExcessReturnStats> {
    let scored: Vec<String> = prices
        .assets()
        .iter()
        .filter(|a| esg.get(a).is_some())
        .cloned()
        .collect();
    if scored.len() < prices.assets().len() {
        tracing::warn!(
            stage = %Stage::Frontier,
            dropped = prices.assets().len() - scored.len(),
            "assets without an ESG score are excluded"
        );
    }
    let panel = prices.select(&scored)?;
    Ok(StatisticsEngine::new(config.conditioning).compute(&panel, risk_free)?)
}

/// Optimized portfolio, tangency portfolio, frontier and asset Sharpe ratios.
pub fn run_frontier(
    prices: &PricePanel,
    risk_free: &RiskFreeSeries,
    esg: &EsgScores,
    config: &PipelineConfig,
) -> Result<FrontierReport> {
    let stats = frontier_statistics(prices, risk_free, esg, config)?;

    let optimizer = config.optimizer();
    let optimized = config
        .target_esg
        .map(|target| optimizer.optimize(&stats, esg, target))
        .transpose()?;
    let tangency = optimizer.max_sharpe_unconstrained(&stats)?;
    let frontier = config.sweeper().points(&stats, esg)?;

    tracing::info!(
        stage = %Stage::Frontier,
        assets = stats.len(),
        observations = stats.observations(),
        points = frontier.len(),
        tangency_sharpe = tangency.sharpe,
        "frontier complete"
    );
    Ok(FrontierReport {
        optimized,
        tangency,
        frontier,
        asset_sharpes: asset_sharpes(&stats),
    })
}

/// Output of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineArtifacts {
    /// Feature tables.
    pub features: FeatureSet,

    /// Allocation for the latest date, if any returns existed.
    pub allocation: Option<AllocationArtifacts>,

    /// Snapshot history including the new allocation, in date order.
    pub snapshots: Vec<WeightSnapshot>,

    /// Backtest over the full snapshot history.
    pub backtest: BacktestOutcome,
}

/// Features, allocation and backtest in sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline.
    pub const fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Pipeline configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage.
    ///
    /// `history` holds previously published snapshots; a snapshot dated the
    /// same day as the new allocation is replaced by it. Empty prices give
    /// empty artifacts.
    pub fn run(
        &self,
        prices: &[AssetSeries],
        history: &[WeightSnapshot],
    ) -> Result<PipelineArtifacts> {
        let features = run_features(prices, &self.config)?;
        if features.is_empty() {
            return Ok(PipelineArtifacts::default());
        }

        let allocation = run_allocation(&features, &self.config)?;

        let mut snapshots: Vec<WeightSnapshot> = history
            .iter()
            .filter(|s| allocation.as_ref().is_none_or(|a| a.snapshot.date != s.date))
            .cloned()
            .collect();
        if let Some(artifacts) = &allocation {
            snapshots.push(artifacts.snapshot.clone());
        }
        snapshots.sort_by_key(|s| s.date);

        let backtest = run_backtest(&features.returns, &snapshots)?;
        Ok(PipelineArtifacts {
            features,
            allocation,
            snapshots,
            backtest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, NaiveDate};
    use verdant_data::WeightVector;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn series(asset: &str, drift: f64, wobble: f64, days: i64) -> AssetSeries {
        let points = (0..days)
            .map(|t| {
                let x = t as f64;
                let price = 100.0 * (1.0 + drift).powf(x) * (1.0 + 0.02 * (wobble * x).sin());
                (start() + Duration::days(t), price)
            })
            .collect();
        AssetSeries::new(asset, points).unwrap()
    }

    fn universe(days: i64) -> Vec<AssetSeries> {
        vec![
            series("A", 0.001, 0.7, days),
            series("B", 0.002, 1.3, days),
            series("C", 0.0005, 2.1, days),
            series("D", 0.0015, 0.4, days),
        ]
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            allocator: AllocatorConfig {
                weight_cap: 0.4,
                ..AllocatorConfig::default()
            },
            rolling: RollingCovarianceConfig { window: 10 },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_config_from_partial_json() {
        let config =
            PipelineConfig::from_json_str(r#"{"allocator": {"weight_cap": 0.1}, "target_esg": 0.6}"#)
                .unwrap();
        assert_eq!(config.allocator.weight_cap, 0.1);
        assert_eq!(config.allocator.risk_aversion, 5.0);
        assert_eq!(config.rolling.window, 20);
        assert_eq!(config.target_esg, Some(0.6));
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        assert!(matches!(
            PipelineConfig::from_json_str("{not json"),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Features.to_string(), "features");
        assert_eq!(Stage::Frontier.to_string(), "frontier");
    }

    #[test]
    fn test_features_first_return_is_zero() {
        let features = run_features(&universe(15), &config()).unwrap();
        assert_eq!(features.returns.len(), 4 * 15);
        assert!(
            features
                .returns
                .iter()
                .filter(|r| r.date == start())
                .all(|r| r.return_1d == 0.0)
        );
        // 6 window-end dates x 16 pairs
        assert_eq!(features.covariances.len(), 6 * 16);
    }

    #[test]
    fn test_empty_prices_give_empty_artifacts() {
        let artifacts = Pipeline::new(config()).run(&[], &[]).unwrap();
        assert_eq!(artifacts, PipelineArtifacts::default());
    }

    #[test]
    fn test_run_replaces_same_day_snapshot() {
        let days = 25;
        let last = start() + Duration::days(days - 1);
        let equal = WeightVector::new(["A", "B", "C", "D"].map(|a| (a.to_string(), 0.25))).unwrap();
        let history = vec![
            WeightSnapshot::new(start(), equal.clone()),
            WeightSnapshot::new(last, equal),
        ];

        let artifacts = Pipeline::new(config()).run(&universe(days), &history).unwrap();
        let allocation = artifacts.allocation.unwrap();
        assert_eq!(allocation.snapshot.date, last);
        assert_abs_diff_eq!(allocation.snapshot.weights.total(), 1.0, epsilon = 1e-6);
        assert!(allocation.snapshot.weights.iter().all(|(_, w)| w <= 0.4 + 1e-9));

        assert_eq!(artifacts.snapshots.len(), 2);
        assert_eq!(artifacts.snapshots[1], allocation.snapshot);
        assert_eq!(artifacts.backtest.records.len(), days as usize);
    }

    #[test]
    fn test_short_history_skips_allocation_and_backtests_history() {
        let days = 5;
        let half = WeightVector::new(["A", "B"].map(|a| (a.to_string(), 0.5))).unwrap();
        let history = vec![WeightSnapshot::new(start(), half)];
        let prices = &universe(days)[..2];

        let features = run_features(prices, &config()).unwrap();
        assert!(features.covariances.is_empty());
        assert_eq!(run_allocation(&features, &config()).unwrap(), None);

        let artifacts = Pipeline::new(config()).run(prices, &history).unwrap();
        assert!(artifacts.allocation.is_none());
        assert_eq!(artifacts.snapshots, history);
        assert_eq!(artifacts.backtest.records.len(), days as usize);
    }

    #[test]
    fn test_frontier_excludes_unscored_assets() {
        let panel = PricePanel::from_series(&universe(60)).unwrap();
        let risk_free = RiskFreeSeries::new([(start(), 0.0001)]);
        let esg = EsgScores::new([
            ("A".to_string(), 0.2),
            ("B".to_string(), 0.5),
            ("C".to_string(), 0.8),
        ])
        .unwrap();
        let config = PipelineConfig {
            target_esg: Some(0.5),
            ..PipelineConfig::default()
        };

        let report = run_frontier(&panel, &risk_free, &esg, &config).unwrap();
        assert_eq!(report.asset_sharpes.len(), 3);
        assert!(report.tangency.weights.get("D").is_none());
        assert!(!report.frontier.is_empty());

        let optimized = report.optimized.unwrap();
        let portfolio_esg: f64 = optimized
            .weights
            .iter()
            .map(|(a, w)| w * esg.get(a).unwrap())
            .sum();
        assert_abs_diff_eq!(portfolio_esg, 0.5, epsilon = 1e-6);
        assert!(report.tangency.sharpe >= optimized.sharpe - 1e-6);
    }
}
