//! Capped long-only mean-variance allocation over calendar time
//!
//! For a target date the allocator estimates expected returns as a trailing
//! calendar-day mean, pivots that date's rolling covariance into a matrix and
//! maximizes `μᵀw − λ·wᵀΣw` over `{sum w = 1, 0 <= w <= cap}`.

use crate::config::AllocatorConfig;
use crate::error::{OptimizeError, Result};
use crate::solver::{Objective, Problem, ProjectedGradientSolver, Solver};
use chrono::{Days, NaiveDate};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use verdant_data::{CovarianceEntry, ReturnRecord, WeightSnapshot, WeightVector};
use verdant_risk::{ConditioningConfig, CovarianceMatrix};

/// Trailing mean return per asset as of `date`.
///
/// The window covers `lookback_days` calendar days ending at `date`. If it
/// holds no records, every record up to `date` is used instead. Assets whose
/// returns are all missing get zero.
pub fn expected_returns(
    returns: &[ReturnRecord],
    date: NaiveDate,
    lookback_days: u32,
) -> BTreeMap<String, f64> {
    let cutoff = date
        .checked_sub_days(Days::new(u64::from(lookback_days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN);

    let in_window: Vec<&ReturnRecord> = returns
        .iter()
        .filter(|r| r.date <= date && r.date >= cutoff)
        .collect();
    let window = if in_window.is_empty() {
        returns.iter().filter(|r| r.date <= date).collect()
    } else {
        in_window
    };

    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for r in window {
        let entry = sums.entry(r.asset_id.clone()).or_insert((0.0, 0));
        if r.return_1d.is_finite() {
            entry.0 += r.return_1d;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(asset, (sum, count))| {
            let mean = if count == 0 { 0.0 } else { sum / count as f64 };
            (asset, mean)
        })
        .collect()
}

/// Negative mean-variance utility `−(μᵀw − λ·wᵀΣw)`.
#[derive(Debug, Clone, Copy)]
pub struct MeanVarianceObjective<'a> {
    mean: &'a Array1<f64>,
    covariance: &'a Array2<f64>,
    risk_aversion: f64,
}

impl<'a> MeanVarianceObjective<'a> {
    /// Utility with risk aversion `λ`.
    pub const fn new(mean: &'a Array1<f64>, covariance: &'a Array2<f64>, risk_aversion: f64) -> Self {
        Self {
            mean,
            covariance,
            risk_aversion,
        }
    }

    /// `μᵀw − λ·wᵀΣw`
    pub fn utility(&self, weights: &Array1<f64>) -> f64 {
        weights.dot(self.mean) - self.risk_aversion * weights.dot(&self.covariance.dot(weights))
    }
}

impl Objective for MeanVarianceObjective<'_> {
    fn value(&self, x: &Array1<f64>) -> f64 {
        -self.utility(x)
    }

    fn gradient(&self, x: &Array1<f64>) -> Array1<f64> {
        self.covariance.dot(x) * (2.0 * self.risk_aversion) - self.mean
    }
}

/// Expected return and volatility of the chosen weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    /// Allocation date.
    #[serde(rename = "dt")]
    pub date: NaiveDate,

    /// `wᵀμ` (daily)
    pub expected_return: f64,

    /// `sqrt(wᵀΣw)` (daily)
    pub volatility: f64,
}

/// Output of one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationArtifacts {
    /// Weights dated at the allocation date.
    pub snapshot: WeightSnapshot,

    /// Summary statistics of the weights.
    pub stats: PortfolioStats,
}

/// Mean-variance allocator for one date at a time.
#[derive(Debug, Clone, Default)]
pub struct TemporalAllocator<S = ProjectedGradientSolver> {
    config: AllocatorConfig,
    solver: S,
}

impl TemporalAllocator {
    /// Allocator using the default solver.
    pub fn new(config: AllocatorConfig) -> Self {
        Self::with_solver(config, ProjectedGradientSolver::default())
    }
}

impl<S: Solver> TemporalAllocator<S> {
    /// Allocator using a custom solver.
    pub const fn with_solver(config: AllocatorConfig, solver: S) -> Self {
        Self { config, solver }
    }

    /// Allocator configuration.
    pub const fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Allocate as of the latest date in `returns`.
    pub fn allocate_latest(
        &self,
        returns: &[ReturnRecord],
        covariances: &[CovarianceEntry],
    ) -> Result<AllocationArtifacts> {
        let latest = returns
            .iter()
            .map(|r| r.date)
            .max()
            .ok_or_else(|| OptimizeError::InsufficientData("no return records".into()))?;
        self.allocate(returns, covariances, latest)
    }

    /// Allocate as of `date`.
    ///
    /// # Errors
    /// - [`OptimizeError::InsufficientData`] if no return precedes `date`
    /// - [`OptimizeError::InfeasibleConstraint`] if `weight_cap × N < 1`
    /// - [`OptimizeError::Risk`] if no covariance exists for `date`
    /// - [`OptimizeError::OptimizationFailed`] if the solver errors
    pub fn allocate(
        &self,
        returns: &[ReturnRecord],
        covariances: &[CovarianceEntry],
        date: NaiveDate,
    ) -> Result<AllocationArtifacts> {
        let expected = expected_returns(returns, date, self.config.lookback_days);
        if expected.is_empty() {
            return Err(OptimizeError::InsufficientData(format!(
                "no returns on or before {date}"
            )));
        }

        let assets: Vec<String> = expected.keys().cloned().collect();
        let mean: Array1<f64> = expected.values().copied().collect();
        self.check_cap(assets.len())?;

        let covariance = CovarianceMatrix::from_entries(
            covariances,
            date,
            &assets,
            &ConditioningConfig::with_floor(self.config.diagonal_floor),
        )?;

        let weights = self.solve(&mean, covariance.values())?;
        let stats = PortfolioStats {
            date,
            expected_return: weights.dot(&mean),
            volatility: covariance.portfolio_variance(&weights)?.max(0.0).sqrt(),
        };
        let snapshot = WeightSnapshot::new(date, WeightVector::from_array(&assets, &weights)?);

        tracing::info!(
            %date,
            assets = assets.len(),
            expected_return = stats.expected_return,
            volatility = stats.volatility,
            "allocated portfolio"
        );
        Ok(AllocationArtifacts { snapshot, stats })
    }

    fn check_cap(&self, n: usize) -> Result<()> {
        let cap = self.config.weight_cap;
        if !(cap > 0.0) || cap * (n as f64) < 1.0 - 1e-12 {
            return Err(OptimizeError::InfeasibleConstraint(format!(
                "weight_cap {cap} x {n} assets cannot reach full investment"
            )));
        }
        Ok(())
    }

    /// Solve, then clip to non-negative and renormalize; equal weight when
    /// nothing positive survives.
    fn solve(&self, mean: &Array1<f64>, covariance: &Array2<f64>) -> Result<Array1<f64>> {
        let n = mean.len();
        let objective = MeanVarianceObjective::new(mean, covariance, self.config.risk_aversion);
        let problem = Problem::new(&objective, Array1::from_elem(n, 1.0 / n as f64))
            .with_bounds(0.0, self.config.weight_cap.min(1.0));

        let solution = self.solver.solve(&problem)?;
        if !solution.success {
            tracing::warn!(message = %solution.message, "mean-variance solve did not converge");
        }

        let clipped = solution
            .x
            .mapv(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
        let total = clipped.sum();
        if total > 0.0 {
            Ok(clipped / total)
        } else {
            tracing::warn!(assets = n, "degenerate allocation, falling back to equal weight");
            Ok(Array1::from_elem(n, 1.0 / n as f64))
        }
    }
}
