//! ESG/Sharpe efficient frontier
//!
//! The frontier is produced lazily: [`FrontierSweeper::sweep`] returns an
//! iterator that solves one target per `next()` call, so a caller may stop
//! early. Every call to `sweep` starts over from the first grid point.

use crate::config::OptimizerConfig;
use crate::constrained::ConstrainedOptimizer;
use crate::error::Result;
use crate::solver::{ProjectedGradientSolver, Solver};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use verdant_data::EsgScores;
use verdant_risk::ExcessReturnStats;

/// Best achievable Sharpe at one ESG target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    /// Portfolio ESG score imposed by the equality constraint.
    pub target_esg: f64,

    /// Annualized Sharpe ratio of the optimal portfolio.
    pub sharpe: f64,
}

/// Target ESG grid from `min + step` to `max - step` inclusive, rounded to
/// three decimals.
///
/// Targets are computed on demand, so a very fine step costs nothing until
/// the points are visited.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EsgGrid {
    start: f64,
    step: f64,
    count: usize,
}

impl EsgGrid {
    /// Grid over `(min_esg, max_esg)`; empty for a non-positive step or a
    /// spread narrower than two steps.
    pub fn new(min_esg: f64, max_esg: f64, step: f64) -> Self {
        if !(step > 0.0) || !min_esg.is_finite() || !max_esg.is_finite() {
            return Self::default();
        }
        let start = min_esg + step;
        let stop = max_esg - step + 1e-9;
        let count = ((stop - start) / step).ceil();
        if !(count > 0.0) {
            return Self::default();
        }
        Self {
            start,
            step,
            count: count as usize,
        }
    }

    /// Number of targets.
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Whether the grid has no targets.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Target at position `i`.
    pub fn get(&self, i: usize) -> Option<f64> {
        (i < self.count)
            .then(|| ((self.start + i as f64 * self.step) * 1000.0).round_ties_even() / 1000.0)
    }

    /// Targets in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.count).filter_map(|i| self.get(i))
    }
}

/// Drives a [`ConstrainedOptimizer`] across the ESG grid.
#[derive(Debug, Clone, Default)]
pub struct FrontierSweeper<S = ProjectedGradientSolver> {
    optimizer: ConstrainedOptimizer<S>,
}

impl FrontierSweeper {
    /// Sweeper using the default solver.
    pub fn new(config: OptimizerConfig) -> Self {
        Self::with_optimizer(ConstrainedOptimizer::new(config))
    }
}

impl<S: Solver> FrontierSweeper<S> {
    /// Sweeper around an existing optimizer.
    pub const fn with_optimizer(optimizer: ConstrainedOptimizer<S>) -> Self {
        Self { optimizer }
    }

    /// Underlying optimizer.
    pub const fn optimizer(&self) -> &ConstrainedOptimizer<S> {
        &self.optimizer
    }

    /// Lazily solve each grid point.
    ///
    /// Empty when the ESG spread is below `esg_epsilon`.
    ///
    /// # Errors
    /// Missing ESG scores and infeasible bounds are reported up front; per-point
    /// solver failures are skipped during iteration.
    pub fn sweep<'a>(
        &'a self,
        stats: &'a ExcessReturnStats,
        esg: &EsgScores,
    ) -> Result<FrontierIter<'a, S>> {
        let scores = esg.aligned(&stats.assets)?;
        self.optimizer.check_feasible(stats.len())?;

        let targets = if self.optimizer.esg_is_degenerate(&scores) {
            tracing::debug!("ESG spread below epsilon, frontier is empty");
            EsgGrid::default()
        } else {
            let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
            let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            EsgGrid::new(min, max, self.optimizer.config().frontier_step)
        };

        Ok(FrontierIter {
            optimizer: &self.optimizer,
            stats,
            scores,
            targets,
            processed: 0,
        })
    }

    /// Collect the whole frontier.
    pub fn points(&self, stats: &ExcessReturnStats, esg: &EsgScores) -> Result<Vec<FrontierPoint>> {
        Ok(self.sweep(stats, esg)?.collect())
    }
}

/// Lazy frontier sequence, ordered by increasing target ESG.
#[derive(Debug)]
pub struct FrontierIter<'a, S> {
    optimizer: &'a ConstrainedOptimizer<S>,
    stats: &'a ExcessReturnStats,
    scores: Array1<f64>,
    targets: EsgGrid,
    processed: usize,
}

impl<S> FrontierIter<'_, S> {
    /// Full target grid.
    pub const fn targets(&self) -> &EsgGrid {
        &self.targets
    }

    /// Grid points attempted so far, including skipped ones.
    pub const fn processed(&self) -> usize {
        self.processed
    }
}

impl<S: Solver> Iterator for FrontierIter<'_, S> {
    type Item = FrontierPoint;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(target_esg) = self.targets.get(self.processed) {
            self.processed += 1;
            match self
                .optimizer
                .optimize_aligned(self.stats, &self.scores, target_esg)
            {
                Ok(result) => {
                    return Some(FrontierPoint {
                        target_esg,
                        sharpe: result.sharpe,
                    });
                }
                Err(err) => {
                    tracing::debug!(target_esg, error = %err, "skipping frontier point");
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.targets.len() - self.processed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use verdant_risk::{ConditioningConfig, CovarianceMatrix};

    fn stats() -> ExcessReturnStats {
        let cov = CovarianceMatrix::from_raw(
            vec!["A".into(), "B".into(), "C".into()],
            &array![
                [0.0004, 0.0001, 0.0],
                [0.0001, 0.0009, 0.0001],
                [0.0, 0.0001, 0.0002]
            ],
            &ConditioningConfig::default(),
        )
        .unwrap();
        ExcessReturnStats::from_parts(array![0.0008, 0.0012, 0.0003], cov).unwrap()
    }

    fn scores(values: [f64; 3]) -> EsgScores {
        EsgScores::new(
            ["A", "B", "C"]
                .iter()
                .zip(values)
                .map(|(a, v)| (a.to_string(), v)),
        )
        .unwrap()
    }

    #[test]
    fn test_grid_matches_inclusive_range() {
        let grid: Vec<f64> = EsgGrid::new(0.2, 0.3, 0.01).iter().collect();
        assert_eq!(grid.len(), 9);
        assert_abs_diff_eq!(grid[0], 0.21);
        assert_abs_diff_eq!(grid[8], 0.29);
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_grid_empty_when_spread_too_small() {
        assert!(EsgGrid::new(0.5, 0.51, 0.01).is_empty());
        assert!(EsgGrid::new(0.5, 0.6, 0.0).is_empty());
    }

    #[test]
    fn test_fine_grid_is_computed_on_demand() {
        let grid = EsgGrid::new(0.0, 1.0, 1e-12);
        assert!(grid.len() > 900_000_000_000);
        assert_abs_diff_eq!(grid.get(0).unwrap(), 0.0);
        assert_abs_diff_eq!(grid.get(grid.len() - 1).unwrap(), 1.0);
        assert_eq!(grid.get(grid.len()), None);
        assert_eq!(grid.iter().take(3).count(), 3);
    }

    #[test]
    fn test_sweep_ordered_and_non_empty() {
        let sweeper = FrontierSweeper::new(OptimizerConfig {
            frontier_step: 0.05,
            ..OptimizerConfig::default()
        });
        let stats = stats();
        let points = sweeper.points(&stats, &scores([0.3, 0.5, 0.8])).unwrap();

        assert!(!points.is_empty());
        assert!(points.windows(2).all(|w| w[0].target_esg < w[1].target_esg));
        assert!(points.iter().all(|p| p.target_esg > 0.3 && p.target_esg < 0.8));
    }

    #[test]
    fn test_degenerate_scores_give_empty_frontier() {
        let sweeper = FrontierSweeper::new(OptimizerConfig::default());
        let stats = stats();
        let points = sweeper.points(&stats, &scores([0.4, 0.4, 0.4])).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_sweep_is_lazy_and_restartable() {
        let sweeper = FrontierSweeper::new(OptimizerConfig {
            frontier_step: 0.05,
            ..OptimizerConfig::default()
        });
        let stats = stats();
        let esg = scores([0.3, 0.5, 0.8]);

        let mut iter = sweeper.sweep(&stats, &esg).unwrap();
        let first = iter.next().unwrap();
        assert!(iter.processed() < iter.targets().len());

        let again = sweeper.sweep(&stats, &esg).unwrap().next().unwrap();
        assert_eq!(first, again);
    }
}
