//! Sharpe maximization under budget, bound and ESG constraints.

use crate::config::OptimizerConfig;
use crate::error::{OptimizeError, Result};
use crate::sharpe::SharpeObjective;
use crate::solver::{LinearEquality, Problem, ProjectedGradientSolver, Solver};
use ndarray::Array1;
use verdant_data::{EsgScores, WeightVector};
use verdant_risk::ExcessReturnStats;

/// A solved portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Optimal weights.
    pub weights: WeightVector,

    /// Annualized Sharpe ratio at `weights`.
    pub sharpe: f64,

    /// Requested ESG target; NaN for the tangency portfolio.
    pub target_esg: f64,

    /// Whether the ESG equality was imposed. False for the tangency portfolio
    /// and whenever the ESG spread is below `esg_epsilon`.
    pub esg_constrained: bool,

    /// Solver iterations used.
    pub iterations: usize,
}

/// Maximizes annualized Sharpe over `{sum w = 1, min <= w <= max}` with an
/// optional `wᵀesg = target` equality.
#[derive(Debug, Clone, Default)]
pub struct ConstrainedOptimizer<S = ProjectedGradientSolver> {
    config: OptimizerConfig,
    solver: S,
}

impl ConstrainedOptimizer {
    /// Optimizer using the default solver.
    pub fn new(config: OptimizerConfig) -> Self {
        Self::with_solver(config, ProjectedGradientSolver::default())
    }
}

impl<S: Solver> ConstrainedOptimizer<S> {
    /// Optimizer using a custom solver.
    pub const fn with_solver(config: OptimizerConfig, solver: S) -> Self {
        Self { config, solver }
    }

    /// Optimizer configuration.
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Reject bounds that admit no fully invested portfolio of `n` assets.
    pub fn check_feasible(&self, n: usize) -> Result<()> {
        let OptimizerConfig {
            min_allocation,
            max_allocation,
            ..
        } = self.config;

        if n == 0 {
            return Err(OptimizeError::InsufficientData("empty asset universe".into()));
        }
        if !(min_allocation <= max_allocation) {
            return Err(OptimizeError::InfeasibleConstraint(format!(
                "min_allocation {min_allocation} exceeds max_allocation {max_allocation}"
            )));
        }
        if min_allocation * (n as f64) > 1.0 + 1e-12 {
            return Err(OptimizeError::InfeasibleConstraint(format!(
                "min_allocation {min_allocation} x {n} assets exceeds full investment"
            )));
        }
        if max_allocation * (n as f64) < 1.0 - 1e-12 {
            return Err(OptimizeError::InfeasibleConstraint(format!(
                "max_allocation {max_allocation} x {n} assets cannot reach full investment"
            )));
        }
        Ok(())
    }

    /// Whether the scores are too close together to carry an ESG equality.
    pub fn esg_is_degenerate(&self, esg: &Array1<f64>) -> bool {
        let (lo, hi) = esg
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        hi - lo < self.config.esg_epsilon
    }

    /// Maximize Sharpe subject to `wᵀesg = target_esg`.
    ///
    /// When the ESG spread is below `esg_epsilon` the equality is dropped and
    /// the result has `esg_constrained == false`.
    ///
    /// # Errors
    /// - [`OptimizeError::InfeasibleConstraint`] for bounds that cannot sum to one
    /// - [`OptimizeError::Data`] if an asset has no ESG score
    /// - [`OptimizeError::OptimizationFailed`] if the solve does not converge
    ///   to a feasible point, including unreachable targets
    pub fn optimize(
        &self,
        stats: &ExcessReturnStats,
        esg: &EsgScores,
        target_esg: f64,
    ) -> Result<OptimizationResult> {
        let scores = esg.aligned(&stats.assets)?;
        self.optimize_aligned(stats, &scores, target_esg)
    }

    /// [`optimize`](Self::optimize) with scores already aligned to
    /// `stats.assets`.
    pub fn optimize_aligned(
        &self,
        stats: &ExcessReturnStats,
        esg: &Array1<f64>,
        target_esg: f64,
    ) -> Result<OptimizationResult> {
        if esg.len() != stats.len() {
            return Err(OptimizeError::InsufficientData(format!(
                "{} ESG scores for {} assets",
                esg.len(),
                stats.len()
            )));
        }

        let equality = if self.esg_is_degenerate(esg) {
            tracing::debug!(target_esg, "ESG spread below epsilon, dropping ESG constraint");
            None
        } else {
            Some(LinearEquality::new(esg.clone(), target_esg))
        };
        let esg_constrained = equality.is_some();
        let (weights, sharpe, iterations) = self.solve(stats, equality)?;

        Ok(OptimizationResult {
            weights,
            sharpe,
            target_esg,
            esg_constrained,
            iterations,
        })
    }

    /// Tangency portfolio: maximum Sharpe with no ESG equality.
    pub fn max_sharpe_unconstrained(&self, stats: &ExcessReturnStats) -> Result<OptimizationResult> {
        let (weights, sharpe, iterations) = self.solve(stats, None)?;
        Ok(OptimizationResult {
            weights,
            sharpe,
            target_esg: f64::NAN,
            esg_constrained: false,
            iterations,
        })
    }

    fn solve(
        &self,
        stats: &ExcessReturnStats,
        equality: Option<LinearEquality>,
    ) -> Result<(WeightVector, f64, usize)> {
        let n = stats.len();
        self.check_feasible(n)?;

        let objective = SharpeObjective::from_stats(stats);
        let mut problem = Problem::new(&objective, Array1::from_elem(n, 1.0 / n as f64))
            .with_bounds(self.config.min_allocation, self.config.max_allocation);
        if let Some(eq) = equality {
            problem = problem.with_equality(eq);
        }

        let solution = self.solver.solve(&problem)?;
        if !solution.success {
            return Err(OptimizeError::OptimizationFailed(solution.message));
        }

        let weights = WeightVector::from_array(&stats.assets, &solution.x)
            .and_then(|w| {
                w.check_bounds(self.config.min_allocation, self.config.max_allocation)?;
                Ok(w)
            })
            .map_err(|e| OptimizeError::OptimizationFailed(e.to_string()))?;
        let sharpe = objective.sharpe(&solution.x);

        tracing::debug!(
            assets = n,
            sharpe,
            iterations = solution.iterations,
            "solved Sharpe portfolio"
        );
        Ok((weights, sharpe, solution.iterations))
    }
}
