//! Spectral projected gradient solver.
//!
//! Iterates `x ← P(x − s·∇f(x))` where `P` is the exact projection onto the
//! feasible set. The trial step `s` starts from the Barzilai-Borwein estimate
//! and is halved until the sufficient-decrease condition
//! `f(y) <= f(x) + ∇f(x)ᵀ(y − x) + |y − x|² / 2s` holds.

use super::projection::Projector;
use super::{Objective, Problem, Solution, Solver, SolverError};
use crate::config::SolverConfig;
use ndarray::Array1;

const STEP_MIN: f64 = 1e-12;
const STEP_MAX: f64 = 1e12;
const MAX_BACKTRACKS: usize = 60;

/// Default [`Solver`]: projected gradient with Barzilai-Borwein steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectedGradientSolver {
    config: SolverConfig,
}

impl ProjectedGradientSolver {
    /// Create a solver with the given configuration.
    pub const fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Solver configuration.
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn infeasible(problem: &Problem<'_>, message: String) -> Solution {
        tracing::debug!(%message, "solver rejected infeasible problem");
        Solution {
            x: problem.initial_guess.clone(),
            success: false,
            message,
            iterations: 0,
        }
    }
}

fn inf_norm(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

fn evaluate(objective: &dyn Objective, x: &Array1<f64>) -> Result<(f64, Array1<f64>), SolverError> {
    let value = objective.value(x);
    let gradient = objective.gradient(x);
    if !value.is_finite() || !gradient.iter().all(|g| g.is_finite()) {
        return Err(SolverError::NonFinite(format!(
            "objective or gradient is not finite at {x}"
        )));
    }
    Ok((value, gradient))
}

/// Largest violation of the budget, bounds and equality at `x`.
fn violation(problem: &Problem<'_>, x: &Array1<f64>) -> f64 {
    let budget = (x.sum() - 1.0).abs();
    let bounds = x.iter().fold(0.0_f64, |m, &v| {
        m.max(problem.lower - v).max(v - problem.upper)
    });
    let equality = problem
        .equality
        .as_ref()
        .map_or(0.0, |eq| eq.residual(x).abs());
    budget.max(bounds).max(equality)
}

impl Solver for ProjectedGradientSolver {
    fn solve(&self, problem: &Problem<'_>) -> Result<Solution, SolverError> {
        problem.validate()?;
        let n = problem.dimension();
        let feasibility = self.config.feasibility_tolerance;
        let projector = Projector::new(problem.lower, problem.upper, problem.equality.as_ref());

        if !projector.budget_feasible(n, feasibility) {
            return Ok(Self::infeasible(
                problem,
                format!(
                    "bounds [{}, {}] admit no fully invested portfolio of {n} assets",
                    problem.lower, problem.upper
                ),
            ));
        }
        if let Some(eq) = &problem.equality {
            let (low, high) = projector.equality_range(&eq.coefficients);
            if eq.target < low - feasibility || eq.target > high + feasibility {
                return Ok(Self::infeasible(
                    problem,
                    format!(
                        "equality target {} outside reachable range [{low:.6}, {high:.6}]",
                        eq.target
                    ),
                ));
            }
        }

        let objective = problem.objective;
        let tolerance = self.config.tolerance;
        let mut x = projector.project(&problem.initial_guess);
        let (mut f, mut g) = evaluate(objective, &x)?;
        let mut step = (1.0 / inf_norm(&g).max(f64::MIN_POSITIVE)).clamp(STEP_MIN, STEP_MAX);
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let mut accepted = None;
            let mut trial = step;
            let slack = 4.0 * f64::EPSILON * f.abs().max(1.0);
            for _ in 0..MAX_BACKTRACKS {
                let y = projector.project(&(&x - &(&g * trial)));
                let d = &y - &x;
                let fy = objective.value(&y);
                if fy.is_finite() && fy <= f + g.dot(&d) + d.dot(&d) / (2.0 * trial) + slack {
                    accepted = Some((y, d, fy));
                    break;
                }
                trial *= 0.5;
            }

            // No descent at any step length: x is stationary to working precision
            let Some((y, d, fy)) = accepted else {
                converged = true;
                break;
            };

            let change = inf_norm(&d);
            let decrease = f - fy;
            let (_, gy) = evaluate(objective, &y)?;

            let dg = &gy - &g;
            let curvature = d.dot(&dg);
            step = if curvature > 0.0 {
                (d.dot(&d) / curvature).clamp(STEP_MIN, STEP_MAX)
            } else {
                (trial * 2.0).min(STEP_MAX)
            };

            x = y;
            f = fy;
            g = gy;

            if change <= tolerance
                || (decrease.abs() <= tolerance * (1.0 + f.abs()) && change <= tolerance.sqrt())
            {
                converged = true;
                break;
            }
        }

        let worst = violation(problem, &x);
        let (success, message) = if !converged {
            (
                false,
                format!(
                    "iteration limit of {} reached",
                    self.config.max_iterations
                ),
            )
        } else if worst > feasibility {
            (false, format!("constraint violation {worst:.3e} exceeds tolerance"))
        } else {
            (true, "converged".to_string())
        };

        tracing::trace!(iterations, objective = f, success, "projected gradient finished");

        Ok(Solution {
            x,
            success,
            message,
            iterations,
        })
    }
}
