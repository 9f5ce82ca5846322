//! Numerical solver seam
//!
//! Optimizers describe a problem as a smooth [`Objective`] to minimize over the
//! set
//!
//! ```text
//! { x : sum(x) = 1,  lower <= x_i <= upper,  [aᵀx = b] }
//! ```
//!
//! and hand it to any [`Solver`]. A solver reports whether it reached a
//! feasible, converged point together with a diagnostic message; it only
//! returns `Err` when the problem itself is malformed.

mod projected_gradient;
mod projection;

pub use projected_gradient::ProjectedGradientSolver;

use ndarray::Array1;
use thiserror::Error;

/// Smooth function minimized by a [`Solver`].
pub trait Objective {
    /// Objective value at `x`.
    fn value(&self, x: &Array1<f64>) -> f64;

    /// Gradient at `x`.
    fn gradient(&self, x: &Array1<f64>) -> Array1<f64>;
}

/// Linear equality `coefficientsᵀx = target`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEquality {
    /// Constraint coefficients, one per variable.
    pub coefficients: Array1<f64>,

    /// Right-hand side.
    pub target: f64,
}

impl LinearEquality {
    /// Create an equality constraint.
    pub const fn new(coefficients: Array1<f64>, target: f64) -> Self {
        Self {
            coefficients,
            target,
        }
    }

    /// Signed violation at `x`.
    pub fn residual(&self, x: &Array1<f64>) -> f64 {
        self.coefficients.dot(x) - self.target
    }
}

/// A minimization problem over the budget simplex with box bounds.
pub struct Problem<'a> {
    /// Function to minimize.
    pub objective: &'a dyn Objective,

    /// Starting point; projected onto the feasible set before iterating.
    pub initial_guess: Array1<f64>,

    /// Lower bound applied to every variable.
    pub lower: f64,

    /// Upper bound applied to every variable.
    pub upper: f64,

    /// Optional extra equality constraint.
    pub equality: Option<LinearEquality>,
}

impl std::fmt::Debug for Problem<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("initial_guess", &self.initial_guess)
            .field("lower", &self.lower)
            .field("upper", &self.upper)
            .field("equality", &self.equality)
            .finish_non_exhaustive()
    }
}

impl<'a> Problem<'a> {
    /// Problem with bounds `[0, 1]` and no extra equality.
    pub const fn new(objective: &'a dyn Objective, initial_guess: Array1<f64>) -> Self {
        Self {
            objective,
            initial_guess,
            lower: 0.0,
            upper: 1.0,
            equality: None,
        }
    }

    /// Set per-variable bounds.
    #[must_use]
    pub const fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Add an equality constraint.
    #[must_use]
    pub fn with_equality(mut self, equality: LinearEquality) -> Self {
        self.equality = Some(equality);
        self
    }

    /// Number of decision variables.
    pub fn dimension(&self) -> usize {
        self.initial_guess.len()
    }

    fn validate(&self) -> Result<(), SolverError> {
        let n = self.dimension();
        if n == 0 {
            return Err(SolverError::InvalidProblem("problem has no variables".into()));
        }
        if !self.initial_guess.iter().all(|v| v.is_finite()) {
            return Err(SolverError::InvalidProblem("initial guess is not finite".into()));
        }
        if !(self.lower.is_finite() && self.upper.is_finite()) {
            return Err(SolverError::InvalidProblem("bounds must be finite".into()));
        }
        if self.lower > self.upper {
            return Err(SolverError::InvalidProblem(format!(
                "lower bound {} exceeds upper bound {}",
                self.lower, self.upper
            )));
        }
        if let Some(eq) = &self.equality {
            if eq.coefficients.len() != n {
                return Err(SolverError::InvalidProblem(format!(
                    "equality has {} coefficients for {n} variables",
                    eq.coefficients.len()
                )));
            }
            if !eq.target.is_finite() || !eq.coefficients.iter().all(|v| v.is_finite()) {
                return Err(SolverError::InvalidProblem("equality is not finite".into()));
            }
        }
        Ok(())
    }
}

/// Outcome of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Final iterate.
    pub x: Array1<f64>,

    /// Whether `x` is feasible and the iteration converged.
    pub success: bool,

    /// Human-readable diagnostic.
    pub message: String,

    /// Iterations performed.
    pub iterations: usize,
}

/// A numerical minimizer.
pub trait Solver {
    /// Minimize the problem's objective over its feasible set.
    ///
    /// # Errors
    /// Returns [`SolverError`] only for malformed problems; non-convergence and
    /// infeasibility are reported through [`Solution::success`].
    fn solve(&self, problem: &Problem<'_>) -> Result<Solution, SolverError>;
}

/// Malformed solver input.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Dimensions or values are unusable
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Objective produced a non-finite value or gradient
    #[error("Objective evaluation failed: {0}")]
    NonFinite(String),
}
