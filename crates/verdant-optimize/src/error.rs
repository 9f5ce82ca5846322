//! Error types for portfolio optimization.

use crate::solver::SolverError;
use thiserror::Error;

/// Errors raised by the optimizers and the allocator.
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// Not enough data to form the required inputs
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Constraint set is empty by construction; detected before solving
    #[error("Infeasible constraint: {0}")]
    InfeasibleConstraint(String),

    /// The solver did not reach a feasible, converged point
    #[error("Optimization failed: {0}")]
    OptimizationFailed(String),

    /// Statistics or covariance error
    #[error("Risk error: {0}")]
    Risk(#[from] verdant_risk::RiskError),

    /// Input data error
    #[error("Data error: {0}")]
    Data(#[from] verdant_data::DataError),
}

impl From<SolverError> for OptimizeError {
    fn from(err: SolverError) -> Self {
        Self::OptimizationFailed(err.to_string())
    }
}

/// Result type for optimization operations
pub type Result<T> = std::result::Result<T, OptimizeError>;
