//! Optimizer, allocator and solver configuration.
//!
//! Every struct carries documented defaults and is passed explicitly to the
//! component that uses it.

use serde::{Deserialize, Serialize};

/// Sharpe/ESG optimizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Lower bound on every weight (default: 0.01)
    pub min_allocation: f64,

    /// Upper bound on every weight (default: 1.0)
    pub max_allocation: f64,

    /// ESG spreads below this drop the ESG equality (default: 1e-8)
    pub esg_epsilon: f64,

    /// Spacing of the frontier's target ESG grid (default: 0.01)
    pub frontier_step: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_allocation: 0.01,
            max_allocation: 1.0,
            esg_epsilon: 1e-8,
            frontier_step: 0.01,
        }
    }
}

/// Mean-variance allocator configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Risk aversion λ in `μᵀw − λ·wᵀΣw` (default: 5.0)
    pub risk_aversion: f64,

    /// Per-asset weight ceiling (default: 0.07)
    pub weight_cap: f64,

    /// Calendar days in the expected-return lookback, inclusive of the
    /// target date (default: 20)
    pub lookback_days: u32,

    /// Floor applied to the covariance diagonal (default: 1e-6)
    pub diagonal_floor: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            risk_aversion: 5.0,
            weight_cap: 0.07,
            lookback_days: 20,
            diagonal_floor: 1e-6,
        }
    }
}

/// Iterative solver configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum number of iterations (default: 2500)
    pub max_iterations: usize,

    /// Convergence tolerance on the iterate change (default: 1e-10)
    pub tolerance: f64,

    /// Allowed constraint violation at the solution (default: 1e-9)
    pub feasibility_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2500,
            tolerance: 1e-10,
            feasibility_tolerance: 1e-9,
        }
    }
}
