#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/verdant-rs/verdant/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod allocator;
pub mod config;
pub mod constrained;
pub mod error;
pub mod frontier;
pub mod sharpe;
pub mod solver;

pub use allocator::{
    AllocationArtifacts, MeanVarianceObjective, PortfolioStats, TemporalAllocator,
    expected_returns,
};
pub use config::{AllocatorConfig, OptimizerConfig, SolverConfig};
pub use constrained::{ConstrainedOptimizer, OptimizationResult};
pub use error::{OptimizeError, Result};
pub use frontier::{EsgGrid, FrontierIter, FrontierPoint, FrontierSweeper};
pub use sharpe::{AssetSharpe, SharpeObjective, asset_sharpes, sharpe_ratio};
pub use solver::{
    LinearEquality, Objective, Problem, ProjectedGradientSolver, Solution, Solver, SolverError,
};
