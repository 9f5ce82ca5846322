#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/verdant-rs/verdant/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod pipeline;

// Re-export main types from sub-crates
pub use verdant_backtest as backtest;
pub use verdant_data as data;
pub use verdant_optimize as optimize;
pub use verdant_output as output;
pub use verdant_risk as risk;

pub use pipeline::{
    FeatureSet, FrontierReport, Pipeline, PipelineArtifacts, PipelineConfig, PipelineError, Stage,
    frontier_statistics, run_allocation, run_backtest, run_features, run_frontier,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
