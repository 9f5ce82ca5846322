#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/verdant-rs/verdant/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod covariance;
pub mod error;
pub mod statistics;

// Re-export main types
pub use covariance::{
    ConditioningConfig, CovarianceEstimator, CovarianceMatrix, RollingCovarianceBuilder,
    RollingCovarianceConfig, SampleCovarianceEstimator,
};
pub use error::RiskError;
pub use statistics::{ExcessReturnStats, StatisticsEngine};
