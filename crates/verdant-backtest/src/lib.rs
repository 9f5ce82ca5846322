#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/verdant-rs/verdant/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod metrics;

pub use engine::{BacktestEngine, BacktestOutcome, CoverageGap};
pub use error::{BacktestError, Result};
pub use metrics::PerformanceMetrics;
