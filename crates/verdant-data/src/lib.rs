#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/verdant-rs/verdant/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod esg;
pub mod frames;
pub mod rates;
pub mod records;
pub mod series;
pub mod weights;

pub use error::{DataError, Result};
pub use esg::{EsgFeature, EsgObservation, EsgScores, derive_features};
pub use rates::{RiskFreeSeries, TRADING_DAYS};
pub use records::{CovarianceEntry, PerformanceRecord, ReturnRecord};
pub use series::{AssetSeries, FirstReturn, PricePanel, simple_returns};
pub use weights::{WEIGHT_TOLERANCE, WeightRow, WeightSnapshot, WeightVector};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
