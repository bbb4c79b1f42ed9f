#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod covariance;
pub mod error;
pub mod labeled;
pub mod panel;
pub mod universe;

pub use covariance::{CovarianceEstimator, SampleCovariance, SampleCovarianceConfig};
pub use error::{Result, RiskError};
pub use labeled::{CovarianceMatrix, MarketWeights, ReturnVector};
pub use panel::ReturnPanel;
pub use universe::AssetUniverse;
