#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export main types from sub-crates
pub use tangent_data as data;
pub use tangent_optimize as optimize;
pub use tangent_output as output;
pub use tangent_returns as returns;
pub use tangent_risk as risk;

pub use config::{FetchConfig, ForecastSource, RunConfig};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunOutcome};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
