#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod capm;
pub mod error;
pub mod estimator;
pub mod forecast;
pub mod frequency;
pub mod historical;
pub mod strategy;

pub use capm::{CapmConfig, CapmStrategy, MarketContext};
pub use error::{EstimationError, Result};
pub use estimator::{EstimationFailure, EstimationReport, ReturnEstimator};
pub use forecast::{
    Forecast, ForecastCollector, ForecastConfig, ForecastSet, ForecastStrategy,
    ForecastValidationError, parse_forecast,
};
pub use frequency::Frequency;
pub use historical::{HistoricalMean, HistoricalMeanConfig, MeanKind};
pub use strategy::{Attempt, Estimate, EstimationChain, EstimationStrategy};
