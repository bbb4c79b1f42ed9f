#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod alignment;
pub mod black_litterman;
pub mod linalg;
pub mod optimizer;
mod solver;

pub use alignment::{AlignedInputs, AlignmentError, MIN_ALIGNED_ASSETS};
pub use black_litterman::{
    BlackLitterman, BlackLittermanConfig, BlendError, PosteriorEstimate, ViewUncertainty,
};
pub use optimizer::{
    AllocationResult, OptimizationMethod, OptimizeError, OptimizerConfig, PerformanceSummary,
    PortfolioOptimizer,
};
