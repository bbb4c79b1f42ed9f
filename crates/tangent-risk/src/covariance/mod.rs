//! Covariance estimation
//!
//! Estimators turn a [`ReturnPanel`] into an annualized, asset-labeled
//! [`CovarianceMatrix`].

pub mod sample;
pub mod utils;

pub use sample::{SampleCovariance, SampleCovarianceConfig};
pub use utils::{
    EigenDecomposition, PositiveDefiniteConfig, enforce_positive_definite,
    is_positive_semi_definite, jacobi_eigendecomp, symmetric_eigen,
};

use crate::error::Result;
use crate::labeled::CovarianceMatrix;
use crate::panel::ReturnPanel;

/// Trait for covariance matrix estimators
pub trait CovarianceEstimator {
    /// Estimate the annualized covariance of the panel's assets, labeled in
    /// panel column order.
    fn estimate(&self, returns: &ReturnPanel) -> Result<CovarianceMatrix>;
}
