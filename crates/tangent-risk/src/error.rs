//! Error types for risk containers and covariance estimation.

use thiserror::Error;

/// Result type for risk operations.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors raised by labeled containers and covariance estimators.
#[derive(Debug, Error)]
pub enum RiskError {
    /// The same asset appears more than once where uniqueness is required
    #[error("Duplicate asset: {0}")]
    DuplicateAsset(String),

    /// An asset label was not found
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// Not enough overlapping observations
    #[error("Insufficient history for {context}: need at least {required} observations, got {actual}")]
    InsufficientHistory {
        /// What was being estimated
        context: String,
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// A value that must be finite was not
    #[error("Non-finite value for {0}")]
    NonFinite(String),

    /// Weights that must be non-negative and sum to a positive total did not
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    /// Matrix is not positive semi-definite
    #[error("Matrix is not positive semi-definite (minimum eigenvalue {min_eigenvalue:e})")]
    NotPositiveSemiDefinite {
        /// Smallest eigenvalue found
        min_eigenvalue: f64,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
