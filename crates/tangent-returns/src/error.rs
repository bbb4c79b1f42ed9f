//! Error types for return estimation.

use crate::forecast::ForecastValidationError;
use thiserror::Error;

/// Result type for return estimation.
pub type Result<T> = std::result::Result<T, EstimationError>;

/// Why a strategy could not produce an estimate for an asset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    /// No price, benchmark or forecast data for the requested asset
    #[error("Data unavailable for {asset}: {reason}")]
    DataUnavailable {
        /// Asset or series queried
        asset: String,
        /// What was missing
        reason: String,
    },

    /// Too few observations
    #[error("Insufficient history for {asset}: need at least {required} observations, got {actual}")]
    InsufficientHistory {
        /// Asset or series queried
        asset: String,
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Computation produced a non-finite or degenerate value
    #[error("Numeric degeneracy for {asset}: {reason}")]
    NumericDegeneracy {
        /// Asset or series queried
        asset: String,
        /// Description of the degeneracy
        reason: String,
    },

    /// External forecast failed validation
    #[error("Invalid forecast for {asset}: {source}")]
    ForecastValidation {
        /// Asset queried
        asset: String,
        /// Validation failure
        source: ForecastValidationError,
    },

    /// Forecast source request failed
    #[error("Forecaster request for {asset} failed: {reason}")]
    Forecaster {
        /// Asset queried
        asset: String,
        /// Transport or service error message
        reason: String,
    },

    /// Forecast source did not answer before the deadline
    #[error("Forecast for {asset} timed out after {after_ms}ms")]
    Timeout {
        /// Asset queried
        asset: String,
        /// Deadline in milliseconds
        after_ms: u64,
    },

    /// Collection was cancelled before the forecast completed
    #[error("Forecast for {asset} was cancelled")]
    Cancelled {
        /// Asset queried
        asset: String,
    },

    /// Invalid estimator configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EstimationError {
    /// Shorthand for [`EstimationError::DataUnavailable`].
    pub fn unavailable(asset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            asset: asset.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`EstimationError::NumericDegeneracy`].
    pub fn degenerate(asset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NumericDegeneracy {
            asset: asset.into(),
            reason: reason.into(),
        }
    }
}
