//! Error type for end-to-end runs.

use tangent_data::DataError;
use tangent_optimize::{AlignmentError, BlendError, OptimizeError};
use tangent_output::{ExportError, GrowthError};
use tangent_returns::EstimationError;
use tangent_risk::RiskError;
use thiserror::Error;

/// Result type for runs.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a run, wrapping every stage's error.
#[derive(Debug, Error)]
pub enum Error {
    /// Price or forecast retrieval failed
    #[error(transparent)]
    Data(#[from] DataError),

    /// Market context for CAPM could not be built
    #[error(transparent)]
    Estimation(#[from] EstimationError),

    /// Covariance estimation failed
    #[error(transparent)]
    Risk(#[from] RiskError),

    /// Views and covariance share too few assets
    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    /// Prior and views could not be blended
    #[error(transparent)]
    Blend(#[from] BlendError),

    /// No allocation satisfies the constraints
    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    /// Growth simulation failed
    #[error(transparent)]
    Growth(#[from] GrowthError),

    /// Report export failed
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Fewer tickers with data than a portfolio needs
    #[error("Need at least {required} tickers with price data, got {count}")]
    TooFewTickers {
        /// Tickers with data
        count: usize,
        /// Minimum required
        required: usize,
    },

    /// Price history too short
    #[error("Insufficient history: need at least {required} price rows, got {actual}")]
    InsufficientHistory {
        /// Required number of rows
        required: usize,
        /// Rows available
        actual: usize,
    },

    /// External views were requested without a forecaster
    #[error("External forecast source selected but no forecaster configured")]
    MissingForecaster,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the run failed because the inputs lacked data, as opposed to a
    /// numerical or configuration problem.
    pub const fn is_data_shortage(&self) -> bool {
        matches!(
            self,
            Self::TooFewTickers { .. }
                | Self::InsufficientHistory { .. }
                | Self::Alignment(AlignmentError::TooFewAssets { .. })
        ) || matches!(self, Self::Data(e) if e.is_unavailable())
    }
}
