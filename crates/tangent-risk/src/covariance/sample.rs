//! Sample covariance over pairwise-complete observations.

use super::CovarianceEstimator;
use super::utils::{PositiveDefiniteConfig, enforce_positive_definite, symmetric_eigen};
use crate::error::{Result, RiskError};
use crate::labeled::CovarianceMatrix;
use crate::panel::ReturnPanel;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Sample covariance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleCovarianceConfig {
    /// Annualization factor (default: 252)
    pub periods_per_year: f64,
    /// Minimum overlapping observations per asset pair (default: 2)
    pub min_observations: usize,
    /// Clip negative eigenvalues when the estimate is not PSD (default: true)
    pub repair: bool,
    /// Eigenvalues above `-psd_tolerance` count as non-negative (default: 1e-12)
    pub psd_tolerance: f64,
    /// Smallest eigenvalue after repair, as a fraction of the mean variance
    /// (default: 1e-8)
    pub repair_floor: f64,
}

impl Default for SampleCovarianceConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            min_observations: 2,
            repair: true,
            psd_tolerance: 1e-12,
            repair_floor: 1e-8,
        }
    }
}

/// Annualized sample covariance with `n - 1` denominators.
///
/// Each entry uses the dates on which both assets have a return, so the
/// result need not be PSD when histories differ; such estimates are
/// repaired spectrally unless `repair` is off.
#[derive(Debug, Clone, Default)]
pub struct SampleCovariance {
    config: SampleCovarianceConfig,
}

impl SampleCovariance {
    /// Create an estimator with the given configuration
    pub fn new(config: SampleCovarianceConfig) -> Result<Self> {
        if !(config.periods_per_year.is_finite() && config.periods_per_year > 0.0) {
            return Err(RiskError::InvalidParameter(format!(
                "periods_per_year must be positive, got {}",
                config.periods_per_year
            )));
        }
        if !(config.repair_floor.is_finite() && config.repair_floor >= 0.0) {
            return Err(RiskError::InvalidParameter(format!(
                "repair_floor must be non-negative, got {}",
                config.repair_floor
            )));
        }
        Ok(Self {
            config: SampleCovarianceConfig {
                min_observations: config.min_observations.max(2),
                ..config
            },
        })
    }

    /// Configuration in use.
    pub const fn config(&self) -> &SampleCovarianceConfig {
        &self.config
    }
}

fn covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    x.iter()
        .zip(y)
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum::<f64>()
        / (n - 1.0)
}

impl CovarianceEstimator for SampleCovariance {
    fn estimate(&self, returns: &ReturnPanel) -> Result<CovarianceMatrix> {
        let assets = returns.assets();
        let n = assets.len();
        let mut values = Array2::<f64>::zeros((n, n));

        for i in 0..n {
            for j in i..n {
                let (x, y) = returns.pairwise(i, j)?;
                if x.len() < self.config.min_observations {
                    return Err(RiskError::InsufficientHistory {
                        context: format!("covariance of {} and {}", assets.assets()[i], assets.assets()[j]),
                        required: self.config.min_observations,
                        actual: x.len(),
                    });
                }
                let cov = covariance(&x, &y) * self.config.periods_per_year;
                values[[i, j]] = cov;
                values[[j, i]] = cov;
            }
        }

        let min_eigenvalue = symmetric_eigen(&values)?.min_eigenvalue();
        if min_eigenvalue < -self.config.psd_tolerance {
            if !self.config.repair {
                return Err(RiskError::NotPositiveSemiDefinite { min_eigenvalue });
            }
            tracing::warn!(
                min_eigenvalue,
                "sample covariance is not positive semi-definite, clipping eigenvalues"
            );
            let defaults = PositiveDefiniteConfig::default();
            let mean_variance = values.diag().sum() / n as f64;
            let floor = (self.config.repair_floor * mean_variance).max(defaults.min_eigenvalue);
            values = enforce_positive_definite(
                &values,
                &PositiveDefiniteConfig {
                    min_eigenvalue: floor,
                    ..defaults
                },
            )?;
        }

        tracing::debug!(assets = n, periods = returns.n_periods(), "estimated sample covariance");
        CovarianceMatrix::square(assets.clone(), values)
    }
}
