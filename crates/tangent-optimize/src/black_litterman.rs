//! Black-Litterman blending of equilibrium returns with absolute views.
//!
//! With aligned inputs every asset carries one absolute view, so the pick
//! matrix is the identity and
//!
//! ```text
//! Π      = δ Σ w_mkt
//! E[R]   = Π + τΣ (τΣ + Ω)⁻¹ (Q − Π)
//! Σ_post = Σ + τΣ − τΣ (τΣ + Ω)⁻¹ τΣ
//! ```
//!
//! which equals the textbook `[(τΣ)⁻¹ + Ω⁻¹]⁻¹ [(τΣ)⁻¹Π + Ω⁻¹Q]` but stays
//! finite as Ω → 0.

use crate::alignment::AlignedInputs;
use crate::linalg::{self, Singular};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tangent_risk::{CovarianceMatrix, ReturnVector, RiskError};
use thiserror::Error;

/// Blending failures.
#[derive(Debug, Error)]
pub enum BlendError {
    /// A matrix that must be inverted is singular within tolerance
    #[error("{matrix} is singular (relative pivot {relative_pivot:e} at column {column})")]
    Singular {
        /// Which matrix
        matrix: &'static str,
        /// Column where elimination stopped
        column: usize,
        /// Relative pivot magnitude
        relative_pivot: f64,
    },

    /// The result contains non-finite values
    #[error("Numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    /// View uncertainty is malformed
    #[error("Invalid view uncertainty: {0}")]
    InvalidUncertainty(String),

    /// Invalid tau, risk aversion or tolerance
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Container error
    #[error(transparent)]
    Risk(#[from] RiskError),
}

impl BlendError {
    fn singular(matrix: &'static str, s: Singular) -> Self {
        Self::Singular {
            matrix,
            column: s.column,
            relative_pivot: s.relative_pivot,
        }
    }
}

/// Black-Litterman parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackLittermanConfig {
    /// Scales uncertainty of the prior (default: 0.05)
    pub tau: f64,
    /// Market risk aversion δ (default: 1.0)
    pub risk_aversion: f64,
    /// Relative pivot below which a matrix counts as singular (default: 1e-12)
    pub singular_tolerance: f64,
}

impl Default for BlackLittermanConfig {
    fn default() -> Self {
        Self {
            tau: 0.05,
            risk_aversion: 1.0,
            singular_tolerance: 1e-12,
        }
    }
}

/// Uncertainty Ω of the views.
#[derive(Debug, Clone, Default)]
pub enum ViewUncertainty {
    /// `Ω = diag(τΣ)`
    #[default]
    Proportional,
    /// Per-asset confidence `c ∈ (0, 1]`, giving `Ω_ii = (1/c − 1)(τΣ)_ii`.
    /// Assets without a confidence fall back to `(τΣ)_ii`.
    Confidences(BTreeMap<String, f64>),
    /// Explicit matrix over the view assets
    Explicit(CovarianceMatrix),
}

/// Posterior returns and covariance.
#[derive(Debug, Clone)]
pub struct PosteriorEstimate {
    returns: ReturnVector,
    covariance: CovarianceMatrix,
    prior: ReturnVector,
}

impl PosteriorEstimate {
    /// Posterior expected returns.
    pub const fn returns(&self) -> &ReturnVector {
        &self.returns
    }

    /// Posterior covariance `Σ + M`.
    pub const fn covariance(&self) -> &CovarianceMatrix {
        &self.covariance
    }

    /// Market-implied equilibrium returns Π.
    pub const fn prior(&self) -> &ReturnVector {
        &self.prior
    }
}

/// Black-Litterman model.
#[derive(Debug, Clone, Default)]
pub struct BlackLitterman {
    config: BlackLittermanConfig,
}

impl BlackLitterman {
    /// Create a model, validating parameters.
    pub fn new(config: BlackLittermanConfig) -> Result<Self, BlendError> {
        if !(config.tau.is_finite() && config.tau > 0.0) {
            return Err(BlendError::InvalidParameter(format!("tau must be positive, got {}", config.tau)));
        }
        if !(config.risk_aversion.is_finite() && config.risk_aversion > 0.0) {
            return Err(BlendError::InvalidParameter(format!(
                "risk aversion must be positive, got {}",
                config.risk_aversion
            )));
        }
        if !(config.singular_tolerance.is_finite() && config.singular_tolerance >= 0.0) {
            return Err(BlendError::InvalidParameter(format!(
                "singular tolerance must be non-negative, got {}",
                config.singular_tolerance
            )));
        }
        Ok(Self { config })
    }

    /// Parameters in use.
    pub const fn config(&self) -> &BlackLittermanConfig {
        &self.config
    }

    /// Equilibrium returns `Π = δ Σ w_mkt`.
    pub fn implied_returns(&self, inputs: &AlignedInputs) -> Array1<f64> {
        inputs
            .covariance()
            .values()
            .dot(&inputs.market_weights().values())
            * self.config.risk_aversion
    }

    fn omega(&self, inputs: &AlignedInputs, uncertainty: &ViewUncertainty) -> Result<Array2<f64>, BlendError> {
        let tau_sigma_diag = inputs.covariance().values().diag().mapv(|v| v * self.config.tau);
        match uncertainty {
            ViewUncertainty::Proportional => Ok(Array2::from_diag(&tau_sigma_diag)),
            ViewUncertainty::Confidences(confidences) => {
                if let Some((asset, c)) = confidences.iter().find(|(_, c)| !(**c > 0.0 && **c <= 1.0)) {
                    return Err(BlendError::InvalidUncertainty(format!(
                        "confidence for {asset} must be in (0, 1], got {c}"
                    )));
                }
                let diag = inputs
                    .universe()
                    .iter()
                    .zip(tau_sigma_diag.iter())
                    .map(|(asset, tau_var)| match confidences.get(asset) {
                        Some(c) => (1.0 / c - 1.0) * tau_var,
                        None => *tau_var,
                    })
                    .collect::<Array1<f64>>();
                Ok(Array2::from_diag(&diag))
            }
            ViewUncertainty::Explicit(omega) => {
                if !omega.is_square_labeled() {
                    return Err(BlendError::InvalidUncertainty(
                        "rows and columns must carry the same assets".to_string(),
                    ));
                }
                let omega = omega.select(inputs.universe())?.into_values();
                if let Some((i, v)) = omega.diag().iter().enumerate().find(|(_, v)| **v < 0.0) {
                    return Err(BlendError::InvalidUncertainty(format!(
                        "diagonal entry for {} is negative ({v})",
                        inputs.universe().assets()[i]
                    )));
                }
                Ok(omega)
            }
        }
    }

    /// Blend aligned views with the market prior.
    pub fn blend(
        &self,
        inputs: &AlignedInputs,
        uncertainty: &ViewUncertainty,
    ) -> Result<PosteriorEstimate, BlendError> {
        let n = inputs.len();
        let tol = self.config.singular_tolerance;
        let sigma = inputs.covariance().values();

        linalg::solve(sigma, &Array2::zeros((n, 0)), tol).map_err(|s| BlendError::singular("covariance", s))?;

        let prior = self.implied_returns(inputs);
        let views = inputs.view_values();
        let tau_sigma = sigma * self.config.tau;
        let omega = self.omega(inputs, uncertainty)?;

        // One solve gives both (τΣ + Ω)⁻¹(Q − Π) and (τΣ + Ω)⁻¹τΣ.
        let system = &tau_sigma + &omega;
        let excess = (&views - &prior).insert_axis(Axis(1));
        let rhs = ndarray::concatenate(Axis(1), &[excess.view(), tau_sigma.view()])
            .map_err(|e| BlendError::NumericDegeneracy(e.to_string()))?;
        let solved =
            linalg::solve(&system, &rhs, tol).map_err(|s| BlendError::singular("τΣ + Ω", s))?;

        let adjustment = tau_sigma.dot(&solved.column(0));
        let posterior = &prior + &adjustment;
        let shrink = &tau_sigma - &tau_sigma.dot(&solved.slice(ndarray::s![.., 1..]));
        let posterior_cov = linalg::symmetric_part(&(sigma + &shrink));

        if posterior.iter().any(|v| !v.is_finite()) {
            return Err(BlendError::NumericDegeneracy("posterior returns are not finite".to_string()));
        }

        let universe = inputs.universe();
        let label = |values: &Array1<f64>| {
            ReturnVector::new(universe.iter().zip(values.iter().copied()))
        };

        tracing::debug!(
            assets = n,
            tau = self.config.tau,
            risk_aversion = self.config.risk_aversion,
            "blended views with market prior"
        );

        Ok(PosteriorEstimate {
            returns: label(&posterior),
            covariance: CovarianceMatrix::square(universe.clone(), posterior_cov)?,
            prior: label(&prior),
        })
    }
}
