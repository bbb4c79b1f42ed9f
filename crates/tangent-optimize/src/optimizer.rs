//! Long-only, fully invested mean-variance portfolios.
//!
//! - maximum Sharpe ratio: with `a = μ − r_f`, solve
//!   `min yᵀΣy  s.t.  aᵀy = 1, y ≥ 0` and take `w = y / Σy`
//! - minimum volatility: `min wᵀΣw` over the probability simplex
//!
//! Both are solved by the accelerated projected gradient in `solver`.
//! Weights below `weight_cutoff` are snapped to zero and the rest are
//! renormalized.

use crate::alignment::AlignedInputs;
use crate::black_litterman::PosteriorEstimate;
use crate::linalg::symmetric_part;
use crate::solver::{self, Solution, SolverSettings};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tangent_risk::covariance::symmetric_eigen;
use tangent_risk::{AssetUniverse, CovarianceMatrix, ReturnVector, RiskError};
use thiserror::Error;

/// Largest tolerated deviation of the weight sum from one.
const BUDGET_TOLERANCE: f64 = 1e-3;

/// Optimizer failures.
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// No portfolio satisfies the constraints
    #[error("Optimization infeasible: {reason}")]
    Infeasible {
        /// Why
        reason: String,
    },

    /// Covariance has a negative eigenvalue beyond tolerance
    #[error("Covariance is not positive semi-definite (minimum eigenvalue {min_eigenvalue:e})")]
    NotPositiveSemiDefinite {
        /// Smallest eigenvalue
        min_eigenvalue: f64,
    },

    /// Returns and covariance are not over the same ordered assets
    #[error("Inputs are not aligned: {0}")]
    Misaligned(String),

    /// Weights refer to an asset outside the universe
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// Weights contain a non-finite value
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    /// Portfolio variance is zero, so the Sharpe ratio is undefined
    #[error("Portfolio volatility is zero")]
    ZeroVolatility,

    /// Invalid configuration
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Container or eigen-decomposition error
    #[error(transparent)]
    Risk(#[from] RiskError),
}

impl OptimizeError {
    fn infeasible(reason: impl Into<String>) -> Self {
        Self::Infeasible { reason: reason.into() }
    }
}

/// Result type for optimization.
pub type Result<T> = std::result::Result<T, OptimizeError>;

/// Objective to optimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMethod {
    /// Maximum Sharpe ratio
    #[default]
    #[display("max_sharpe")]
    MaxSharpe,
    /// Minimum volatility
    #[display("min_volatility")]
    MinVolatility,
}

/// Optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Annual risk-free rate (default: 0.02)
    pub risk_free_rate: f64,
    /// Iteration cap (default: 10000)
    pub max_iterations: usize,
    /// Largest step, in max-norm, counted as converged (default: 1e-10)
    pub tolerance: f64,
    /// Weights below this are snapped to zero (default: 1e-4)
    pub weight_cutoff: f64,
    /// Most negative eigenvalue accepted in the covariance (default: 1e-10)
    pub psd_tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            max_iterations: 10_000,
            tolerance: 1e-10,
            weight_cutoff: 1e-4,
            psd_tolerance: 1e-10,
        }
    }
}

impl OptimizerConfig {
    fn validate(&self) -> Result<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(OptimizeError::InvalidParameter("risk-free rate must be finite".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(OptimizeError::InvalidParameter("max_iterations must be positive".to_string()));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(OptimizeError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(0.0..1.0).contains(&self.weight_cutoff) {
            return Err(OptimizeError::InvalidParameter(format!(
                "weight cutoff must be in [0, 1), got {}",
                self.weight_cutoff
            )));
        }
        if !(self.psd_tolerance.is_finite() && self.psd_tolerance >= 0.0) {
            return Err(OptimizeError::InvalidParameter(format!(
                "psd tolerance must be non-negative, got {}",
                self.psd_tolerance
            )));
        }
        Ok(())
    }
}

/// Expected return, volatility and Sharpe ratio of a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Annualized expected return
    pub expected_return: f64,
    /// Annualized volatility
    pub volatility: f64,
    /// `(expected_return - r_f) / volatility`
    pub sharpe_ratio: f64,
}

impl PerformanceSummary {
    /// Flat key-value form.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("expected_return".to_string(), self.expected_return),
            ("volatility".to_string(), self.volatility),
            ("sharpe_ratio".to_string(), self.sharpe_ratio),
        ])
    }
}

/// Optimized weights and their performance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    method: OptimizationMethod,
    weights: Vec<(String, f64)>,
    performance: PerformanceSummary,
    iterations: usize,
}

impl AllocationResult {
    /// Objective that produced the weights.
    pub const fn method(&self) -> OptimizationMethod {
        self.method
    }

    /// `(asset, weight)` pairs in universe order.
    pub fn weights(&self) -> &[(String, f64)] {
        &self.weights
    }

    /// Weight of `asset`.
    pub fn weight(&self, asset: &str) -> Option<f64> {
        self.weights.iter().find(|(a, _)| a == asset).map(|(_, w)| *w)
    }

    /// Performance of the weights.
    pub const fn performance(&self) -> &PerformanceSummary {
        &self.performance
    }

    /// Solver iterations used.
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Flat asset-to-weight mapping.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.weights.iter().cloned().collect()
    }
}

/// Mean-variance optimizer over one aligned set of returns and covariance.
#[derive(Debug, Clone)]
pub struct PortfolioOptimizer {
    config: OptimizerConfig,
    assets: AssetUniverse,
    expected: Array1<f64>,
    covariance: Array2<f64>,
    lipschitz: f64,
}

impl PortfolioOptimizer {
    /// Create an optimizer. Returns and covariance must carry the same assets
    /// in the same order, and the covariance must be positive semi-definite.
    pub fn new(expected: &ReturnVector, covariance: &CovarianceMatrix, config: OptimizerConfig) -> Result<Self> {
        config.validate()?;

        if !expected.is_clean() {
            return Err(OptimizeError::Misaligned(
                "expected returns contain duplicates or missing values".to_string(),
            ));
        }
        if !covariance.is_square_labeled() {
            return Err(OptimizeError::Misaligned(
                "covariance rows and columns differ".to_string(),
            ));
        }
        if expected.assets() != covariance.rows().assets() {
            return Err(OptimizeError::Misaligned(
                "expected returns and covariance list different assets".to_string(),
            ));
        }
        if expected.is_empty() {
            return Err(OptimizeError::infeasible("no assets"));
        }

        let sigma = symmetric_part(covariance.values());
        let eigen = symmetric_eigen(&sigma)?;
        let min_eigenvalue = eigen.min_eigenvalue();
        if min_eigenvalue < -config.psd_tolerance {
            return Err(OptimizeError::NotPositiveSemiDefinite { min_eigenvalue });
        }

        Ok(Self {
            lipschitz: 2.0 * eigen.max_eigenvalue().max(0.0),
            assets: covariance.rows().clone(),
            expected: expected.values(),
            covariance: sigma,
            config,
        })
    }

    /// Optimizer over a Black-Litterman posterior.
    pub fn from_posterior(posterior: &PosteriorEstimate, config: OptimizerConfig) -> Result<Self> {
        Self::new(posterior.returns(), posterior.covariance(), config)
    }

    /// Optimizer over aligned views and sample covariance.
    pub fn from_aligned(inputs: &AlignedInputs, config: OptimizerConfig) -> Result<Self> {
        Self::new(inputs.views(), inputs.covariance(), config)
    }

    /// Configuration in use.
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Asset universe.
    pub const fn assets(&self) -> &AssetUniverse {
        &self.assets
    }

    const fn settings(&self) -> SolverSettings {
        SolverSettings {
            max_iterations: self.config.max_iterations,
            tolerance: self.config.tolerance,
        }
    }

    /// Run `method`.
    pub fn optimize(&self, method: OptimizationMethod) -> Result<AllocationResult> {
        match method {
            OptimizationMethod::MaxSharpe => self.maximize_sharpe(),
            OptimizationMethod::MinVolatility => self.minimize_volatility(),
        }
    }

    /// Tangency portfolio.
    pub fn maximize_sharpe(&self) -> Result<AllocationResult> {
        let excess = self.expected.mapv(|mu| mu - self.config.risk_free_rate);
        let (best, best_excess) = excess
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        if best_excess <= 0.0 {
            return Err(OptimizeError::infeasible(format!(
                "no asset has expected return above the risk-free rate {}",
                self.config.risk_free_rate
            )));
        }

        let mut y0 = Array1::zeros(self.expected.len());
        y0[best] = 1.0 / best_excess;

        let solution = solver::fista(&self.covariance, y0, self.lipschitz, self.settings(), |v| {
            solver::project_budget(v, &excess)
        });

        let scale = solution.x.sum();
        if !(scale.is_finite() && scale > 0.0) {
            return Err(OptimizeError::infeasible(format!("solver returned scale {scale}")));
        }
        let weights = &solution.x / scale;
        self.finish(OptimizationMethod::MaxSharpe, weights, &solution)
    }

    /// Minimum-variance portfolio.
    pub fn minimize_volatility(&self) -> Result<AllocationResult> {
        let n = self.expected.len();
        let x0 = Array1::from_elem(n, 1.0 / n as f64);
        let solution = solver::fista(&self.covariance, x0, self.lipschitz, self.settings(), solver::project_simplex);
        let weights = solution.x.clone();
        self.finish(OptimizationMethod::MinVolatility, weights, &solution)
    }

    fn finish(&self, method: OptimizationMethod, weights: Array1<f64>, solution: &Solution) -> Result<AllocationResult> {
        if !solution.converged {
            tracing::warn!(
                %method,
                iterations = solution.iterations,
                "optimizer hit the iteration cap before converging"
            );
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(OptimizeError::infeasible("solver produced non-finite weights"));
        }

        let weights = clean_weights(&weights, self.config.weight_cutoff)?;
        let total = weights.sum();
        if weights.iter().any(|w| *w < 0.0) || (total - 1.0).abs() > BUDGET_TOLERANCE {
            return Err(OptimizeError::infeasible(format!(
                "weights violate constraints (sum {total})"
            )));
        }

        let performance = self.performance_of(&weights)?;
        tracing::info!(
            %method,
            iterations = solution.iterations,
            expected_return = performance.expected_return,
            volatility = performance.volatility,
            sharpe_ratio = performance.sharpe_ratio,
            "optimized portfolio"
        );

        Ok(AllocationResult {
            method,
            weights: self
                .assets
                .iter()
                .map(str::to_string)
                .zip(weights.iter().copied())
                .collect(),
            performance,
            iterations: solution.iterations,
        })
    }

    fn performance_of(&self, weights: &Array1<f64>) -> Result<PerformanceSummary> {
        let expected_return = weights.dot(&self.expected);
        let variance = weights.dot(&self.covariance.dot(weights));
        let volatility = variance.max(0.0).sqrt();
        if volatility <= 0.0 {
            return Err(OptimizeError::ZeroVolatility);
        }
        Ok(PerformanceSummary {
            expected_return,
            volatility,
            sharpe_ratio: (expected_return - self.config.risk_free_rate) / volatility,
        })
    }

    /// Performance of externally supplied weights. Assets outside the
    /// universe are rejected; universe assets not mentioned weigh zero.
    pub fn portfolio_performance(&self, weights: &BTreeMap<String, f64>) -> Result<PerformanceSummary> {
        if let Some(asset) = weights.keys().find(|a| !self.assets.contains(a)) {
            return Err(OptimizeError::UnknownAsset(asset.clone()));
        }
        if let Some((asset, w)) = weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(OptimizeError::InvalidWeights(format!("weight for {asset} is {w}")));
        }
        let vector = self
            .assets
            .iter()
            .map(|asset| weights.get(asset).copied().unwrap_or(0.0))
            .collect::<Array1<f64>>();
        self.performance_of(&vector)
    }
}

/// Zero out weights below `cutoff` and renormalize to sum to one.
pub fn clean_weights(weights: &Array1<f64>, cutoff: f64) -> Result<Array1<f64>> {
    let snapped = weights.mapv(|w| if w < cutoff { 0.0 } else { w });
    let total = snapped.sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(OptimizeError::infeasible("every weight fell below the cutoff"));
    }
    Ok(snapped / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    fn abc() -> AssetUniverse {
        AssetUniverse::new(["A", "B", "C"]).unwrap()
    }

    fn optimizer(mu: [f64; 3], sigma: Array2<f64>) -> Result<PortfolioOptimizer> {
        let expected = ReturnVector::new(["A", "B", "C"].into_iter().zip(mu));
        let covariance = CovarianceMatrix::square(abc(), sigma).unwrap();
        PortfolioOptimizer::new(&expected, &covariance, OptimizerConfig::default())
    }

    fn sigma() -> Array2<f64> {
        array![[0.04, 0.006, 0.008], [0.006, 0.03, 0.005], [0.008, 0.005, 0.035]]
    }

    #[rstest]
    #[case(OptimizationMethod::MaxSharpe)]
    #[case(OptimizationMethod::MinVolatility)]
    fn test_weights_on_simplex(#[case] method: OptimizationMethod) {
        let result = optimizer([0.12, 0.08, 0.10], sigma()).unwrap().optimize(method).unwrap();
        let total: f64 = result.weights().iter().map(|(_, w)| w).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
        assert!(result.weights().iter().all(|(_, w)| (0.0..=1.0).contains(w)));
        assert_eq!(result.method(), method);
    }

    #[test]
    fn test_max_sharpe_beats_min_volatility() {
        let opt = optimizer([0.12, 0.08, 0.10], sigma()).unwrap();
        let sharpe = opt.maximize_sharpe().unwrap().performance().sharpe_ratio;
        let min_vol = opt.minimize_volatility().unwrap();
        assert!(sharpe >= min_vol.performance().sharpe_ratio - 1e-9);
    }

    #[test]
    fn test_min_volatility_beats_equal_weight() {
        let opt = optimizer([0.12, 0.08, 0.10], sigma()).unwrap();
        let min_vol = opt.minimize_volatility().unwrap().performance().volatility;
        let equal: BTreeMap<String, f64> = ["A", "B", "C"].iter().map(|a| (a.to_string(), 1.0 / 3.0)).collect();
        let equal_vol = opt.portfolio_performance(&equal).unwrap().volatility;
        assert!(min_vol <= equal_vol + 1e-12);
    }

    #[test]
    fn test_uncorrelated_min_volatility_is_inverse_variance() {
        let opt = optimizer([0.1, 0.1, 0.1], Array2::from_diag(&array![0.04, 0.01, 0.04])).unwrap();
        let result = opt.minimize_volatility().unwrap();
        assert_abs_diff_eq!(result.weight("A").unwrap(), 1.0 / 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.weight("B").unwrap(), 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_dominated_asset_is_dropped() {
        // C earns less than the risk-free rate.
        let opt = optimizer([0.12, 0.10, 0.019], Array2::from_diag(&array![0.04, 0.04, 0.25])).unwrap();
        let result = opt.maximize_sharpe().unwrap();
        assert_eq!(result.weight("C"), Some(0.0));
    }

    #[test]
    fn test_no_return_above_risk_free_is_infeasible() {
        let err = optimizer([0.01, 0.02, 0.015], sigma()).unwrap().maximize_sharpe().unwrap_err();
        assert!(matches!(err, OptimizeError::Infeasible { .. }));
    }

    #[test]
    fn test_indefinite_covariance_rejected() {
        let indefinite = array![[0.04, 0.05, 0.0], [0.05, 0.04, 0.0], [0.0, 0.0, 0.04]];
        let err = optimizer([0.1, 0.1, 0.1], indefinite).unwrap_err();
        assert!(matches!(err, OptimizeError::NotPositiveSemiDefinite { min_eigenvalue } if min_eigenvalue < -0.005));
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let expected = ReturnVector::new([("B", 0.1), ("A", 0.1), ("C", 0.1)]);
        let covariance = CovarianceMatrix::square(abc(), sigma()).unwrap();
        let err = PortfolioOptimizer::new(&expected, &covariance, OptimizerConfig::default()).unwrap_err();
        assert!(matches!(err, OptimizeError::Misaligned(_)));
    }

    #[test]
    fn test_portfolio_performance_of_external_weights() {
        let opt = optimizer([0.12, 0.08, 0.10], sigma()).unwrap();
        let weights = BTreeMap::from([("A".to_string(), 1.0)]);
        let perf = opt.portfolio_performance(&weights).unwrap();

        assert_abs_diff_eq!(perf.expected_return, 0.12, epsilon = 1e-15);
        assert_abs_diff_eq!(perf.volatility, 0.2, epsilon = 1e-15);
        assert_abs_diff_eq!(perf.sharpe_ratio, 0.5, epsilon = 1e-12);
        assert_eq!(perf.to_map()["sharpe_ratio"], perf.sharpe_ratio);

        let unknown = BTreeMap::from([("Z".to_string(), 1.0)]);
        assert!(matches!(
            opt.portfolio_performance(&unknown),
            Err(OptimizeError::UnknownAsset(asset)) if asset == "Z"
        ));
    }

    #[test]
    fn test_clean_weights_snaps_and_renormalizes() {
        let cleaned = clean_weights(&array![0.59995, 0.00005, 0.4], 1e-4).unwrap();
        assert_eq!(cleaned[1], 0.0);
        assert_abs_diff_eq!(cleaned.sum(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_method_display() {
        assert_eq!(OptimizationMethod::MaxSharpe.to_string(), "max_sharpe");
        assert_eq!(OptimizationMethod::MinVolatility.to_string(), "min_volatility");
    }
}
