//! Ordered fallback of estimation strategies.

use crate::error::{EstimationError, Result};
use std::fmt;
use tangent_data::PriceHistory;

/// One way of producing an annualized expected return for an asset.
pub trait EstimationStrategy: fmt::Debug + Send + Sync {
    /// Short name used in reports and logs.
    fn name(&self) -> &str;

    /// Estimate the expected return of `asset` from `history`.
    fn estimate(&self, asset: &str, history: &PriceHistory) -> Result<f64>;
}

/// A failed attempt by one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// Strategy name
    pub strategy: String,
    /// Why it failed
    pub error: EstimationError,
}

/// Successful estimate and the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Annualized expected return
    pub value: f64,
    /// Name of the strategy that succeeded
    pub strategy: String,
    /// Strategies that failed before it
    pub fallbacks: Vec<Attempt>,
}

/// Strategies tried in order until one succeeds.
#[derive(Debug, Default)]
pub struct EstimationChain {
    strategies: Vec<Box<dyn EstimationStrategy>>,
}

impl EstimationChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy.
    pub fn then<S: EstimationStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Names of the strategies in order.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Number of strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the chain has no strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run the strategies in order. Returns every failed attempt when none
    /// succeeds. A non-finite value counts as a failure of that strategy.
    pub fn estimate(
        &self,
        asset: &str,
        history: &PriceHistory,
    ) -> std::result::Result<Estimate, Vec<Attempt>> {
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            let result = strategy.estimate(asset, history).and_then(|value| {
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(EstimationError::degenerate(asset, format!("{} returned {value}", strategy.name())))
                }
            });

            match result {
                Ok(value) => {
                    if !attempts.is_empty() {
                        tracing::warn!(
                            asset,
                            strategy = strategy.name(),
                            failed = attempts.len(),
                            "fell back to later estimation strategy"
                        );
                    }
                    return Ok(Estimate {
                        value,
                        strategy: strategy.name().to_string(),
                        fallbacks: attempts,
                    });
                }
                Err(error) => {
                    tracing::debug!(asset, strategy = strategy.name(), %error, "estimation strategy failed");
                    attempts.push(Attempt {
                        strategy: strategy.name().to_string(),
                        error,
                    });
                }
            }
        }

        Err(attempts)
    }
}
