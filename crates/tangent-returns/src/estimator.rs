//! Per-asset expected return estimation over a batch of assets.

use crate::capm::{CapmConfig, CapmStrategy, MarketContext};
use crate::error::EstimationError;
use crate::forecast::{ForecastSet, ForecastStrategy};
use crate::historical::{HistoricalMean, HistoricalMeanConfig};
use crate::strategy::{Attempt, EstimationChain};
use std::collections::BTreeMap;
use tangent_data::PriceHistory;
use tangent_risk::ReturnVector;

/// Label used when an asset has no price history at all.
const PRICE_HISTORY: &str = "price_history";

/// Every failed attempt for an asset that was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationFailure {
    /// Asset identifier
    pub asset: String,
    /// Attempts in chain order
    pub attempts: Vec<Attempt>,
}

impl EstimationFailure {
    /// The error from the first strategy tried.
    pub fn primary(&self) -> Option<&EstimationError> {
        self.attempts.first().map(|a| &a.error)
    }
}

/// Outcome of estimating a batch of assets.
#[derive(Debug, Clone, Default)]
pub struct EstimationReport {
    views: ReturnVector,
    sources: BTreeMap<String, String>,
    failures: BTreeMap<String, EstimationFailure>,
}

impl EstimationReport {
    /// Estimates for the assets that succeeded, in request order.
    pub const fn views(&self) -> &ReturnVector {
        &self.views
    }

    /// Consume the report, keeping the views.
    pub fn into_views(self) -> ReturnVector {
        self.views
    }

    /// Strategy that produced each estimate.
    pub const fn sources(&self) -> &BTreeMap<String, String> {
        &self.sources
    }

    /// Assets with no estimate.
    pub const fn failures(&self) -> &BTreeMap<String, EstimationFailure> {
        &self.failures
    }

    /// Failure for `asset`, if it was dropped.
    pub fn failure(&self, asset: &str) -> Option<&EstimationFailure> {
        self.failures.get(asset)
    }
}

/// Runs an [`EstimationChain`] independently for each asset.
#[derive(Debug)]
pub struct ReturnEstimator {
    chain: EstimationChain,
}

impl ReturnEstimator {
    /// Estimator over an arbitrary chain.
    pub const fn new(chain: EstimationChain) -> Self {
        Self { chain }
    }

    /// CAPM, falling back to the historical mean.
    pub fn capm(context: MarketContext, capm: &CapmConfig, historical: HistoricalMeanConfig) -> Self {
        Self::new(
            EstimationChain::new()
                .then(CapmStrategy::new(context, capm))
                .then(HistoricalMean::new(historical)),
        )
    }

    /// External forecasts, falling back to the historical mean.
    pub fn external(forecasts: ForecastSet, historical: HistoricalMeanConfig) -> Self {
        Self::new(
            EstimationChain::new()
                .then(ForecastStrategy::new(forecasts))
                .then(HistoricalMean::new(historical)),
        )
    }

    /// Historical mean only.
    pub fn historical(historical: HistoricalMeanConfig) -> Self {
        Self::new(EstimationChain::new().then(HistoricalMean::new(historical)))
    }

    /// The strategy chain in use.
    pub const fn chain(&self) -> &EstimationChain {
        &self.chain
    }

    /// Estimate every asset in `assets`. Failures are recorded per asset and
    /// never abort the batch.
    pub fn estimate(&self, assets: &[String], history: &PriceHistory) -> EstimationReport {
        let mut views = Vec::with_capacity(assets.len());
        let mut sources = BTreeMap::new();
        let mut failures = BTreeMap::new();

        for asset in assets {
            if history.get(asset).is_none() {
                let reason = history
                    .missing()
                    .get(asset)
                    .map_or_else(|| "no price history".to_string(), |e| e.to_string());
                tracing::warn!(asset = asset.as_str(), %reason, "dropping asset without price history");
                failures.insert(
                    asset.clone(),
                    EstimationFailure {
                        asset: asset.clone(),
                        attempts: vec![Attempt {
                            strategy: PRICE_HISTORY.to_string(),
                            error: EstimationError::unavailable(asset, reason),
                        }],
                    },
                );
                continue;
            }

            match self.chain.estimate(asset, history) {
                Ok(estimate) => {
                    tracing::debug!(
                        asset = asset.as_str(),
                        value = estimate.value,
                        strategy = estimate.strategy.as_str(),
                        "estimated expected return"
                    );
                    views.push((asset.clone(), estimate.value));
                    sources.insert(asset.clone(), estimate.strategy);
                }
                Err(attempts) => {
                    tracing::warn!(
                        asset = asset.as_str(),
                        attempts = attempts.len(),
                        "every estimation strategy failed, dropping asset"
                    );
                    failures.insert(
                        asset.clone(),
                        EstimationFailure {
                            asset: asset.clone(),
                            attempts,
                        },
                    );
                }
            }
        }

        tracing::info!(
            estimated = views.len(),
            dropped = failures.len(),
            chain = ?self.chain.names(),
            "return estimation finished"
        );

        EstimationReport {
            views: ReturnVector::new(views),
            sources,
            failures,
        }
    }
}
