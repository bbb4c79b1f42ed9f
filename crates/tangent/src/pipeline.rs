//! End-to-end run: prices to weights.
//!
//! Stages, in order:
//!
//! 1. fetch prices for the tickers (plus benchmark and short rate for CAPM)
//! 2. drop tickers without data, then check ticker count and history length
//! 3. annualized sample covariance of daily returns
//! 4. one view per ticker from the configured source, with fallback
//! 5. align views and covariance, uniform market weights
//! 6. Black-Litterman posterior
//! 7. optimize, then build the report and growth series

use crate::config::{ForecastSource, RunConfig};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tangent_data::{DateRange, Forecaster, PriceHistory, PriceHistoryProvider};
use tangent_optimize::{
    AlignedInputs, AllocationResult, BlackLitterman, PortfolioOptimizer, PosteriorEstimate,
    ViewUncertainty,
};
use tangent_output::{AllocationReport, GrowthError, GrowthSeries, simulate_growth};
use tangent_returns::{EstimationReport, ForecastCollector, MarketContext, ReturnEstimator};
use tangent_risk::{CovarianceEstimator, CovarianceMatrix, ReturnPanel, SampleCovariance};
use tokio::sync::watch;

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Optimized weights and performance
    pub allocation: AllocationResult,
    /// Posterior returns, covariance and prior
    pub posterior: PosteriorEstimate,
    /// Views, their sources and per-asset failures
    pub estimation: EstimationReport,
    /// Sample covariance of the tickers with data
    pub covariance: CovarianceMatrix,
    /// Tickers dropped before optimization, with the reason
    pub dropped: BTreeMap<String, String>,
    /// Rendered allocation report
    pub report: AllocationReport,
    /// Simulated growth, when an investment amount is configured and the
    /// held assets share trading dates
    pub growth: Option<GrowthSeries>,
}

/// A configured run over one price provider.
pub struct Pipeline<P> {
    provider: P,
    forecaster: Option<Arc<dyn Forecaster>>,
    cancel: Option<watch::Receiver<bool>>,
    config: RunConfig,
}

impl<P: std::fmt::Debug> std::fmt::Debug for Pipeline<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("provider", &self.provider)
            .field("forecaster", &self.forecaster.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: PriceHistoryProvider> Pipeline<P> {
    /// Create a pipeline.
    pub const fn new(provider: P, config: RunConfig) -> Self {
        Self {
            provider,
            forecaster: None,
            cancel: None,
            config,
        }
    }

    /// Forecaster used when the source is [`ForecastSource::External`].
    pub fn with_forecaster(mut self, forecaster: Arc<dyn Forecaster>) -> Self {
        self.forecaster = Some(forecaster);
        self
    }

    /// Signal that stops dispatching forecast requests once it turns `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Configuration in use.
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every stage for `tickers` over `range`.
    pub async fn run(&self, tickers: &[String], range: DateRange) -> Result<RunOutcome> {
        self.config.validate()?;
        let config = &self.config;

        let tickers = unique(tickers);
        if tickers.len() < config.fetch.min_tickers {
            return Err(Error::TooFewTickers {
                count: tickers.len(),
                required: config.fetch.min_tickers,
            });
        }

        let history = self.fetch(&tickers, range).await?;
        let mut dropped = BTreeMap::new();
        let valid: Vec<String> = tickers
            .iter()
            .filter(|ticker| {
                let found = history.get(ticker).is_some();
                if !found {
                    let reason = history
                        .missing()
                        .get(ticker.as_str())
                        .map_or_else(|| "no price data".to_string(), ToString::to_string);
                    tracing::warn!(ticker = %ticker, %reason, "dropping ticker without prices");
                    dropped.insert((*ticker).clone(), reason);
                }
                found
            })
            .cloned()
            .collect();

        if valid.len() < config.fetch.min_tickers {
            return Err(Error::TooFewTickers {
                count: valid.len(),
                required: config.fetch.min_tickers,
            });
        }
        let rows = price_rows(&history, &valid);
        if rows < config.fetch.min_rows {
            return Err(Error::InsufficientHistory {
                required: config.fetch.min_rows,
                actual: rows,
            });
        }

        let covariance = self.covariance(&history, &valid)?;
        tracing::debug!(assets = valid.len(), rows, "estimated sample covariance");

        let (estimation, confidences) = self.views(&valid, &history).await?;
        for (asset, failure) in estimation.failures() {
            let reason = failure
                .primary()
                .map_or_else(|| "no estimate".to_string(), ToString::to_string);
            dropped.insert(asset.clone(), reason);
        }

        let aligned = AlignedInputs::new(estimation.views(), &covariance, None)?;
        for asset in &valid {
            if !aligned.universe().contains(asset) && !dropped.contains_key(asset) {
                dropped.insert(asset.clone(), "not in covariance".to_string());
            }
        }

        let uncertainty = match confidences {
            Some(confidences) if !confidences.is_empty() => ViewUncertainty::Confidences(confidences),
            _ => ViewUncertainty::Proportional,
        };
        let posterior = BlackLitterman::new(config.black_litterman.clone())?.blend(&aligned, &uncertainty)?;
        tracing::debug!(assets = aligned.len(), "blended views with equilibrium prior");

        let allocation = PortfolioOptimizer::from_posterior(&posterior, config.optimizer.clone())?
            .optimize(config.method)?;

        let mut report = AllocationReport::new(&allocation, config.risk_free_rate())
            .with_views(&estimation.views().to_map(), estimation.sources());
        for (asset, reason) in &dropped {
            report = report.with_dropped(asset.clone(), reason.clone());
        }
        let growth = match config.investment_amount {
            Some(amount) => {
                report = report.with_investment_amount(amount);
                match simulate_growth(&history, &allocation.to_map(), amount) {
                    Ok(growth) => Some(growth),
                    Err(GrowthError::NoCommonDates) => {
                        tracing::warn!("held assets share no trading dates, skipping growth simulation");
                        None
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => None,
        };

        let performance = allocation.performance();
        tracing::info!(
            method = %config.method,
            source = %config.source,
            assets = aligned.len(),
            dropped = dropped.len(),
            expected_return = performance.expected_return,
            volatility = performance.volatility,
            sharpe_ratio = performance.sharpe_ratio,
            "portfolio optimized"
        );

        Ok(RunOutcome {
            allocation,
            posterior,
            estimation,
            covariance,
            dropped,
            report,
            growth,
        })
    }

    async fn fetch(&self, tickers: &[String], range: DateRange) -> Result<PriceHistory> {
        let mut symbols = tickers.to_vec();
        if self.config.source == ForecastSource::Capm {
            for market in [&self.config.capm.benchmark, &self.config.capm.risk_free] {
                if !symbols.contains(market) {
                    symbols.push(market.clone());
                }
            }
        }
        tracing::debug!(symbols = symbols.len(), start = %range.start(), end = %range.end(), "fetching prices");
        Ok(self.provider.get_prices(&symbols, range).await?)
    }

    fn covariance(&self, history: &PriceHistory, assets: &[String]) -> Result<CovarianceMatrix> {
        let panel = ReturnPanel::from_columns(assets.iter().filter_map(|asset| {
            history.get(asset).map(|series| (asset.clone(), series.returns()))
        }))?;
        Ok(SampleCovariance::new(self.config.covariance.clone())?.estimate(&panel)?)
    }

    /// Views for `assets`, plus view confidences when forecasts drive Ω.
    async fn views(
        &self,
        assets: &[String],
        history: &PriceHistory,
    ) -> Result<(EstimationReport, Option<BTreeMap<String, f64>>)> {
        let config = &self.config;
        let historical = config.historical.clone();

        let (estimator, confidences) = match config.source {
            ForecastSource::HistoricalMean => (ReturnEstimator::historical(historical), None),
            ForecastSource::Capm => match MarketContext::from_history(history, &config.capm) {
                Ok(context) => (ReturnEstimator::capm(context, &config.capm, historical), None),
                Err(e) => {
                    tracing::warn!(error = %e, "market context unavailable, using historical means");
                    (ReturnEstimator::historical(historical), None)
                }
            },
            ForecastSource::External => {
                let forecaster = self.forecaster.clone().ok_or(Error::MissingForecaster)?;
                let forecasts = ForecastCollector::new(forecaster, config.forecast.clone())
                    .collect(assets, self.cancel.clone())
                    .await;
                let confidences = config
                    .use_forecast_confidence
                    .then(|| forecasts.view_confidences());
                (ReturnEstimator::external(forecasts, historical), confidences)
            }
        };

        Ok((estimator.estimate(assets, history), confidences))
    }
}

fn unique(tickers: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

/// Distinct price dates across `assets`.
fn price_rows(history: &PriceHistory, assets: &[String]) -> usize {
    assets
        .iter()
        .filter_map(|asset| history.get(asset))
        .flat_map(|series| series.dates().iter().copied())
        .collect::<BTreeSet<NaiveDate>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_normalizes_and_keeps_order() {
        let raw: Vec<String> = ["msft", " AAPL", "MSFT", "", "jnj"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(unique(&raw), vec!["MSFT", "AAPL", "JNJ"]);
    }
}
