//! Concurrent forecast retrieval.

use super::{Forecast, ForecastConfig, parse_forecast};
use crate::error::{EstimationError, Result};
use crate::strategy::EstimationStrategy;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tangent_data::{Forecaster, PriceHistory};
use tokio::sync::watch;

/// Per-asset forecast outcomes, keyed by ticker.
#[derive(Debug, Clone, Default)]
pub struct ForecastSet {
    results: BTreeMap<String, Result<Forecast>>,
}

impl ForecastSet {
    /// Build from explicit outcomes.
    pub fn from_results<I: IntoIterator<Item = (String, Result<Forecast>)>>(results: I) -> Self {
        Self {
            results: results.into_iter().collect(),
        }
    }

    /// Outcome for `ticker`, if it was requested.
    pub fn get(&self, ticker: &str) -> Option<&Result<Forecast>> {
        self.results.get(ticker)
    }

    /// Successful forecasts.
    pub fn forecasts(&self) -> impl Iterator<Item = (&str, &Forecast)> + '_ {
        self.results
            .iter()
            .filter_map(|(ticker, result)| result.as_ref().ok().map(|f| (ticker.as_str(), f)))
    }

    /// Failed requests.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &EstimationError)> + '_ {
        self.results
            .iter()
            .filter_map(|(ticker, result)| result.as_ref().err().map(|e| (ticker.as_str(), e)))
    }

    /// View confidences of successful forecasts.
    pub fn view_confidences(&self) -> BTreeMap<String, f64> {
        self.forecasts()
            .map(|(ticker, forecast)| (ticker.to_string(), forecast.view_confidence()))
            .collect()
    }

    /// Number of requested tickers.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing was requested.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Fetches forecasts for many tickers with bounded concurrency, a
/// per-ticker deadline and cooperative cancellation.
pub struct ForecastCollector {
    forecaster: Arc<dyn Forecaster>,
    config: ForecastConfig,
}

impl std::fmt::Debug for ForecastCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastCollector")
            .field("forecaster", &self.forecaster.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ForecastCollector {
    /// Create a collector.
    pub fn new(forecaster: Arc<dyn Forecaster>, config: ForecastConfig) -> Self {
        Self { forecaster, config }
    }

    async fn fetch_one(&self, ticker: &str) -> Result<Forecast> {
        let deadline = Duration::from_millis(self.config.timeout_ms);
        let raw = tokio::time::timeout(deadline, self.forecaster.forecast(ticker))
            .await
            .map_err(|_| EstimationError::Timeout {
                asset: ticker.to_string(),
                after_ms: self.config.timeout_ms,
            })?
            .map_err(|e| EstimationError::Forecaster {
                asset: ticker.to_string(),
                reason: e.to_string(),
            })?;

        parse_forecast(&raw, self.config.max_abs_return).map_err(|source| {
            EstimationError::ForecastValidation {
                asset: ticker.to_string(),
                source,
            }
        })
    }

    /// Collect forecasts for `tickers`.
    ///
    /// Once `cancel` turns `true` no further requests are started and
    /// in-flight requests are abandoned; forecasts already collected are
    /// kept and the rest are recorded as [`EstimationError::Cancelled`].
    pub async fn collect(&self, tickers: &[String], cancel: Option<watch::Receiver<bool>>) -> ForecastSet {
        let cancelled = async move {
            if let Some(mut rx) = cancel {
                if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                    return;
                }
            }
            // No signal, or the sender went away without cancelling.
            std::future::pending::<()>().await;
        };

        let collected: Vec<(String, Result<Forecast>)> = stream::iter(tickers.iter().cloned())
            .map(|ticker| async move {
                let result = self.fetch_one(&ticker).await;
                (ticker, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .take_until(cancelled)
            .collect()
            .await;

        let mut results: BTreeMap<String, Result<Forecast>> = collected.into_iter().collect();
        for ticker in tickers {
            results.entry(ticker.clone()).or_insert_with(|| {
                Err(EstimationError::Cancelled {
                    asset: ticker.clone(),
                })
            });
        }

        let set = ForecastSet { results };
        for (ticker, error) in set.failures() {
            tracing::warn!(ticker, source = self.forecaster.name(), %error, "forecast unavailable");
        }
        tracing::info!(
            requested = tickers.len(),
            succeeded = set.forecasts().count(),
            "collected external forecasts"
        );
        set
    }
}

/// Looks up a pre-collected forecast for each asset.
#[derive(Debug, Clone)]
pub struct ForecastStrategy {
    forecasts: ForecastSet,
}

impl ForecastStrategy {
    /// Create a strategy over collected forecasts.
    pub const fn new(forecasts: ForecastSet) -> Self {
        Self { forecasts }
    }
}

impl EstimationStrategy for ForecastStrategy {
    fn name(&self) -> &str {
        "external_forecast"
    }

    fn estimate(&self, asset: &str, _history: &PriceHistory) -> Result<f64> {
        match self.forecasts.get(asset) {
            Some(Ok(forecast)) => Ok(forecast.expected_return),
            Some(Err(error)) => Err(error.clone()),
            None => Err(EstimationError::unavailable(asset, "no forecast requested")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tangent_data::DataError;

    #[derive(Debug)]
    struct Scripted;

    #[async_trait]
    impl Forecaster for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn forecast(&self, ticker: &str) -> tangent_data::Result<String> {
            match ticker {
                "GOOD" => Ok(r#"{"expected_return": 0.12, "confidence": 75}"#.to_string()),
                "BAD" => Ok("{'expected_return': 0.12}".to_string()),
                "DOWN" => Err(DataError::Http("503".to_string())),
                "SLOW" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(r#"{"expected_return": 0.1, "confidence": 50}"#.to_string())
                }
                _ => Err(DataError::missing(ticker, "unknown")),
            }
        }
    }

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_keyed_by_ticker() {
        let collector = ForecastCollector::new(
            Arc::new(Scripted),
            ForecastConfig {
                timeout_ms: 1_000,
                ..Default::default()
            },
        );
        let set = collector
            .collect(&tickers(&["SLOW", "GOOD", "BAD", "DOWN"]), None)
            .await;

        assert_eq!(set.len(), 4);
        assert_eq!(set.get("GOOD").unwrap().as_ref().unwrap().expected_return, 0.12);
        assert!(matches!(set.get("BAD"), Some(Err(EstimationError::ForecastValidation { .. }))));
        assert!(matches!(set.get("DOWN"), Some(Err(EstimationError::Forecaster { .. }))));
        assert!(matches!(
            set.get("SLOW"),
            Some(Err(EstimationError::Timeout { after_ms: 1_000, .. }))
        ));
        assert_eq!(set.view_confidences().get("GOOD"), Some(&0.75));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_keeps_completed_forecasts() {
        let collector = ForecastCollector::new(
            Arc::new(Scripted),
            ForecastConfig {
                timeout_ms: 7_200_000,
                concurrency: 2,
                ..Default::default()
            },
        );
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let _ = tx.send(true);
        });

        let set = collector.collect(&tickers(&["GOOD", "SLOW"]), Some(rx)).await;

        assert!(matches!(set.get("GOOD"), Some(Ok(_))));
        assert!(matches!(set.get("SLOW"), Some(Err(EstimationError::Cancelled { .. }))));
    }

    #[tokio::test]
    async fn test_dropped_sender_does_not_cancel() {
        let collector = ForecastCollector::new(Arc::new(Scripted), ForecastConfig::default());
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let set = collector.collect(&tickers(&["GOOD"]), Some(rx)).await;
        assert!(matches!(set.get("GOOD"), Some(Ok(_))));
    }

    #[tokio::test]
    async fn test_strategy_reports_failures() {
        let set = ForecastSet::from_results([
            (
                "A".to_string(),
                Ok(Forecast {
                    expected_return: 0.05,
                    confidence: 10.0,
                }),
            ),
            (
                "B".to_string(),
                Err(EstimationError::Cancelled {
                    asset: "B".to_string(),
                }),
            ),
        ]);
        let strategy = ForecastStrategy::new(set);
        let history = PriceHistory::new();

        assert_eq!(strategy.estimate("A", &history).unwrap(), 0.05);
        assert!(matches!(
            strategy.estimate("B", &history),
            Err(EstimationError::Cancelled { .. })
        ));
        assert!(matches!(
            strategy.estimate("C", &history),
            Err(EstimationError::DataUnavailable { .. })
        ));
    }
}
