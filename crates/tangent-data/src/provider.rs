//! Price-history providers.
//!
//! [`PriceHistoryProvider`] is the boundary between the portfolio pipeline and
//! whatever market-data source backs it. Providers drop invalid tickers and
//! report them in [`PriceHistory::missing`]; a batch only fails when no ticker
//! returned data at all.

use crate::cache::SqliteCache;
use crate::error::{DataError, Result};
use crate::prices::{DateRange, PriceHistory, PriceSeries};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Source of adjusted price histories.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// Fetch prices for `tickers` over `range`.
    ///
    /// Tickers without usable data are listed in [`PriceHistory::missing`].
    /// Returns [`DataError::MissingData`] only when every ticker failed.
    async fn get_prices(&self, tickers: &[String], range: DateRange) -> Result<PriceHistory>;
}

/// Fail the batch when nothing came back.
pub(crate) fn ensure_any(history: PriceHistory) -> Result<PriceHistory> {
    if history.is_empty() {
        return Err(DataError::missing("batch", "No data fetched for any symbol"));
    }
    Ok(history)
}

/// In-memory provider serving pre-loaded series.
///
/// Used for offline runs and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticPriceProvider {
    series: BTreeMap<String, PriceSeries>,
}

impl StaticPriceProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series, replacing any existing series for the same symbol.
    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.symbol().to_string(), series);
        self
    }

    /// Symbols this provider can serve.
    pub fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }
}

#[async_trait]
impl PriceHistoryProvider for StaticPriceProvider {
    async fn get_prices(&self, tickers: &[String], range: DateRange) -> Result<PriceHistory> {
        let mut history = PriceHistory::new();
        for ticker in tickers {
            match self.series.get(ticker) {
                Some(series) => history.insert(series.within(&range)),
                None => {
                    history.insert_missing(ticker.clone(), DataError::missing(ticker, "Unknown symbol"))
                }
            }
        }
        ensure_any(history)
    }
}

/// Provider wrapper that serves cached quotes and stores fresh fetches.
///
/// The cache is owned by the wrapper; the inner provider never sees it.
#[derive(Debug)]
pub struct CachedPriceProvider<P> {
    inner: P,
    cache: Mutex<SqliteCache>,
    force_refresh: bool,
}

impl<P: PriceHistoryProvider> CachedPriceProvider<P> {
    /// Wrap `inner` with `cache`.
    pub const fn new(inner: P, cache: SqliteCache) -> Self {
        Self {
            inner,
            cache: Mutex::new(cache),
            force_refresh: false,
        }
    }

    /// Ignore cached data and re-fetch everything (fetched data is still stored).
    pub const fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SqliteCache>> {
        self.cache
            .lock()
            .map_err(|_| DataError::Cache("Cache mutex poisoned".to_string()))
    }

    fn cached(&self, tickers: &[String], range: &DateRange) -> Result<(PriceHistory, Vec<String>)> {
        let mut history = PriceHistory::new();
        let mut to_fetch = Vec::new();
        if self.force_refresh {
            return Ok((history, tickers.to_vec()));
        }

        let cache = self.lock()?;
        for ticker in tickers {
            let hit = cache
                .has_quotes(ticker, range)
                .unwrap_or(false)
                .then(|| cache.get_series(ticker, range).ok())
                .flatten();
            match hit {
                Some(series) => history.insert(series),
                None => to_fetch.push(ticker.clone()),
            }
        }
        Ok((history, to_fetch))
    }
}

#[async_trait]
impl<P: PriceHistoryProvider> PriceHistoryProvider for CachedPriceProvider<P> {
    async fn get_prices(&self, tickers: &[String], range: DateRange) -> Result<PriceHistory> {
        let (mut history, to_fetch) = self.cached(tickers, &range)?;
        tracing::debug!(
            cached = history.len(),
            to_fetch = to_fetch.len(),
            "resolved quote cache"
        );

        if !to_fetch.is_empty() {
            let fetched = match self.inner.get_prices(&to_fetch, range).await {
                Ok(fetched) => fetched,
                Err(e) if e.is_unavailable() => {
                    for ticker in &to_fetch {
                        history.insert_missing(
                            ticker.clone(),
                            DataError::missing(ticker, "No data returned by provider"),
                        );
                    }
                    return ensure_any(history);
                }
                Err(e) => return Err(e),
            };

            {
                let cache = self.lock()?;
                for series in fetched.iter() {
                    if let Err(e) = cache.put_series(series) {
                        tracing::warn!(symbol = series.symbol(), error = %e, "failed to cache quotes");
                    }
                }
            }
            history.extend(fetched);
        }

        ensure_any(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn range() -> DateRange {
        DateRange::new(d(1), d(31)).unwrap()
    }

    fn provider() -> StaticPriceProvider {
        StaticPriceProvider::new()
            .with_series(PriceSeries::new("AAPL", (1..=20).map(|i| (d(i), 100.0 + i as f64))))
            .with_series(PriceSeries::new("MSFT", (1..=20).map(|i| (d(i), 200.0 - i as f64))))
    }

    #[tokio::test]
    async fn test_static_provider_drops_unknown_tickers() {
        let tickers = vec!["AAPL".to_string(), "NOPE".to_string(), "MSFT".to_string()];
        let history = provider().get_prices(&tickers, range()).await.unwrap();

        assert_eq!(history.valid_symbols(), &["AAPL".to_string(), "MSFT".to_string()]);
        assert!(history.missing().contains_key("NOPE"));
    }

    #[tokio::test]
    async fn test_static_provider_fails_when_nothing_found() {
        let tickers = vec!["NOPE".to_string()];
        let result = provider().get_prices(&tickers, range()).await;
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }

    #[tokio::test]
    async fn test_cached_provider_stores_fetched_series() {
        let cache = SqliteCache::in_memory().unwrap();
        let cached = CachedPriceProvider::new(provider(), cache);
        let tickers = vec!["AAPL".to_string(), "NOPE".to_string()];

        let first = cached.get_prices(&tickers, range()).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(first.missing().contains_key("NOPE"));

        let stats = cached.lock().unwrap().get_stats().unwrap();
        assert_eq!(stats.unique_symbols, 1);
        assert_eq!(stats.total_quotes, 20);
    }
}
