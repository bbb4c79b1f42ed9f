//! Quote data fetching from Yahoo Finance.

use crate::error::{DataError, Result};
use crate::prices::{DateRange, PriceHistory, PriceSeries};
use crate::provider::{PriceHistoryProvider, ensure_any};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use polars::prelude::*;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use yahoo_finance_api as yahoo;

/// Default number of concurrent requests.
const DEFAULT_CONCURRENCY: usize = 4;

/// Default per-request deadline.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Yahoo Finance quote provider with rate limiting and bounded concurrency.
pub struct YahooQuoteProvider {
    provider: yahoo::YahooConnector,
    rate_limit_delay: Duration,
    request_timeout: Duration,
    concurrency: usize,
}

impl std::fmt::Debug for YahooQuoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooQuoteProvider")
            .field("rate_limit_delay", &self.rate_limit_delay)
            .field("request_timeout", &self.request_timeout)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl YahooQuoteProvider {
    /// Create a provider with default limits (250ms between requests per
    /// worker, 4 concurrent requests, 30s per request).
    pub fn new() -> Result<Self> {
        Ok(Self {
            provider: yahoo::YahooConnector::new()?,
            rate_limit_delay: Duration::from_millis(250),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    /// Set the delay applied after each request.
    pub const fn with_rate_limit(mut self, rate_limit_delay: Duration) -> Self {
        self.rate_limit_delay = rate_limit_delay;
        self
    }

    /// Set the per-request deadline.
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Set the number of requests in flight (at least one).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Fetch daily quotes for a single symbol.
    ///
    /// # Returns
    /// A Polars DataFrame with columns: symbol, date, close, adjusted_close
    pub async fn fetch_quotes(&self, symbol: &str, range: &DateRange) -> Result<DataFrame> {
        if symbol.trim().is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        let start_time = to_offset_date_time(range.start())?;
        // Yahoo treats the end bound as exclusive.
        let end_time = to_offset_date_time(range.end())? + time::Duration::days(1);

        let response = self
            .provider
            .get_quote_history(symbol, start_time, end_time)
            .await?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::YahooApi(e.to_string()))?;

        if quotes.is_empty() {
            return Err(DataError::missing(symbol, "No data returned from Yahoo Finance"));
        }

        let timestamps: Vec<i64> = quotes.iter().map(|q| q.timestamp as i64).collect();
        let closes: Vec<f64> = quotes.iter().map(|q| q.close).collect();
        let adj_closes: Vec<f64> = quotes.iter().map(|q| q.adjclose).collect();

        let mut df = DataFrame::new(vec![
            Series::new("timestamp".into(), timestamps).into(),
            Series::new("close".into(), closes).into(),
            Series::new("adjusted_close".into(), adj_closes).into(),
        ])?;

        let symbol_col: Column = Series::new("symbol".into(), vec![symbol; df.height()]).into();
        df.with_column(symbol_col)?;

        let df = df
            .lazy()
            .with_column(
                (col("timestamp") * lit(1_000_000_000))
                    .cast(DataType::Datetime(TimeUnit::Nanoseconds, None))
                    .cast(DataType::Date)
                    .alias("date"),
            )
            .select(&[
                col("symbol"),
                col("date"),
                col("close"),
                col("adjusted_close"),
            ])
            .collect()?;

        sleep(self.rate_limit_delay).await;

        Ok(df)
    }

    /// Fetch one symbol as a [`PriceSeries`], bounded by the request timeout.
    pub async fn fetch_series(&self, symbol: &str, range: &DateRange) -> Result<PriceSeries> {
        let df = timeout(self.request_timeout, self.fetch_quotes(symbol, range))
            .await
            .map_err(|_| DataError::Timeout {
                symbol: symbol.to_string(),
                after_ms: self.request_timeout.as_millis() as u64,
            })??;

        let series = PriceSeries::from_quotes_frame(symbol, &df)?.within(range);
        if series.is_empty() {
            return Err(DataError::missing(symbol, "No valid prices in range"));
        }
        Ok(series)
    }
}

fn to_offset_date_time(date: NaiveDate) -> Result<time::OffsetDateTime> {
    let timestamp = date
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| DataError::TimeConversion(format!("Invalid date {date}")))?;
    time::OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| DataError::TimeConversion(e.to_string()))
}

#[async_trait]
impl PriceHistoryProvider for YahooQuoteProvider {
    async fn get_prices(&self, tickers: &[String], range: DateRange) -> Result<PriceHistory> {
        let results: Vec<(String, Result<PriceSeries>)> = stream::iter(tickers.iter().cloned())
            .map(|symbol| async move {
                let result = self.fetch_series(&symbol, &range).await;
                (symbol, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut history = PriceHistory::new();
        for (symbol, result) in results {
            match result {
                Ok(series) => history.insert(series),
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "dropping ticker without price data");
                    history.insert_missing(symbol, e);
                }
            }
        }

        tracing::debug!(
            valid = history.len(),
            missing = history.missing().len(),
            "fetched Yahoo price history"
        );
        ensure_any(history)
    }
}
