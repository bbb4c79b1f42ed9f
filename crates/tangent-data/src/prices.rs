//! Date-indexed price series.
//!
//! A [`PriceSeries`] holds adjusted prices for one symbol with a strictly
//! increasing date index. Gaps (missing, non-finite or non-positive
//! observations) are dropped on construction and never interpolated.

use crate::error::{DataError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive calendar date range for a data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// First date of the range.
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last date of the range.
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, inclusive.
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Whether `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Adjusted prices for a single symbol, strictly increasing in date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    dates: Vec<NaiveDate>,
    prices: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from `(date, price)` observations in any order.
    ///
    /// Observations that are not finite or not strictly positive are dropped.
    /// When a date appears more than once the last observation wins.
    pub fn new(
        symbol: impl Into<String>,
        observations: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        let by_date: BTreeMap<NaiveDate, f64> = observations
            .into_iter()
            .filter(|(_, price)| price.is_finite() && *price > 0.0)
            .collect();

        let (dates, prices) = by_date.into_iter().unzip();
        Self {
            symbol: symbol.into(),
            dates,
            prices,
        }
    }

    /// Build a series from a quotes frame with `date` and `adjusted_close`
    /// columns, as produced by [`crate::yahoo::YahooQuoteProvider`].
    pub fn from_quotes_frame(symbol: &str, df: &DataFrame) -> Result<Self> {
        let dates = df.column("date")?.cast(&DataType::String)?;
        let dates = dates.str()?;
        let closes = df.column("adjusted_close")?.f64()?;

        let mut observations = Vec::with_capacity(df.height());
        for (date, close) in dates.into_iter().zip(closes.into_iter()) {
            let (Some(date), Some(close)) = (date, close) else {
                continue;
            };
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("Invalid date '{}': {}", date, e)))?;
            observations.push((date, close));
        }

        Ok(Self::new(symbol, observations))
    }

    /// Symbol this series belongs to.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Number of observations.
    pub const fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the series has no observations.
    pub const fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Observation dates, strictly increasing.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Observed prices, aligned with [`Self::dates`].
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Iterate over `(date, price)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.prices.iter().copied())
    }

    /// Earliest observation.
    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        self.iter().next()
    }

    /// Latest observation.
    pub fn latest(&self) -> Option<(NaiveDate, f64)> {
        self.iter().last()
    }

    /// Price observed on `date`, if any.
    pub fn price_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.prices[idx])
    }

    /// Simple returns between consecutive observations, dated at the later
    /// observation.
    pub fn returns(&self) -> BTreeMap<NaiveDate, f64> {
        self.prices
            .windows(2)
            .zip(self.dates.iter().skip(1))
            .map(|(pair, date)| (*date, pair[1] / pair[0] - 1.0))
            .collect()
    }

    /// Keep the last observation of every calendar month.
    pub fn resample_monthly(&self) -> Self {
        let mut by_month: BTreeMap<(i32, u32), (NaiveDate, f64)> = BTreeMap::new();
        for (date, price) in self.iter() {
            by_month.insert((date.year(), date.month()), (date, price));
        }
        Self::new(self.symbol.clone(), by_month.into_values())
    }

    /// Restrict the series to a date range.
    pub fn within(&self, range: &DateRange) -> Self {
        Self::new(
            self.symbol.clone(),
            self.iter().filter(|(date, _)| range.contains(*date)),
        )
    }
}

/// Price series for a batch of symbols plus the symbols that failed.
#[derive(Debug, Default)]
pub struct PriceHistory {
    series: BTreeMap<String, PriceSeries>,
    valid: Vec<String>,
    missing: BTreeMap<String, DataError>,
}

impl PriceHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a series. Empty series are recorded as missing instead.
    pub fn insert(&mut self, series: PriceSeries) {
        let symbol = series.symbol().to_string();
        if series.is_empty() {
            self.insert_missing(
                symbol,
                DataError::missing(series.symbol(), "No valid observations"),
            );
            return;
        }
        self.missing.remove(&symbol);
        if !self.valid.contains(&symbol) {
            self.valid.push(symbol.clone());
        }
        self.series.insert(symbol, series);
    }

    /// Record a symbol that returned no usable data.
    pub fn insert_missing(&mut self, symbol: impl Into<String>, error: DataError) {
        let symbol = symbol.into();
        self.valid.retain(|s| s != &symbol);
        self.series.remove(&symbol);
        self.missing.insert(symbol, error);
    }

    /// Merge another history into this one; series in `other` win.
    pub fn extend(&mut self, other: Self) {
        for (symbol, error) in other.missing {
            if !self.series.contains_key(&symbol) {
                self.missing.insert(symbol, error);
            }
        }
        for symbol in other.valid {
            if let Some(series) = other.series.get(&symbol) {
                self.insert(series.clone());
            }
        }
    }

    /// Series for `symbol`.
    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    /// Symbols that returned valid data, in insertion order.
    pub fn valid_symbols(&self) -> &[String] {
        &self.valid
    }

    /// Symbols that failed, with the reason.
    pub const fn missing(&self) -> &BTreeMap<String, DataError> {
        &self.missing
    }

    /// Number of valid series.
    pub fn len(&self) -> usize {
        self.valid.len()
    }

    /// Whether no symbol returned data.
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Iterate over valid series in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PriceSeries> + '_ {
        self.valid.iter().filter_map(|s| self.series.get(s))
    }

    /// Number of distinct dates on which at least one symbol has a price.
    pub fn row_count(&self) -> usize {
        let mut dates: Vec<NaiveDate> = self
            .series
            .values()
            .flat_map(|s| s.dates().iter().copied())
            .collect();
        dates.sort_unstable();
        dates.dedup();
        dates.len()
    }
}
