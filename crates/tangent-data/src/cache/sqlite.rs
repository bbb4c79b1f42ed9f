//! SQLite cache for adjusted quotes.

use crate::error::{DataError, Result};
use crate::prices::{DateRange, PriceSeries};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use std::path::Path;

/// Trading days per calendar year used for the freshness check.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Share of the expected trading days that must be cached for a hit.
const COVERAGE_THRESHOLD: f64 = 0.9;

/// SQLite cache for adjusted quotes.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Open (or create) a cache at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS quotes (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                adjusted_close REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (symbol, date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_quotes_symbol_date ON quotes(symbol, date)",
            [],
        )?;

        Ok(())
    }

    /// Check whether the cache covers most trading days of `range` for `symbol`.
    ///
    /// A range is covered when at least 90% of the expected trading days
    /// (calendar days scaled by 252/365) are present.
    pub fn has_quotes(&self, symbol: &str, range: &DateRange) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM quotes
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3",
            params![symbol, range.start().to_string(), range.end().to_string()],
            |row| row.get(0),
        )?;

        let expected = range.calendar_days() as f64 * TRADING_DAYS_PER_YEAR / 365.0;
        let required = (expected * COVERAGE_THRESHOLD).floor() as i64;

        Ok(count > 0 && count >= required)
    }

    /// Read the cached series for `symbol` within `range`.
    pub fn get_series(&self, symbol: &str, range: &DateRange) -> Result<PriceSeries> {
        let mut stmt = self.conn.prepare(
            "SELECT date, adjusted_close
             FROM quotes
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;

        let rows = stmt.query_map(
            params![symbol, range.start().to_string(), range.end().to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        )?;

        let mut observations = Vec::new();
        for row in rows {
            let (date, price) = row?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("Invalid cached date {date}: {e}")))?;
            observations.push((date, price));
        }

        if observations.is_empty() {
            return Err(DataError::missing(symbol, "No cached data found"));
        }

        Ok(PriceSeries::new(symbol, observations))
    }

    /// Store a series, replacing existing rows for the same dates.
    pub fn put_series(&self, series: &PriceSeries) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        for (date, price) in series.iter() {
            tx.execute(
                "INSERT OR REPLACE INTO quotes (symbol, date, adjusted_close, cached_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![series.symbol(), date.to_string(), price, cached_at],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Clear all cached data.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM quotes", [])?;
        Ok(())
    }

    /// Clear cached data for a specific symbol.
    pub fn clear_symbol(&self, symbol: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM quotes WHERE symbol = ?1", params![symbol])?;
        Ok(())
    }

    /// Get cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let quotes_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))?;

        let symbols_count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT symbol) FROM quotes", [], |row| {
                    row.get(0)
                })?;

        let (first, last): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM quotes",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(CacheStats {
            total_quotes: quotes_count as usize,
            unique_symbols: symbols_count as usize,
            first_date: first,
            last_date: last,
        })
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Total number of quote records
    pub total_quotes: usize,
    /// Number of unique symbols
    pub unique_symbols: usize,
    /// Earliest cached date
    pub first_date: Option<String>,
    /// Latest cached date
    pub last_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn weekday_series(symbol: &str, range: &DateRange) -> PriceSeries {
        let observations = range
            .start()
            .iter_days()
            .take_while(|date| *date <= range.end())
            .filter(|date| chrono::Datelike::weekday(date).num_days_from_monday() < 5)
            .enumerate()
            .map(|(i, date)| (date, 100.0 + i as f64));
        PriceSeries::new(symbol, observations)
    }

    #[test]
    fn test_cache_initialization() {
        let cache = SqliteCache::in_memory();
        assert!(cache.is_ok());
    }

    #[test]
    fn test_put_and_get_series() {
        let cache = SqliteCache::in_memory().unwrap();
        let range = DateRange::new(d(1, 1), d(3, 31)).unwrap();
        let series = weekday_series("AAPL", &range);

        cache.put_series(&series).unwrap();
        let cached = cache.get_series("AAPL", &range).unwrap();

        assert_eq!(cached, series);
        assert!(cache.has_quotes("AAPL", &range).unwrap());
    }

    #[test]
    fn test_sparse_cache_is_not_fresh() {
        let cache = SqliteCache::in_memory().unwrap();
        let range = DateRange::new(d(1, 1), d(3, 31)).unwrap();
        let short = DateRange::new(d(1, 1), d(1, 31)).unwrap();

        cache.put_series(&weekday_series("AAPL", &short)).unwrap();
        assert!(!cache.has_quotes("AAPL", &range).unwrap());
        assert!(!cache.has_quotes("MSFT", &range).unwrap());
    }

    #[test]
    fn test_missing_symbol() {
        let cache = SqliteCache::in_memory().unwrap();
        let range = DateRange::new(d(1, 1), d(1, 31)).unwrap();
        let result = cache.get_series("NOPE", &range);
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }

    #[test]
    fn test_cache_stats_and_clear() {
        let cache = SqliteCache::in_memory().unwrap();
        let range = DateRange::new(d(1, 1), d(1, 31)).unwrap();

        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.total_quotes, 0);
        assert!(stats.first_date.is_none());

        let aapl = weekday_series("AAPL", &range);
        cache.put_series(&aapl).unwrap();
        cache.put_series(&weekday_series("MSFT", &range)).unwrap();

        let stats = cache.get_stats().unwrap();
        assert_eq!(stats.unique_symbols, 2);
        assert_eq!(stats.total_quotes, aapl.len() * 2);
        assert_eq!(stats.first_date.as_deref(), Some("2024-01-01"));

        cache.clear_symbol("AAPL").unwrap();
        assert_eq!(cache.get_stats().unwrap().unique_symbols, 1);

        cache.clear_all().unwrap();
        assert_eq!(cache.get_stats().unwrap().total_quotes, 0);
    }
}
