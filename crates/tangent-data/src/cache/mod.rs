//! Caching layer for price history.

pub mod sqlite;

pub use sqlite::{CacheStats, SqliteCache};
