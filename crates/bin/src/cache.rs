//! Quote cache location and maintenance commands.
//!
//! The cache lives in the platform cache directory:
//! - Linux: `~/.cache/tangent/`
//! - macOS: `~/Library/Caches/tangent/`
//! - Windows: `%LOCALAPPDATA%\tangent\cache\`

use std::path::{Path, PathBuf};
use tangent_data::DataError;
use tangent_data::cache::SqliteCache;

/// Default cache database path.
pub(crate) fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tangent")
        .join("quotes.db")
}

/// Open the cache at `path`, creating the directory if needed.
pub(crate) fn open_cache(path: &Path) -> Result<SqliteCache, DataError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    SqliteCache::new(path)
}

pub(crate) fn print_stats(path: &Path) -> Result<(), DataError> {
    if !path.exists() {
        println!("Cache: {} (not created yet)", path.display());
        return Ok(());
    }

    let stats = open_cache(path)?.get_stats()?;
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    println!("Cache: {}", path.display());
    println!("  Size:    {:.1} KiB", size as f64 / 1024.0);
    println!("  Symbols: {}", stats.unique_symbols);
    println!("  Quotes:  {}", stats.total_quotes);
    if let (Some(first), Some(last)) = (&stats.first_date, &stats.last_date) {
        println!("  Range:   {} to {}", first, last);
    }
    Ok(())
}

pub(crate) fn clear(path: &Path, symbol: Option<&str>) -> Result<(), DataError> {
    if !path.exists() {
        println!("Cache is empty");
        return Ok(());
    }

    let cache = open_cache(path)?;
    match symbol {
        Some(symbol) => {
            let symbol = symbol.to_uppercase();
            cache.clear_symbol(&symbol)?;
            println!("Cleared cached quotes for {}", symbol);
        }
        None => {
            cache.clear_all()?;
            println!("Cleared all cached quotes");
        }
    }
    Ok(())
}
