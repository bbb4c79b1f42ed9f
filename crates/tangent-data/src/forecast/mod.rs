//! External forecast sources.
//!
//! A [`Forecaster`] returns raw, unvalidated text for one ticker. Parsing and
//! validation happen downstream; nothing here trusts the response content.

mod openai;

pub use openai::OpenAiForecaster;

use crate::error::Result;
use async_trait::async_trait;

/// Source of per-ticker return forecasts.
#[async_trait]
pub trait Forecaster: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Request a forecast for `ticker` and return the raw response text.
    async fn forecast(&self, ticker: &str) -> Result<String>;
}
