//! Run configuration.
//!
//! Every section has a `Default` and `#[serde(default)]`, so a JSON file only
//! needs the fields it changes.

use crate::error::{Error, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tangent_data::DateRange;
use tangent_optimize::{BlackLittermanConfig, OptimizationMethod, OptimizerConfig};
use tangent_returns::{CapmConfig, ForecastConfig, HistoricalMeanConfig};
use tangent_risk::SampleCovarianceConfig;

/// Where the views come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSource {
    /// Each asset's own annualized mean return
    HistoricalMean,
    /// CAPM from the benchmark and short rate, falling back to the historical mean
    #[default]
    Capm,
    /// External forecaster, falling back to the historical mean
    External,
}

impl std::fmt::Display for ForecastSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HistoricalMean => write!(f, "historical_mean"),
            Self::Capm => write!(f, "capm"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Price window and data sufficiency thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// First date; `None` means `lookback_days` before the end
    pub start: Option<NaiveDate>,
    /// Last date; `None` means today
    pub end: Option<NaiveDate>,
    /// Window length when no start is given (default: 1095)
    pub lookback_days: i64,
    /// Fewest tickers with data needed to build a portfolio (default: 2)
    pub min_tickers: usize,
    /// Fewest price dates needed across those tickers (default: 5)
    pub min_rows: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            lookback_days: 3 * 365,
            min_tickers: 2,
            min_rows: 5,
        }
    }
}

impl FetchConfig {
    /// Resolve the window, with `today` standing in for a missing end date.
    pub fn date_range(&self, today: NaiveDate) -> Result<DateRange> {
        if self.lookback_days <= 0 {
            return Err(Error::Config(format!(
                "lookback_days must be positive, got {}",
                self.lookback_days
            )));
        }
        let end = self.end.unwrap_or(today);
        let start = self
            .start
            .unwrap_or_else(|| end - Duration::days(self.lookback_days));
        Ok(DateRange::new(start, end)?)
    }
}

/// Everything one run needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Optimization objective
    pub method: OptimizationMethod,
    /// View source
    pub source: ForecastSource,
    /// Amount to invest; only used for reporting and growth simulation
    pub investment_amount: Option<f64>,
    /// Convert forecast confidences into per-view uncertainty
    pub use_forecast_confidence: bool,
    /// Price window
    pub fetch: FetchConfig,
    /// CAPM settings
    pub capm: CapmConfig,
    /// Historical mean settings, also used as the fallback
    pub historical: HistoricalMeanConfig,
    /// External forecast collection
    pub forecast: ForecastConfig,
    /// Sample covariance settings
    pub covariance: SampleCovarianceConfig,
    /// Prior and view blending
    pub black_litterman: BlackLittermanConfig,
    /// Solver settings and risk-free rate
    pub optimizer: OptimizerConfig,
}

impl RunConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded run configuration");
        Ok(config)
    }

    /// Annual risk-free rate used by the optimizer.
    pub const fn risk_free_rate(&self) -> f64 {
        self.optimizer.risk_free_rate
    }

    /// Set the annual risk-free rate.
    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.optimizer.risk_free_rate = rate;
        self
    }

    /// Set τ.
    pub fn with_tau(mut self, tau: f64) -> Self {
        self.black_litterman.tau = tau;
        self
    }

    /// Set the risk aversion δ.
    pub fn with_risk_aversion(mut self, delta: f64) -> Self {
        self.black_litterman.risk_aversion = delta;
        self
    }

    /// Check values a run cannot recover from.
    pub fn validate(&self) -> Result<()> {
        if let Some(amount) = self.investment_amount
            && !(amount.is_finite() && amount > 0.0)
        {
            return Err(Error::Config(format!(
                "investment amount must be positive, got {amount}"
            )));
        }
        if self.fetch.min_tickers < 2 {
            return Err(Error::Config("min_tickers must be at least 2".to_string()));
        }
        if self.forecast.concurrency == 0 {
            return Err(Error::Config("forecast concurrency must be positive".to_string()));
        }
        Ok(())
    }
}
