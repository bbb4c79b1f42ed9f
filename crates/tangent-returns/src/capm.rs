//! CAPM expected returns.
//!
//! `E[R_i] = r_f + β_i (E[R_m] - r_f)`, with
//!
//! - `r_f`: latest observation of the short-rate series (quoted in percent) / 100
//! - `E[R_m]`: `(1 + mean(r_m))^periods_per_year - 1` from benchmark returns
//! - `β_i`: sample covariance of asset and benchmark returns over their
//!   overlapping dates, divided by the benchmark sample variance over the
//!   same dates (both with `n - 1` denominators)

use crate::error::{EstimationError, Result};
use crate::frequency::Frequency;
use crate::strategy::EstimationStrategy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tangent_data::{PriceHistory, PriceSeries};

/// Fewest overlapping observations accepted for a beta.
pub const MIN_BETA_OBSERVATIONS: usize = 3;

/// CAPM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapmConfig {
    /// Return frequency for beta and market return (default: daily)
    pub frequency: Frequency,
    /// Minimum overlapping observations for a beta (default and floor: 3)
    pub min_overlap: usize,
    /// Benchmark index symbol (default: ^GSPC)
    pub benchmark: String,
    /// Short-rate symbol quoted in percent (default: ^IRX)
    pub risk_free: String,
}

impl Default for CapmConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::Daily,
            min_overlap: MIN_BETA_OBSERVATIONS,
            benchmark: "^GSPC".to_string(),
            risk_free: "^IRX".to_string(),
        }
    }
}

/// Latest short-rate observation converted from percent to a fraction.
pub fn risk_free_rate(series: &PriceSeries) -> Result<f64> {
    let (_, latest) = series
        .latest()
        .ok_or_else(|| EstimationError::unavailable(series.symbol(), "no risk-free rate data"))?;
    Ok(latest / 100.0)
}

/// Annualized market return from periodic benchmark returns.
pub fn market_return(symbol: &str, returns: &BTreeMap<NaiveDate, f64>, periods_per_year: f64) -> Result<f64> {
    if returns.is_empty() {
        return Err(EstimationError::InsufficientHistory {
            asset: symbol.to_string(),
            required: 1,
            actual: 0,
        });
    }
    let mean = returns.values().sum::<f64>() / returns.len() as f64;
    let annual = (1.0 + mean).powf(periods_per_year) - 1.0;
    if !annual.is_finite() {
        return Err(EstimationError::degenerate(symbol, format!("market return is {annual}")));
    }
    Ok(annual)
}

/// Beta of `asset_returns` against `benchmark_returns` over their common dates.
pub fn beta(
    asset: &str,
    asset_returns: &BTreeMap<NaiveDate, f64>,
    benchmark_returns: &BTreeMap<NaiveDate, f64>,
    min_overlap: usize,
) -> Result<f64> {
    let (x, m): (Vec<f64>, Vec<f64>) = asset_returns
        .iter()
        .filter_map(|(date, r)| {
            let rm = benchmark_returns.get(date)?;
            (r.is_finite() && rm.is_finite()).then_some((*r, *rm))
        })
        .unzip();

    let required = min_overlap.max(MIN_BETA_OBSERVATIONS);
    if x.len() < required {
        return Err(EstimationError::InsufficientHistory {
            asset: asset.to_string(),
            required,
            actual: x.len(),
        });
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_m = m.iter().sum::<f64>() / n;
    let (cov, var) = x.iter().zip(&m).fold((0.0, 0.0), |(cov, var), (xi, mi)| {
        let dm = mi - mean_m;
        (cov + (xi - mean_x) * dm, var + dm * dm)
    });

    let beta = (cov / (n - 1.0)) / (var / (n - 1.0));
    if !beta.is_finite() {
        return Err(EstimationError::degenerate(
            asset,
            format!("beta is {beta} (benchmark variance {:e})", var / (n - 1.0)),
        ));
    }
    Ok(beta)
}

/// Market-wide CAPM inputs shared by every asset in a run.
#[derive(Debug, Clone)]
pub struct MarketContext {
    risk_free_rate: f64,
    market_return: f64,
    benchmark_returns: BTreeMap<NaiveDate, f64>,
    frequency: Frequency,
}

impl MarketContext {
    /// Build from explicit inputs.
    pub const fn new(
        risk_free_rate: f64,
        market_return: f64,
        benchmark_returns: BTreeMap<NaiveDate, f64>,
        frequency: Frequency,
    ) -> Self {
        Self {
            risk_free_rate,
            market_return,
            benchmark_returns,
            frequency,
        }
    }

    /// Build from a benchmark price series and a short-rate series.
    pub fn from_series(benchmark: &PriceSeries, risk_free: &PriceSeries, frequency: Frequency) -> Result<Self> {
        if benchmark.is_empty() {
            return Err(EstimationError::unavailable(benchmark.symbol(), "no benchmark data"));
        }
        let risk_free_rate = risk_free_rate(risk_free)?;
        let benchmark_returns = frequency.returns(benchmark);
        let market_return = market_return(benchmark.symbol(), &benchmark_returns, frequency.periods_per_year())?;

        tracing::debug!(
            risk_free_rate,
            market_return,
            %frequency,
            observations = benchmark_returns.len(),
            "built CAPM market context"
        );

        Ok(Self::new(risk_free_rate, market_return, benchmark_returns, frequency))
    }

    /// Build from the benchmark and short-rate series named in `config`.
    pub fn from_history(history: &PriceHistory, config: &CapmConfig) -> Result<Self> {
        let benchmark = history
            .get(&config.benchmark)
            .ok_or_else(|| EstimationError::unavailable(&config.benchmark, "no benchmark data"))?;
        let risk_free = history
            .get(&config.risk_free)
            .ok_or_else(|| EstimationError::unavailable(&config.risk_free, "no risk-free rate data"))?;
        Self::from_series(benchmark, risk_free, config.frequency)
    }

    /// Annual risk-free rate.
    pub const fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// Annualized market return.
    pub const fn market_return(&self) -> f64 {
        self.market_return
    }

    /// Return frequency of the benchmark returns.
    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Periodic benchmark returns.
    pub const fn benchmark_returns(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.benchmark_returns
    }

    /// `r_f + β (E[R_m] - r_f)`.
    pub fn expected_return(&self, beta: f64) -> f64 {
        self.risk_free_rate + beta * (self.market_return - self.risk_free_rate)
    }
}

/// CAPM as an estimation strategy.
#[derive(Debug, Clone)]
pub struct CapmStrategy {
    context: MarketContext,
    min_overlap: usize,
}

impl CapmStrategy {
    /// Create a strategy over `context`.
    pub fn new(context: MarketContext, config: &CapmConfig) -> Self {
        Self {
            context,
            min_overlap: config.min_overlap.max(MIN_BETA_OBSERVATIONS),
        }
    }

    /// Market inputs in use.
    pub const fn context(&self) -> &MarketContext {
        &self.context
    }

    /// Beta of `series` against the benchmark.
    pub fn beta(&self, series: &PriceSeries) -> Result<f64> {
        let returns = self.context.frequency.returns(series);
        beta(series.symbol(), &returns, &self.context.benchmark_returns, self.min_overlap)
    }

    /// CAPM expected return of `series`.
    pub fn expected_return(&self, series: &PriceSeries) -> Result<f64> {
        self.beta(series).map(|beta| self.context.expected_return(beta))
    }
}

impl EstimationStrategy for CapmStrategy {
    fn name(&self) -> &str {
        "capm"
    }

    fn estimate(&self, asset: &str, history: &PriceHistory) -> Result<f64> {
        let series = history
            .get(asset)
            .ok_or_else(|| EstimationError::unavailable(asset, "no price history"))?;
        self.expected_return(series)
    }
}
