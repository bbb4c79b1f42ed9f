//! Annualized historical mean returns.

use crate::error::{EstimationError, Result};
use crate::frequency::Frequency;
use crate::strategy::EstimationStrategy;
use serde::{Deserialize, Serialize};
use tangent_data::{PriceHistory, PriceSeries};

/// How periodic returns are averaged before annualizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeanKind {
    /// `(Π(1 + r))^(periods_per_year / n) - 1`
    #[default]
    Geometric,
    /// `(1 + mean(r))^periods_per_year - 1`
    Arithmetic,
}

/// Historical mean configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalMeanConfig {
    /// Return frequency (default: daily)
    pub frequency: Frequency,
    /// Averaging method (default: geometric)
    pub kind: MeanKind,
}

/// Annualized mean of an asset's own periodic returns.
#[derive(Debug, Clone, Default)]
pub struct HistoricalMean {
    config: HistoricalMeanConfig,
}

impl HistoricalMean {
    /// Create an estimator with the given configuration
    pub const fn new(config: HistoricalMeanConfig) -> Self {
        Self { config }
    }

    /// Annualized mean return of `series`. Needs at least one periodic return.
    pub fn mean_return(&self, series: &PriceSeries) -> Result<f64> {
        let returns: Vec<f64> = self.config.frequency.returns(series).into_values().collect();
        annualize(series.symbol(), &returns, self.config.kind, self.config.frequency.periods_per_year())
    }
}

/// Annualize periodic `returns`.
pub fn annualize(asset: &str, returns: &[f64], kind: MeanKind, periods_per_year: f64) -> Result<f64> {
    if returns.is_empty() {
        return Err(EstimationError::InsufficientHistory {
            asset: asset.to_string(),
            required: 1,
            actual: 0,
        });
    }

    let n = returns.len() as f64;
    let value = match kind {
        MeanKind::Geometric => {
            let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
            if growth <= 0.0 {
                return Err(EstimationError::degenerate(asset, "cumulative growth is not positive"));
            }
            growth.powf(periods_per_year / n) - 1.0
        }
        MeanKind::Arithmetic => {
            let mean = returns.iter().sum::<f64>() / n;
            (1.0 + mean).powf(periods_per_year) - 1.0
        }
    };

    if !value.is_finite() {
        return Err(EstimationError::degenerate(asset, format!("annualized mean is {value}")));
    }
    Ok(value)
}

impl EstimationStrategy for HistoricalMean {
    fn name(&self) -> &str {
        "historical_mean"
    }

    fn estimate(&self, asset: &str, history: &PriceHistory) -> Result<f64> {
        let series = history
            .get(asset)
            .ok_or_else(|| EstimationError::unavailable(asset, "no price history"))?;
        self.mean_return(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::new(
            "X",
            prices
                .iter()
                .enumerate()
                .map(|(i, p)| (start + chrono::Duration::days(i as i64), *p)),
        )
    }

    #[test]
    fn test_geometric_matches_endpoint_compounding() {
        let s = series(&[100.0, 101.0, 99.0, 102.0, 104.0]);
        let estimate = HistoricalMean::default().mean_return(&s).unwrap();
        let expected = (104.0_f64 / 100.0).powf(252.0 / 4.0) - 1.0;
        assert_abs_diff_eq!(estimate, expected, epsilon = 1e-10);
    }

    #[rstest]
    #[case(MeanKind::Geometric)]
    #[case(MeanKind::Arithmetic)]
    fn test_flat_prices_give_zero(#[case] kind: MeanKind) {
        let estimator = HistoricalMean::new(HistoricalMeanConfig {
            kind,
            ..Default::default()
        });
        let estimate = estimator.mean_return(&series(&[50.0, 50.0, 50.0])).unwrap();
        assert_abs_diff_eq!(estimate, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_arithmetic_mean() {
        let returns = [0.01, -0.01, 0.02];
        let estimate = annualize("X", &returns, MeanKind::Arithmetic, 12.0).unwrap();
        assert_abs_diff_eq!(estimate, (1.0_f64 + 0.02 / 3.0).powf(12.0) - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_price_is_insufficient() {
        let result = HistoricalMean::default().mean_return(&series(&[100.0]));
        assert!(matches!(
            result,
            Err(EstimationError::InsufficientHistory { required: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn test_missing_asset_is_unavailable() {
        let result = HistoricalMean::default().estimate("NOPE", &PriceHistory::new());
        assert!(matches!(result, Err(EstimationError::DataUnavailable { .. })));
    }
}
