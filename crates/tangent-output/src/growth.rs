//! Simulated growth of an investment held at fixed weights.
//!
//! Prices of every positively weighted asset are normalized to their value on
//! the first date all of them trade, so each asset starts at 1.0. The
//! portfolio value on a date is `amount * Σ w_i * p_i(t) / p_i(t0)`, over the
//! dates every asset has a price. Weights are used as given, without
//! rebalancing or renormalization.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tangent_data::PriceHistory;
use thiserror::Error;

/// Growth simulation failures.
#[derive(Debug, Error)]
pub enum GrowthError {
    /// A weighted asset has no price history
    #[error("No price history for weighted asset {0}")]
    MissingAsset(String),

    /// The weighted assets never trade on the same date
    #[error("Weighted assets share no trading dates")]
    NoCommonDates,

    /// No asset carries positive weight
    #[error("No asset carries positive weight")]
    NoWeights,

    /// Investment amount is not a positive finite number
    #[error("Invalid investment amount: {0}")]
    InvalidAmount(f64),
}

/// Portfolio value on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    /// Trading date.
    pub date: NaiveDate,

    /// Portfolio value.
    pub value: f64,
}

/// Portfolio value over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSeries {
    initial_investment: f64,
    points: Vec<GrowthPoint>,
}

impl GrowthSeries {
    /// Wrap precomputed points.
    pub const fn from_points(initial_investment: f64, points: Vec<GrowthPoint>) -> Self {
        Self {
            initial_investment,
            points,
        }
    }

    /// Amount invested on the first date.
    pub const fn initial_investment(&self) -> f64 {
        self.initial_investment
    }

    /// Points in date order.
    pub fn points(&self) -> &[GrowthPoint] {
        &self.points
    }

    /// Number of points.
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series is empty.
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Value on the last date.
    pub fn final_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }

    /// Total return over the series, `final / initial - 1`.
    pub fn total_return(&self) -> Option<f64> {
        self.final_value().map(|v| v / self.initial_investment - 1.0)
    }
}

/// Simulate buy-and-hold growth of `amount` at `weights`.
pub fn simulate_growth(
    history: &PriceHistory,
    weights: &BTreeMap<String, f64>,
    amount: f64,
) -> Result<GrowthSeries, GrowthError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(GrowthError::InvalidAmount(amount));
    }

    let mut held = Vec::new();
    for (asset, weight) in weights.iter().filter(|(_, w)| **w > 0.0) {
        let series = history
            .get(asset)
            .ok_or_else(|| GrowthError::MissingAsset(asset.clone()))?;
        held.push((series, *weight));
    }
    if held.is_empty() {
        return Err(GrowthError::NoWeights);
    }

    let mut common: BTreeSet<NaiveDate> = held[0].0.dates().iter().copied().collect();
    for (series, _) in &held[1..] {
        let dates: BTreeSet<NaiveDate> = series.dates().iter().copied().collect();
        common = common.intersection(&dates).copied().collect();
    }
    let start = *common.first().ok_or(GrowthError::NoCommonDates)?;

    let bases: Vec<f64> = held
        .iter()
        .map(|(series, _)| series.price_on(start).ok_or(GrowthError::NoCommonDates))
        .collect::<Result<_, _>>()?;

    let mut points = Vec::with_capacity(common.len());
    for date in common {
        let mut value = 0.0;
        for ((series, weight), base) in held.iter().zip(&bases) {
            let price = series.price_on(date).ok_or(GrowthError::NoCommonDates)?;
            value += weight * price / base;
        }
        points.push(GrowthPoint {
            date,
            value: value * amount,
        });
    }

    Ok(GrowthSeries::from_points(amount, points))
}
