//! Date-by-asset panel of periodic returns.

use crate::error::{Result, RiskError};
use crate::universe::AssetUniverse;
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1};
use std::collections::{BTreeMap, BTreeSet};

/// Periodic returns indexed by date (rows) and asset (columns).
///
/// Dates are the union of every column's dates; an asset without an
/// observation on a date holds `NaN` there.
#[derive(Debug, Clone)]
pub struct ReturnPanel {
    assets: AssetUniverse,
    dates: Vec<NaiveDate>,
    values: Array2<f64>,
}

impl ReturnPanel {
    /// Build a panel from per-asset dated returns. Non-finite returns are
    /// stored as missing.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, BTreeMap<NaiveDate, f64>)>,
        S: Into<String>,
    {
        let (names, columns): (Vec<String>, Vec<BTreeMap<NaiveDate, f64>>) = columns
            .into_iter()
            .map(|(asset, column)| (asset.into(), column))
            .unzip();
        let assets = AssetUniverse::new(names)?;

        let dates: Vec<NaiveDate> = columns
            .iter()
            .flat_map(|column| column.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let values = Array2::from_shape_fn((dates.len(), assets.len()), |(t, j)| {
            columns[j]
                .get(&dates[t])
                .copied()
                .filter(|r| r.is_finite())
                .unwrap_or(f64::NAN)
        });

        Ok(Self {
            assets,
            dates,
            values,
        })
    }

    /// Asset labels (columns).
    pub const fn assets(&self) -> &AssetUniverse {
        &self.assets
    }

    /// Dates (rows), ascending.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Raw values with `NaN` for missing observations.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of periods.
    pub fn n_periods(&self) -> usize {
        self.dates.len()
    }

    /// Column for `asset`.
    pub fn column(&self, asset: &str) -> Option<ArrayView1<'_, f64>> {
        self.assets.position(asset).map(|j| self.values.column(j))
    }

    /// Observations of columns `i` and `j` on dates where both are present.
    pub fn pairwise(&self, i: usize, j: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        let n = self.assets.len();
        if i >= n || j >= n {
            return Err(RiskError::DimensionMismatch {
                expected: n,
                actual: i.max(j) + 1,
            });
        }
        Ok(self
            .values
            .rows()
            .into_iter()
            .filter_map(|row| {
                let (x, y) = (row[i], row[j]);
                (x.is_finite() && y.is_finite()).then_some((x, y))
            })
            .unzip())
    }
}
