//! Asset-labeled vectors and matrices.
//!
//! Each container carries its own labels. Nothing here reorders values
//! implicitly: selecting a subset always goes through an [`AssetUniverse`],
//! whose order becomes the order of the result.

use crate::covariance::utils::symmetric_eigen;
use crate::error::{Result, RiskError};
use crate::universe::AssetUniverse;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Annualized expected return per asset.
///
/// Raw vectors may contain duplicate assets and non-finite values, as
/// produced by upstream estimators; [`ReturnVector::cleaned`] resolves both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReturnVector {
    entries: Vec<(String, f64)>,
}

impl ReturnVector {
    /// Create a raw vector; duplicates and non-finite values are kept.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(asset, value)| (asset.into(), value))
                .collect(),
        }
    }

    /// Number of entries, duplicates included.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the vector has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(asset, value)` entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(asset, value)| (asset.as_str(), *value))
    }

    /// Asset labels in order, duplicates included.
    pub fn assets(&self) -> Vec<&str> {
        self.entries.iter().map(|(asset, _)| asset.as_str()).collect()
    }

    /// Value of the last entry for `asset`.
    pub fn get(&self, asset: &str) -> Option<f64> {
        self.entries
            .iter()
            .rev()
            .find(|(a, _)| a == asset)
            .map(|(_, value)| *value)
    }

    /// Whether any asset appears more than once.
    pub fn has_duplicates(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.entries.len());
        !self.entries.iter().all(|(asset, _)| seen.insert(asset.as_str()))
    }

    /// Whether the vector has unique assets and finite values only.
    pub fn is_clean(&self) -> bool {
        !self.has_duplicates() && self.entries.iter().all(|(_, v)| v.is_finite())
    }

    /// Drop duplicate assets keeping the last occurrence, then drop
    /// non-finite entries.
    ///
    /// A kept entry stays at the position of its last occurrence.
    pub fn cleaned(&self) -> Self {
        let last: HashMap<&str, usize> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (asset, _))| (asset.as_str(), i))
            .collect();

        let entries = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, (asset, value))| last[asset.as_str()] == *i && value.is_finite())
            .map(|(_, entry)| entry.clone())
            .collect();

        Self { entries }
    }

    /// Universe of a clean vector, in entry order.
    pub fn universe(&self) -> Result<AssetUniverse> {
        AssetUniverse::new(self.entries.iter().map(|(asset, _)| asset.clone()))
    }

    /// Reorder and trim to `universe`; every asset in it must be present.
    pub fn select(&self, universe: &AssetUniverse) -> Result<Self> {
        let entries = universe
            .iter()
            .map(|asset| {
                self.get(asset)
                    .map(|value| (asset.to_string(), value))
                    .ok_or_else(|| RiskError::UnknownAsset(asset.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Values in entry order.
    pub fn values(&self) -> Array1<f64> {
        self.entries.iter().map(|(_, value)| *value).collect()
    }

    /// Asset-keyed map; later duplicates win.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.entries.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ReturnVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Covariance matrix with independent row and column labels.
///
/// Rows and columns are each unique but need not match one another until
/// the matrix has been aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    rows: AssetUniverse,
    columns: AssetUniverse,
    values: Array2<f64>,
}

impl CovarianceMatrix {
    /// Create a labeled matrix, checking dimensions, label uniqueness and
    /// finiteness.
    pub fn new(rows: AssetUniverse, columns: AssetUniverse, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != rows.len() {
            return Err(RiskError::DimensionMismatch {
                expected: rows.len(),
                actual: values.nrows(),
            });
        }
        if values.ncols() != columns.len() {
            return Err(RiskError::DimensionMismatch {
                expected: columns.len(),
                actual: values.ncols(),
            });
        }
        if let Some(((i, j), _)) = values.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(RiskError::NonFinite(format!(
                "covariance[{}, {}]",
                rows.assets()[i],
                columns.assets()[j]
            )));
        }
        Ok(Self {
            rows,
            columns,
            values,
        })
    }

    /// Create a matrix whose rows and columns share `assets`.
    pub fn square(assets: AssetUniverse, values: Array2<f64>) -> Result<Self> {
        Self::new(assets.clone(), assets, values)
    }

    /// Row labels.
    pub const fn rows(&self) -> &AssetUniverse {
        &self.rows
    }

    /// Column labels.
    pub const fn columns(&self) -> &AssetUniverse {
        &self.columns
    }

    /// Raw values.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Consume into raw values.
    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Whether rows and columns carry identical labels in identical order.
    pub fn is_square_labeled(&self) -> bool {
        self.rows.assets() == self.columns.assets()
    }

    /// Entry at `(row, column)`.
    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let i = self.rows.position(row)?;
        let j = self.columns.position(column)?;
        Some(self.values[[i, j]])
    }

    /// Square sub-matrix over `universe`, in universe order.
    pub fn select(&self, universe: &AssetUniverse) -> Result<Self> {
        let row_idx = Self::positions(&self.rows, universe)?;
        let col_idx = Self::positions(&self.columns, universe)?;
        let n = universe.len();
        let values = Array2::from_shape_fn((n, n), |(i, j)| self.values[[row_idx[i], col_idx[j]]]);
        Self::square(universe.clone(), values)
    }

    fn positions(labels: &AssetUniverse, universe: &AssetUniverse) -> Result<Vec<usize>> {
        universe
            .iter()
            .map(|asset| {
                labels
                    .position(asset)
                    .ok_or_else(|| RiskError::UnknownAsset(asset.to_string()))
            })
            .collect()
    }

    /// Whether the matrix is square and symmetric within `tolerance`.
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        let (n, m) = self.values.dim();
        n == m
            && (0..n).all(|i| {
                (i + 1..n).all(|j| (self.values[[i, j]] - self.values[[j, i]]).abs() <= tolerance)
            })
    }

    /// Smallest eigenvalue of the (square) matrix.
    pub fn min_eigenvalue(&self) -> Result<f64> {
        let decomp = symmetric_eigen(&self.values)?;
        Ok(decomp.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min))
    }

    /// Standard deviation of `asset` (square root of the diagonal entry).
    pub fn volatility(&self, asset: &str) -> Option<f64> {
        self.get(asset, asset).map(|variance| variance.max(0.0).sqrt())
    }
}

/// Non-negative portfolio weights summing to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketWeights {
    assets: AssetUniverse,
    weights: Vec<f64>,
}

impl MarketWeights {
    /// Create weights from `(asset, weight)` pairs, normalized to sum to one.
    ///
    /// Fails on duplicate assets, negative or non-finite weights, or a
    /// non-positive total.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (assets, weights): (Vec<String>, Vec<f64>) = entries
            .into_iter()
            .map(|(asset, weight)| (asset.into(), weight))
            .unzip();
        let assets = AssetUniverse::new(assets)?;

        if let Some((asset, weight)) = assets
            .iter()
            .zip(&weights)
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(RiskError::InvalidWeights(format!(
                "weight for {asset} must be finite and non-negative, got {weight}"
            )));
        }

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(RiskError::InvalidWeights(format!(
                "weights must sum to a positive total, got {total}"
            )));
        }

        Ok(Self {
            assets,
            weights: weights.into_iter().map(|w| w / total).collect(),
        })
    }

    /// Equal weights over `universe`.
    pub fn uniform(universe: &AssetUniverse) -> Result<Self> {
        if universe.is_empty() {
            return Err(RiskError::InvalidWeights("empty universe".to_string()));
        }
        let weight = 1.0 / universe.len() as f64;
        Ok(Self {
            assets: universe.clone(),
            weights: vec![weight; universe.len()],
        })
    }

    /// Asset labels.
    pub const fn assets(&self) -> &AssetUniverse {
        &self.assets
    }

    /// Number of assets.
    pub const fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether there are no weights.
    pub const fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight of `asset`.
    pub fn get(&self, asset: &str) -> Option<f64> {
        self.assets.position(asset).map(|i| self.weights[i])
    }

    /// Iterate over `(asset, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.assets.iter().zip(self.weights.iter().copied())
    }

    /// Weights in asset order.
    pub fn values(&self) -> Array1<f64> {
        Array1::from(self.weights.clone())
    }

    /// Trim to `universe` and renormalize; assets absent from these weights
    /// count as zero.
    pub fn restrict(&self, universe: &AssetUniverse) -> Result<Self> {
        Self::new(
            universe
                .iter()
                .map(|asset| (asset.to_string(), self.get(asset).unwrap_or(0.0))),
        )
    }
}
