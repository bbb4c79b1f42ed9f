//! Ordered asset universe.

use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered set of unique asset identifiers.
///
/// The order is significant: containers aligned to a universe store their
/// values in this order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AssetUniverse {
    assets: Vec<String>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl AssetUniverse {
    /// Create a universe, rejecting duplicate identifiers.
    pub fn new<I, S>(assets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut universe = Self::default();
        for asset in assets {
            let asset = asset.into();
            if universe.positions.contains_key(&asset) {
                return Err(RiskError::DuplicateAsset(asset));
            }
            universe.positions.insert(asset.clone(), universe.assets.len());
            universe.assets.push(asset);
        }
        Ok(universe)
    }

    /// Number of assets.
    pub const fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the universe is empty.
    pub const fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Assets in universe order.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Iterate over assets in universe order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.assets.iter().map(String::as_str)
    }

    /// Whether `asset` belongs to the universe.
    pub fn contains(&self, asset: &str) -> bool {
        self.positions.contains_key(asset)
    }

    /// Index of `asset` in universe order.
    pub fn position(&self, asset: &str) -> Option<usize> {
        self.positions.get(asset).copied()
    }

    /// Assets present in both universes, in the order of `self`.
    pub fn intersect(&self, other: &Self) -> Self {
        let assets: Vec<String> = self
            .assets
            .iter()
            .filter(|asset| other.contains(asset))
            .cloned()
            .collect();
        let positions = assets
            .iter()
            .enumerate()
            .map(|(i, asset)| (asset.clone(), i))
            .collect();
        Self { assets, positions }
    }
}

impl TryFrom<Vec<String>> for AssetUniverse {
    type Error = RiskError;

    fn try_from(assets: Vec<String>) -> Result<Self> {
        Self::new(assets)
    }
}

impl From<AssetUniverse> for Vec<String> {
    fn from(universe: AssetUniverse) -> Self {
        universe.assets
    }
}
