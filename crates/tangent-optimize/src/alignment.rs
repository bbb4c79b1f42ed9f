//! Alignment of views, covariance and market weights to one asset universe.
//!
//! Steps, in order:
//!
//! 1. drop duplicate views, keeping the last occurrence
//! 2. drop missing (non-finite) views
//! 3. intersect view assets with covariance row and column labels
//! 4. trim everything to that intersection, in covariance row order
//! 5. restrict and renormalize market weights, or default to uniform
//!
//! The result is checked before it is returned: every component carries the
//! same labels in the same order.

use ndarray::Array1;
use tangent_risk::{AssetUniverse, CovarianceMatrix, MarketWeights, ReturnVector, RiskError};
use thiserror::Error;

/// Fewest assets an aligned set may contain.
pub const MIN_ALIGNED_ASSETS: usize = 2;

/// Alignment failures.
#[derive(Debug, Error)]
pub enum AlignmentError {
    /// Too few assets are common to every input
    #[error("Only {count} asset(s) common to views and covariance, need at least {required}")]
    TooFewAssets {
        /// Assets surviving the intersection
        count: usize,
        /// Minimum required
        required: usize,
    },

    /// Components disagree on labels after trimming
    #[error("Aligned {component} does not match the asset universe")]
    IndexMismatch {
        /// Offending component
        component: &'static str,
    },

    /// A container rejected the trimmed data
    #[error(transparent)]
    Risk(#[from] RiskError),
}

/// Views, covariance and market weights over one shared, ordered universe.
#[derive(Debug, Clone)]
pub struct AlignedInputs {
    universe: AssetUniverse,
    views: ReturnVector,
    covariance: CovarianceMatrix,
    market_weights: MarketWeights,
}

impl AlignedInputs {
    /// Align raw inputs. `market_weights` of `None` means uniform weights.
    pub fn new(
        views: &ReturnVector,
        covariance: &CovarianceMatrix,
        market_weights: Option<&MarketWeights>,
    ) -> Result<Self, AlignmentError> {
        let cleaned = views.cleaned();
        let dropped = views.len() - cleaned.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped duplicate or missing views");
        }

        let universe = covariance
            .rows()
            .intersect(covariance.columns())
            .intersect(&cleaned.universe()?);

        if universe.len() < MIN_ALIGNED_ASSETS {
            return Err(AlignmentError::TooFewAssets {
                count: universe.len(),
                required: MIN_ALIGNED_ASSETS,
            });
        }

        let trimmed_views = cleaned.len() - universe.len();
        let trimmed_covariance = covariance.rows().len() - universe.len();
        if trimmed_views > 0 || trimmed_covariance > 0 {
            tracing::warn!(
                trimmed_views,
                trimmed_covariance,
                kept = universe.len(),
                "trimmed inputs to common assets"
            );
        }

        let aligned = Self {
            views: cleaned.select(&universe)?,
            covariance: covariance.select(&universe)?,
            market_weights: match market_weights {
                Some(weights) => weights.restrict(&universe)?,
                None => MarketWeights::uniform(&universe)?,
            },
            universe,
        };
        aligned.verify()?;
        Ok(aligned)
    }

    fn verify(&self) -> Result<(), AlignmentError> {
        let expected = self.universe.assets();
        if self.views.assets() != expected {
            return Err(AlignmentError::IndexMismatch { component: "views" });
        }
        if self.covariance.rows().assets() != expected {
            return Err(AlignmentError::IndexMismatch {
                component: "covariance rows",
            });
        }
        if self.covariance.columns().assets() != expected {
            return Err(AlignmentError::IndexMismatch {
                component: "covariance columns",
            });
        }
        if self.market_weights.assets().assets() != expected {
            return Err(AlignmentError::IndexMismatch {
                component: "market weights",
            });
        }
        Ok(())
    }

    /// Shared asset universe.
    pub const fn universe(&self) -> &AssetUniverse {
        &self.universe
    }

    /// Clean views in universe order.
    pub const fn views(&self) -> &ReturnVector {
        &self.views
    }

    /// Covariance over the universe.
    pub const fn covariance(&self) -> &CovarianceMatrix {
        &self.covariance
    }

    /// Market weights over the universe, summing to one.
    pub const fn market_weights(&self) -> &MarketWeights {
        &self.market_weights
    }

    /// View values in universe order.
    pub fn view_values(&self) -> Array1<f64> {
        self.views.values()
    }

    /// Number of assets.
    pub const fn len(&self) -> usize {
        self.universe.len()
    }

    /// Whether the universe is empty.
    pub const fn is_empty(&self) -> bool {
        self.universe.is_empty()
    }

    /// Re-run alignment on already aligned inputs.
    pub fn realign(&self) -> Result<Self, AlignmentError> {
        Self::new(&self.views, &self.covariance, Some(&self.market_weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn universe(assets: &[&str]) -> AssetUniverse {
        AssetUniverse::new(assets.iter().copied()).unwrap()
    }

    fn bcd_covariance() -> CovarianceMatrix {
        CovarianceMatrix::square(
            universe(&["B", "C", "D"]),
            array![[0.04, 0.01, 0.0], [0.01, 0.09, 0.02], [0.0, 0.02, 0.16]],
        )
        .unwrap()
    }

    #[test]
    fn test_restricts_to_common_assets() {
        let views = ReturnVector::new([("A", 0.1), ("B", 0.2), ("C", 0.3)]);
        let aligned = AlignedInputs::new(&views, &bcd_covariance(), None).unwrap();

        assert_eq!(aligned.universe().assets(), ["B", "C"]);
        assert_eq!(aligned.views().assets(), vec!["B", "C"]);
        assert_eq!(aligned.covariance().get("C", "B"), Some(0.01));
        assert_abs_diff_eq!(aligned.market_weights().get("B").unwrap(), 0.5);
    }

    #[test]
    fn test_single_common_asset_fails() {
        let views = ReturnVector::new([("A", 0.1), ("B", 0.2)]);
        let err = AlignedInputs::new(&views, &bcd_covariance(), None).unwrap_err();
        assert!(matches!(err, AlignmentError::TooFewAssets { count: 1, required: 2 }));
    }

    #[test]
    fn test_follows_covariance_order() {
        let views = ReturnVector::new([("D", 0.4), ("B", 0.2), ("B", 0.25), ("C", f64::NAN)]);
        let aligned = AlignedInputs::new(&views, &bcd_covariance(), None).unwrap();

        assert_eq!(aligned.universe().assets(), ["B", "D"]);
        assert_eq!(aligned.view_values().to_vec(), vec![0.25, 0.4]);
        assert_eq!(aligned.covariance().values(), &array![[0.04, 0.0], [0.0, 0.16]]);
    }

    #[test]
    fn test_supplied_weights_renormalized() {
        let views = ReturnVector::new([("B", 0.2), ("C", 0.3), ("D", 0.1)]);
        let weights = MarketWeights::new([("A", 0.5), ("B", 0.3), ("C", 0.2)]).unwrap();
        let aligned = AlignedInputs::new(&views, &bcd_covariance(), Some(&weights)).unwrap();

        assert_abs_diff_eq!(aligned.market_weights().get("B").unwrap(), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(aligned.market_weights().get("C").unwrap(), 0.4, epsilon = 1e-12);
        assert_eq!(aligned.market_weights().get("D"), Some(0.0));
    }

    #[test]
    fn test_weights_with_no_mass_on_universe_fail() {
        let views = ReturnVector::new([("B", 0.2), ("C", 0.3)]);
        let weights = MarketWeights::new([("A", 1.0)]).unwrap();
        let err = AlignedInputs::new(&views, &bcd_covariance(), Some(&weights)).unwrap_err();
        assert!(matches!(err, AlignmentError::Risk(RiskError::InvalidWeights(_))));
    }

    #[test]
    fn test_realign_is_identity() {
        let views = ReturnVector::new([("C", 0.3), ("A", 0.1), ("B", 0.2)]);
        let once = AlignedInputs::new(&views, &bcd_covariance(), None).unwrap();
        let twice = once.realign().unwrap();

        assert_eq!(once.universe(), twice.universe());
        assert_eq!(once.views(), twice.views());
        assert_eq!(once.covariance(), twice.covariance());
        for (a, b) in once.market_weights().iter().zip(twice.market_weights().iter()) {
            assert_eq!(a.0, b.0);
            assert_abs_diff_eq!(a.1, b.1, epsilon = 1e-15);
        }
    }
}
