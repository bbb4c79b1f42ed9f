//! Invariants of labeled containers and spectral repair.

use ndarray::Array2;
use proptest::prelude::*;
use tangent_risk::covariance::{
    PositiveDefiniteConfig, enforce_positive_definite, is_positive_semi_definite,
};
use tangent_risk::{AssetUniverse, MarketWeights, ReturnVector};

fn raw_entry() -> impl Strategy<Value = (String, f64)> {
    (
        prop::sample::select(vec!["A", "B", "C", "D", "E"]),
        prop_oneof![4 => -0.5..0.5f64, 1 => Just(f64::NAN)],
    )
        .prop_map(|(asset, value)| (asset.to_string(), value))
}

fn symmetric_matrix() -> impl Strategy<Value = Array2<f64>> {
    (2usize..6).prop_flat_map(|n| {
        prop::collection::vec(-1.0..1.0f64, n * n).prop_map(move |values| {
            let m = Array2::from_shape_vec((n, n), values).unwrap();
            (&m + &m.t()) / 2.0
        })
    })
}

proptest! {
    #[test]
    fn cleaning_is_idempotent(entries in prop::collection::vec(raw_entry(), 0..20)) {
        let raw = ReturnVector::new(entries);
        let once = raw.cleaned();
        prop_assert!(once.is_clean());
        prop_assert_eq!(once.cleaned(), once.clone());
        prop_assert!(once.universe().is_ok());
    }

    #[test]
    fn cleaning_keeps_last_finite_value(entries in prop::collection::vec(raw_entry(), 1..20)) {
        let raw = ReturnVector::new(entries);
        let clean = raw.cleaned();
        for (asset, value) in clean.iter() {
            prop_assert_eq!(raw.get(asset), Some(value));
        }
    }

    #[test]
    fn restricted_weights_sum_to_one(
        weights in prop::collection::vec(0.01..10.0f64, 5),
        keep in prop::collection::vec(any::<bool>(), 5),
    ) {
        let assets = ["A", "B", "C", "D", "E"];
        let market = MarketWeights::new(assets.iter().copied().zip(weights)).unwrap();
        let kept: Vec<&str> = assets
            .iter()
            .zip(&keep)
            .filter_map(|(asset, k)| k.then_some(*asset))
            .collect();
        prop_assume!(!kept.is_empty());

        let universe = AssetUniverse::new(kept).unwrap();
        let trimmed = market.restrict(&universe).unwrap();
        prop_assert!((trimmed.values().sum() - 1.0).abs() < 1e-12);
        prop_assert!(trimmed.iter().all(|(_, w)| w >= 0.0));
    }

    #[test]
    fn spectral_repair_is_psd(matrix in symmetric_matrix()) {
        let repaired = enforce_positive_definite(&matrix, &PositiveDefiniteConfig::default()).unwrap();
        prop_assert!(is_positive_semi_definite(&repaired, 1e-9));
    }
}
