//! Property-based tests for the weight distributions
//!
//! These verify invariants that hold for any block template, whatever the
//! transaction mix or dependency graph.

use bitcoin_feerate_estimator::distribution::{
    anchor_bucket, bundles_distribution, txs_distribution,
};
use bitcoin_feerate_estimator::TemplateTransaction;
use proptest::prelude::*;

const MAX_WEIGHT: u64 = 400_000;
const MAX_FEE: u64 = 1_000_000;

/// A template where each transaction may depend on any earlier entries,
/// plus the occasional out-of-range index.
fn template_strategy() -> impl Strategy<Value = Vec<TemplateTransaction>> {
    prop::collection::vec(
        (
            prop_oneof![1u64..16, 1u64..MAX_WEIGHT],
            0u64..MAX_FEE,
            prop::collection::vec(0usize..64, 0..3),
        ),
        0..60,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, (weight, fee, depends))| {
                // keep most parents earlier in the template, like the node does
                let depends = depends
                    .into_iter()
                    .map(|d| if d < 60 { d % (index + 1) } else { d })
                    .collect();
                TemplateTransaction::with_depends(weight, fee, depends)
            })
            .collect()
    })
}

fn total_weight(txs: &[TemplateTransaction]) -> f64 {
    txs.iter().map(|tx| tx.weight as f64).sum()
}

proptest! {
    #[test]
    fn prop_txs_distribution_conserves_weight(txs in template_strategy()) {
        let dist = txs_distribution(&txs);
        let sum: f64 = dist.values().sum();
        prop_assert_eq!(sum, total_weight(&txs));
    }

    #[test]
    fn prop_bundles_distribution_conserves_weight(txs in template_strategy()) {
        let dist = bundles_distribution(&txs);
        let sum: f64 = dist.values().sum();
        prop_assert_eq!(sum, total_weight(&txs));
    }

    #[test]
    fn prop_buckets_are_at_least_one(txs in template_strategy()) {
        prop_assert!(txs_distribution(&txs).keys().all(|&bucket| bucket >= 1));
        prop_assert!(bundles_distribution(&txs).keys().all(|&bucket| bucket >= 1));
    }

    #[test]
    fn prop_bundles_never_fall_below_lowest_rate(txs in template_strategy()) {
        let txs_dist = txs_distribution(&txs);
        let bundles_dist = bundles_distribution(&txs);

        // merging never rounds a fee rate down; it may round it up past
        // every member, since ceil(sum w / 4) <= sum ceil(w / 4)
        if let Some(lo) = txs_dist.keys().next() {
            prop_assert!(bundles_dist.keys().all(|bucket| bucket >= lo));
        }
    }

    #[test]
    fn prop_bundle_and_txs_views_agree_on_total(txs in template_strategy()) {
        let txs_sum: f64 = txs_distribution(&txs).values().sum();
        let bundles_sum: f64 = bundles_distribution(&txs).values().sum();
        prop_assert_eq!(txs_sum, bundles_sum);
    }

    #[test]
    fn prop_dependent_chain_lands_in_one_bucket(
        links in prop::collection::vec((1u64..MAX_WEIGHT, 0u64..MAX_FEE), 1..20),
    ) {
        let txs: Vec<TemplateTransaction> = links
            .iter()
            .enumerate()
            .map(|(index, &(weight, fee))| {
                let depends = if index == 0 { Vec::new() } else { vec![index] };
                TemplateTransaction::with_depends(weight, fee, depends)
            })
            .collect();

        let dist = bundles_distribution(&txs);
        prop_assert_eq!(dist.len(), 1);
        prop_assert_eq!(anchor_bucket(&dist), dist.keys().next().copied());
    }

    #[test]
    fn prop_anchor_is_lowest_bucket(txs in template_strategy()) {
        let dist = bundles_distribution(&txs);
        prop_assert_eq!(anchor_bucket(&dist), dist.keys().next().copied());
    }
}
