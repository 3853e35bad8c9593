//! Fee rate weight distributions built from a block template.
//!
//! A distribution maps an integer fee rate bucket (sat/vB, rounded up) to the
//! total weight found at that fee rate. Two views are supported: one entry
//! per transaction, or one entry per bundle of transactions linked through
//! in-template dependencies (CPFP packages).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::EstimatorError;
use crate::template_transaction::{fee_rate_bucket, TemplateTransaction};

/// Map of fee rate bucket to aggregate weight in weight units.
pub type WeightDistribution = BTreeMap<u64, f64>;

/// Selects how template transactions are grouped before bucketing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    /// Every transaction is bucketed at its own fee rate.
    #[default]
    Txs,
    /// Dependent transactions are bucketed together at the package fee rate.
    Bundles,
}

impl DistributionMode {
    /// Builds the weight distribution of `transactions` for this mode.
    pub fn build(&self, transactions: &[TemplateTransaction]) -> WeightDistribution {
        match self {
            Self::Txs => txs_distribution(transactions),
            Self::Bundles => bundles_distribution(transactions),
        }
    }
}

impl fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Txs => write!(f, "txs"),
            Self::Bundles => write!(f, "bundles"),
        }
    }
}

impl FromStr for DistributionMode {
    type Err = EstimatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "txs" => Ok(Self::Txs),
            "bundles" => Ok(Self::Bundles),
            other => Err(EstimatorError::invalid_config(format!(
                "unknown mode '{other}' (expected txs or bundles)"
            ))),
        }
    }
}

/// Builds the per-transaction weight distribution.
pub fn txs_distribution(transactions: &[TemplateTransaction]) -> WeightDistribution {
    let mut weights: BTreeMap<u64, u64> = BTreeMap::new();

    for tx in transactions {
        if let Some(bucket) = tx.fee_rate_bucket() {
            let total = weights.entry(bucket).or_insert(0);
            *total = total.saturating_add(tx.weight);
        }
    }

    into_distribution(weights)
}

/// Builds the per-bundle weight distribution.
///
/// Transactions connected through `depends`, directly or transitively and in
/// either direction, form one bundle whose fee rate is the summed fee over
/// the summed virtual size. Dependency indices outside the template are
/// ignored.
pub fn bundles_distribution(transactions: &[TemplateTransaction]) -> WeightDistribution {
    let mut bundles = DisjointSet::new(transactions.len());

    for (index, tx) in transactions.iter().enumerate() {
        for &parent in &tx.depends {
            if (1..=transactions.len()).contains(&parent) {
                bundles.union(index, parent - 1);
            }
        }
    }

    // (weight, fee) totals indexed by bundle root
    let mut totals = vec![(0u64, 0u64); transactions.len()];
    for (index, tx) in transactions.iter().enumerate() {
        let root = bundles.find(index);
        let (weight, fee) = &mut totals[root];
        *weight = weight.saturating_add(tx.weight);
        *fee = fee.saturating_add(tx.fee);
    }

    let mut weights: BTreeMap<u64, u64> = BTreeMap::new();
    for (index, &(weight, fee)) in totals.iter().enumerate() {
        if bundles.find(index) != index {
            continue;
        }
        if let Some(bucket) = fee_rate_bucket(weight, fee) {
            let total = weights.entry(bucket).or_insert(0);
            *total = total.saturating_add(weight);
        }
    }

    into_distribution(weights)
}

/// Lowest bucket holding a positive weight.
///
/// Returns `None` for an empty template or a distribution without any
/// positive weight.
pub fn anchor_bucket(distribution: &WeightDistribution) -> Option<u64> {
    distribution
        .iter()
        .find(|(_, &weight)| weight > 0.0)
        .map(|(&bucket, _)| bucket)
}

fn into_distribution(weights: BTreeMap<u64, u64>) -> WeightDistribution {
    weights
        .into_iter()
        .map(|(bucket, weight)| (bucket, weight as f64))
        .collect()
}

/// Union-find over template positions with union by size and path halving.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Six transactions: 3 spends 1, 5 spends 2, the rest stand alone.
    fn sample_template() -> Vec<TemplateTransaction> {
        vec![
            TemplateTransaction::new(200, 300),
            TemplateTransaction::new(100, 300),
            TemplateTransaction::with_depends(200, 200, vec![1]),
            TemplateTransaction::new(150, 150),
            TemplateTransaction::with_depends(200, 500, vec![2]),
            TemplateTransaction::new(150, 300),
        ]
    }

    fn distribution(entries: &[(u64, f64)]) -> WeightDistribution {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_txs_distribution() {
        let result = txs_distribution(&sample_template());
        assert_eq!(
            result,
            distribution(&[(4, 350.0), (6, 200.0), (8, 150.0), (10, 200.0), (12, 100.0)])
        );
    }

    #[test]
    fn test_bundles_distribution() {
        let result = bundles_distribution(&sample_template());
        assert_eq!(
            result,
            distribution(&[(4, 150.0), (5, 400.0), (8, 150.0), (11, 300.0)])
        );
    }

    #[test]
    fn test_transitive_chain_forms_one_bundle() {
        let txs = vec![
            TemplateTransaction::new(400, 100),
            TemplateTransaction::with_depends(400, 100, vec![1]),
            TemplateTransaction::with_depends(400, 2800, vec![2]),
        ];
        // 3000 sat over 300 vB
        assert_eq!(bundles_distribution(&txs), distribution(&[(10, 1200.0)]));
    }

    #[test]
    fn test_bundles_merge_through_shared_parent() {
        // 2 and 3 both spend 1; 4 spends 3 and 5 is unrelated
        let txs = vec![
            TemplateTransaction::new(400, 100),
            TemplateTransaction::with_depends(400, 300, vec![1]),
            TemplateTransaction::with_depends(400, 500, vec![1]),
            TemplateTransaction::with_depends(400, 700, vec![3]),
            TemplateTransaction::new(400, 2000),
        ];
        // 1600 sat over 400 vB
        assert_eq!(
            bundles_distribution(&txs),
            distribution(&[(4, 1600.0), (20, 400.0)])
        );
    }

    #[test]
    fn test_child_with_several_parents_joins_separate_bundles() {
        let txs = vec![
            TemplateTransaction::new(400, 100),
            TemplateTransaction::new(400, 100),
            TemplateTransaction::with_depends(400, 1000, vec![1, 2]),
        ];
        // 1200 sat over 300 vB
        assert_eq!(bundles_distribution(&txs), distribution(&[(4, 1200.0)]));
    }

    #[test]
    fn test_out_of_range_dependencies_are_ignored() {
        let txs = vec![
            TemplateTransaction::with_depends(400, 500, vec![0, 7]),
            TemplateTransaction::new(400, 1000),
        ];
        assert_eq!(
            bundles_distribution(&txs),
            distribution(&[(5, 400.0), (10, 400.0)])
        );
    }

    #[test]
    fn test_empty_template() {
        assert!(txs_distribution(&[]).is_empty());
        assert!(bundles_distribution(&[]).is_empty());
        assert_eq!(anchor_bucket(&WeightDistribution::new()), None);
    }

    #[test]
    fn test_bundle_can_outrank_every_member() {
        // 2 vB + 1 vB individually, but only 2 vB once merged
        let txs = vec![
            TemplateTransaction::new(5, 2),
            TemplateTransaction::with_depends(3, 1, vec![1]),
        ];
        assert_eq!(txs_distribution(&txs), distribution(&[(1, 8.0)]));
        assert_eq!(bundles_distribution(&txs), distribution(&[(2, 8.0)]));
    }

    #[test]
    fn test_totals_saturate_on_huge_inputs() {
        let txs = vec![
            TemplateTransaction::new(u64::MAX, u64::MAX),
            TemplateTransaction::with_depends(u64::MAX, u64::MAX, vec![1]),
        ];
        let saturated = distribution(&[(4, u64::MAX as f64)]);
        assert_eq!(txs_distribution(&txs), saturated);
        assert_eq!(bundles_distribution(&txs), saturated);
    }

    #[test]
    fn test_anchor_bucket_skips_empty_buckets() {
        let dist = distribution(&[(2, 0.0), (3, 120.0), (9, 400.0)]);
        assert_eq!(anchor_bucket(&dist), Some(3));
    }

    #[test]
    fn test_mode_selects_builder() {
        let txs = sample_template();
        assert_eq!(DistributionMode::Txs.build(&txs), txs_distribution(&txs));
        assert_eq!(DistributionMode::Bundles.build(&txs), bundles_distribution(&txs));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("txs".parse::<DistributionMode>().unwrap(), DistributionMode::Txs);
        assert_eq!(
            "bundles".parse::<DistributionMode>().unwrap(),
            DistributionMode::Bundles
        );
        assert!("packages".parse::<DistributionMode>().is_err());
        assert_eq!(DistributionMode::default(), DistributionMode::Txs);
        assert_eq!(DistributionMode::Bundles.to_string(), "bundles");
    }
}
