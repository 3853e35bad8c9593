use std::collections::{BTreeMap, BTreeSet};

use super::sliding_window::SlidingWindow;
use super::trend_tracker::{historical_median, DeltaSnapshot};
use crate::distribution::WeightDistribution;
use crate::fee_rates::FeeRates;

/// Projects mempool growth over the waiting time implied by each target
/// probability and finds the lowest bucket that still makes it into a block.
///
/// Block arrivals are modeled as a Poisson process, so the wait for the next
/// block is exponential with the observed mean inter-block interval.
#[derive(Debug, Clone)]
pub(crate) struct QuantileProjector {
    refresh_seconds: f64,
}

impl QuantileProjector {
    /// Block size in weight units (4MB = 4,000,000 WU)
    pub const BLOCK_WEIGHT_UNITS: f64 = 4_000_000.0;

    /// Mean inter-block interval assumed before any block was observed.
    pub const DEFAULT_INTERBLOCK_SECONDS: f64 = 600.0;

    pub fn new(refresh_seconds: u64) -> Self {
        Self {
            refresh_seconds: refresh_seconds.max(1) as f64,
        }
    }

    /// Seconds after which at least one block has arrived with `probability`,
    /// rounded up.
    pub fn target_delay(avg_interblock: f64, probability: f64) -> f64 {
        (-avg_interblock * (1.0 - probability).ln()).ceil()
    }

    /// Estimates the fee rates for every target probability.
    ///
    /// # Arguments
    /// * `current` - Weight distribution of the current block template
    /// * `history` - Retained delta snapshots
    /// * `anchor` - Lowest bundle bucket with positive weight
    /// * `avg_interblock` - Mean seconds between blocks
    pub fn project(
        &self,
        current: &WeightDistribution,
        history: &SlidingWindow<DeltaSnapshot>,
        anchor: u64,
        avg_interblock: f64,
    ) -> FeeRates {
        // Highest fee rates are mined first.
        let buckets: Vec<u64> = history
            .iter()
            .flat_map(|snapshot| snapshot.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .rev()
            .collect();

        let trends: BTreeMap<u64, f64> = buckets
            .iter()
            .map(|&bucket| (bucket, historical_median(history, bucket)))
            .collect();

        let backlog: f64 = current.range(..anchor).map(|(_, weight)| weight).sum();

        let projection = Projection {
            current,
            buckets: &buckets,
            trends: &trends,
            backlog,
            anchor,
        };

        FeeRates::from_fn(|probability| {
            let cycles = Self::target_delay(avg_interblock, probability) / self.refresh_seconds;
            projection.min_fee_rate(cycles).max(1)
        })
    }
}

struct Projection<'a> {
    current: &'a WeightDistribution,
    /// Buckets seen in the history, descending
    buckets: &'a [u64],
    /// Median delta per bucket
    trends: &'a BTreeMap<u64, f64>,
    /// Current weight strictly below the anchor
    backlog: f64,
    anchor: u64,
}

impl Projection<'_> {
    /// Lowest bucket whose cumulative projected weight, after `cycles`
    /// refresh periods of trend growth, fills a block.
    fn min_fee_rate(&self, cycles: f64) -> u64 {
        let mut projected = self.current.clone();
        for &bucket in self.buckets {
            *projected.entry(bucket).or_insert(0.0) += self.trends[&bucket] * cycles;
        }

        let total: f64 = projected.values().sum();
        if total < QuantileProjector::BLOCK_WEIGHT_UNITS {
            return self.anchor;
        }

        let mut weight = self.backlog;
        for &bucket in self.buckets {
            if bucket <= self.anchor {
                return self.anchor;
            }
            weight += projected[&bucket];
            if weight >= QuantileProjector::BLOCK_WEIGHT_UNITS {
                return bucket;
            }
        }

        self.anchor
    }
}
