use std::collections::{BTreeMap, BTreeSet};

use super::sliding_window::SlidingWindow;
use super::stats::median;
use crate::distribution::WeightDistribution;

/// Signed per-bucket weight change between two consecutive cycles.
pub(crate) type DeltaSnapshot = BTreeMap<u64, f64>;

/// How much delta history is retained, in seconds of polling.
const HISTORY_SECONDS: u64 = 600;

/// Tracks how the weight at each fee rate bucket evolves between cycles.
///
/// Fresh growth at or above the anchor bucket is trusted as is. Decreases,
/// and anything below the anchor, are replaced by the median of the
/// retained history for that bucket.
#[derive(Debug)]
pub(crate) struct TrendTracker {
    previous: Option<WeightDistribution>,
    history: SlidingWindow<DeltaSnapshot>,
}

impl TrendTracker {
    pub fn new(refresh_seconds: u64) -> Self {
        Self {
            previous: None,
            history: SlidingWindow::new(Self::history_len(refresh_seconds)),
        }
    }

    /// Number of delta snapshots kept: `floor(600 / refresh_seconds)`.
    pub fn history_len(refresh_seconds: u64) -> usize {
        (HISTORY_SECONDS / refresh_seconds.max(1)) as usize
    }

    /// Drops the previous distribution so the next cycle records no delta.
    ///
    /// Called when a new block arrives; the delta history itself is kept.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn history(&self) -> &SlidingWindow<DeltaSnapshot> {
        &self.history
    }

    /// Records the delta between `current` and the previous distribution,
    /// then makes `current` the new baseline.
    ///
    /// `anchor` is the lowest bundle bucket with positive weight; `None`
    /// disables the below-anchor smoothing. Returns whether a delta snapshot
    /// was recorded.
    pub fn observe(&mut self, current: &WeightDistribution, anchor: Option<u64>) -> bool {
        let recorded = match self.previous.take().filter(|previous| !previous.is_empty()) {
            Some(previous) => {
                let delta = self.delta(current, &previous, anchor);
                self.history.push(delta);
                true
            }
            None => false,
        };
        self.previous = Some(current.clone());
        recorded
    }

    fn delta(
        &self,
        current: &WeightDistribution,
        previous: &WeightDistribution,
        anchor: Option<u64>,
    ) -> DeltaSnapshot {
        let buckets: BTreeSet<u64> = current.keys().chain(previous.keys()).copied().collect();

        let mut delta: DeltaSnapshot = buckets
            .into_iter()
            .map(|bucket| {
                let raw = weight_at(current, bucket) - weight_at(previous, bucket);
                let at_or_above_anchor = anchor.map_or(true, |lb| bucket >= lb);
                let value = if at_or_above_anchor && raw >= 0.0 {
                    raw
                } else {
                    historical_median(&self.history, bucket)
                };
                (bucket, value)
            })
            .collect();

        // Buckets below the anchor are backlog, not block-filling pressure:
        // keep them on their smoothed history.
        if let (Some(lb), Some(latest)) = (anchor, self.history.latest()) {
            for &bucket in latest.keys().filter(|&&bucket| bucket < lb) {
                delta.insert(bucket, historical_median(&self.history, bucket));
            }
        }

        delta
    }
}

/// Median delta at `bucket` over the history, counting absent entries as 0.
///
/// An empty history yields 0.
pub(crate) fn historical_median(history: &SlidingWindow<DeltaSnapshot>, bucket: u64) -> f64 {
    if history.is_empty() {
        return 0.0;
    }
    median(history.iter().map(|snapshot| weight_at(snapshot, bucket)))
}

fn weight_at(distribution: &BTreeMap<u64, f64>, bucket: u64) -> f64 {
    distribution.get(&bucket).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dist(entries: &[(u64, f64)]) -> WeightDistribution {
        entries.iter().copied().collect()
    }

    fn latest(tracker: &TrendTracker) -> DeltaSnapshot {
        tracker.history().latest().cloned().unwrap()
    }

    #[test]
    fn test_history_len() {
        assert_eq!(TrendTracker::history_len(30), 20);
        assert_eq!(TrendTracker::history_len(7), 85);
        assert_eq!(TrendTracker::history_len(600), 1);
        assert_eq!(TrendTracker::history_len(601), 0);
    }

    #[test]
    fn test_first_observation_records_nothing() {
        let mut tracker = TrendTracker::new(30);
        assert!(!tracker.observe(&dist(&[(5, 100.0)]), Some(5)));
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn test_growth_at_or_above_anchor_is_kept() {
        let mut tracker = TrendTracker::new(30);
        tracker.observe(&dist(&[(5, 100.0), (10, 200.0)]), Some(5));
        assert!(tracker.observe(&dist(&[(5, 150.0), (10, 260.0), (12, 40.0)]), Some(5)));

        assert_eq!(latest(&tracker), dist(&[(5, 50.0), (10, 60.0), (12, 40.0)]));
    }

    #[test]
    fn test_decrease_falls_back_to_history() {
        let mut tracker = TrendTracker::new(30);
        tracker.observe(&dist(&[(5, 100.0), (10, 200.0)]), Some(5));
        tracker.observe(&dist(&[(5, 150.0), (10, 260.0)]), Some(5));
        tracker.observe(&dist(&[(5, 170.0), (10, 200.0)]), Some(5));

        assert_eq!(latest(&tracker), dist(&[(5, 20.0), (10, 60.0)]));
    }

    #[test]
    fn test_decrease_without_history_is_zero() {
        let mut tracker = TrendTracker::new(30);
        tracker.observe(&dist(&[(5, 100.0), (10, 200.0)]), Some(5));
        tracker.observe(&dist(&[(5, 40.0)]), Some(5));

        assert_eq!(latest(&tracker), dist(&[(5, 0.0), (10, 0.0)]));
    }

    #[test]
    fn test_below_anchor_uses_history_even_when_growing() {
        let mut tracker = TrendTracker::new(30);
        tracker.observe(&dist(&[(5, 100.0), (10, 200.0)]), Some(5));
        tracker.observe(&dist(&[(5, 150.0), (10, 260.0)]), Some(5));
        tracker.observe(&dist(&[(5, 170.0), (10, 200.0)]), Some(5));
        tracker.observe(&dist(&[(5, 200.0), (10, 300.0)]), Some(8));

        // median of 50 and 20 at bucket 5
        assert_eq!(latest(&tracker), dist(&[(5, 35.0), (10, 100.0)]));
    }

    #[test]
    fn test_latest_low_buckets_are_restabilized() {
        let mut tracker = TrendTracker::new(30);
        tracker.observe(&dist(&[(2, 100.0), (6, 100.0)]), Some(2));
        tracker.observe(&dist(&[(2, 140.0), (6, 100.0)]), Some(2));
        tracker.reset();
        tracker.observe(&dist(&[(6, 100.0)]), Some(6));
        tracker.observe(&dist(&[(6, 160.0)]), Some(6));

        // bucket 2 is in neither distribution but still sits in the latest snapshot
        assert_eq!(latest(&tracker), dist(&[(2, 40.0), (6, 60.0)]));
    }

    #[test]
    fn test_reset_skips_next_diff_and_keeps_history() {
        let mut tracker = TrendTracker::new(30);
        tracker.observe(&dist(&[(5, 100.0)]), Some(5));
        tracker.observe(&dist(&[(5, 130.0)]), Some(5));
        tracker.reset();

        assert!(!tracker.observe(&dist(&[(5, 10.0)]), Some(5)));
        assert_eq!(tracker.history().len(), 1);

        assert!(tracker.observe(&dist(&[(5, 25.0)]), Some(5)));
        assert_eq!(latest(&tracker), dist(&[(5, 15.0)]));
    }

    #[test]
    fn test_empty_previous_records_nothing() {
        let mut tracker = TrendTracker::new(30);
        tracker.observe(&WeightDistribution::new(), None);
        assert!(!tracker.observe(&dist(&[(5, 100.0)]), Some(5)));
    }

    #[test]
    fn test_no_anchor_trusts_growth_everywhere() {
        let mut tracker = TrendTracker::new(30);
        tracker.observe(&dist(&[(3, 100.0)]), None);
        tracker.observe(&dist(&[(3, 180.0)]), None);
        assert_eq!(latest(&tracker), dist(&[(3, 80.0)]));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = TrendTracker::new(300);
        for i in 0..10 {
            tracker.observe(&dist(&[(5, 100.0 * i as f64)]), Some(5));
        }
        assert_eq!(tracker.history().len(), 2);
    }
}
