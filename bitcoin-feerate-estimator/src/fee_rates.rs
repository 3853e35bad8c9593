use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target confirmation probabilities estimated on every cycle, in ascending order.
pub const TARGET_PROBABILITIES: [f64; 6] = [0.1, 0.2, 0.5, 0.9, 0.99, 0.999];

/// Minimum fee rates (sat/vB) for each target confirmation probability.
///
/// Serializes as an object keyed by the probability, e.g.
/// `{"0.1": 3, "0.2": 3, "0.5": 4, "0.9": 6, "0.99": 9, "0.999": 12}`.
///
/// # Example
/// ```
/// use bitcoin_feerate_estimator::FeeRates;
///
/// let fees = FeeRates::default();
/// assert_eq!(fees.get(0.5), Some(1));
/// assert_eq!(fees.get(0.75), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRates {
    #[serde(rename = "0.1")]
    pub p10: u64,
    #[serde(rename = "0.2")]
    pub p20: u64,
    #[serde(rename = "0.5")]
    pub p50: u64,
    #[serde(rename = "0.9")]
    pub p90: u64,
    #[serde(rename = "0.99")]
    pub p99: u64,
    #[serde(rename = "0.999")]
    pub p999: u64,
}

impl FeeRates {
    /// Uses the same fee rate for every target probability.
    pub fn uniform(fee_rate: u64) -> Self {
        Self::from_fn(|_| fee_rate)
    }

    /// Builds the fee rates by evaluating `f` for each target probability,
    /// in ascending probability order.
    pub fn from_fn(mut f: impl FnMut(f64) -> u64) -> Self {
        let [p10, p20, p50, p90, p99, p999] = TARGET_PROBABILITIES.map(&mut f);
        Self {
            p10,
            p20,
            p50,
            p90,
            p99,
            p999,
        }
    }

    /// Gets the fee rate for one of the target probabilities.
    ///
    /// # Returns
    /// The fee rate in sat/vB, or None if `probability` is not a target
    pub fn get(&self, probability: f64) -> Option<u64> {
        self.iter()
            .find(|(p, _)| (p - probability).abs() < 1e-9)
            .map(|(_, fee_rate)| fee_rate)
    }

    /// Iterates over `(probability, fee rate)` pairs in ascending probability order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, u64)> {
        TARGET_PROBABILITIES.into_iter().zip(self.to_array())
    }

    fn to_array(self) -> [u64; 6] {
        [self.p10, self.p20, self.p50, self.p90, self.p99, self.p999]
    }
}

impl Default for FeeRates {
    /// One sat/vB everywhere, the value reported before any estimate exists.
    fn default() -> Self {
        Self::uniform(1)
    }
}

impl fmt::Display for FeeRates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (probability, fee_rate)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{probability}: {fee_rate} sat/vB")?;
        }
        Ok(())
    }
}

/// The most recently observed best block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub height: u64,
    pub hash: String,
    /// Block header timestamp, seconds since the Unix epoch
    pub time: u64,
}

impl BlockSummary {
    /// Header timestamp as a UTC datetime.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.time).ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

/// One message emitted by the estimator per polling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateResult {
    /// Whether the node reports its mempool as loaded. Always false for
    /// degraded cycles that reuse the previous fee rates.
    pub ready: bool,

    /// The last block seen by the estimator
    #[serde(rename = "lastBlock")]
    pub last_block: Option<BlockSummary>,

    pub fees: FeeRates,
}
