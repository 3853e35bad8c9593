use serde::{Deserialize, Serialize};

/// A transaction as listed by the node's `getblocktemplate` response.
///
/// Only the fields needed for fee estimation are kept: the weight, the
/// absolute fee and the in-template dependencies.
///
/// # Example
/// ```
/// use bitcoin_feerate_estimator::TemplateTransaction;
///
/// let transaction = TemplateTransaction::new(200, 300);
///
/// assert_eq!(transaction.virtual_size(), 50);
/// assert_eq!(transaction.fee_rate_bucket(), Some(6)); // 6 sat/vB
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTransaction {
    /// The transaction weight in weight units (WU)
    pub weight: u64,

    /// The transaction fee in satoshis
    pub fee: u64,

    /// 1-based indices of the template transactions this one spends from
    #[serde(default)]
    pub depends: Vec<usize>,
}

impl TemplateTransaction {
    /// Creates a transaction without in-template dependencies.
    pub fn new(weight: u64, fee: u64) -> Self {
        Self {
            weight,
            fee,
            depends: Vec::new(),
        }
    }

    /// Creates a transaction spending outputs of the given template entries.
    pub fn with_depends(weight: u64, fee: u64, depends: Vec<usize>) -> Self {
        Self {
            weight,
            fee,
            depends,
        }
    }

    /// Virtual size in vbytes, `ceil(weight / 4)`.
    pub fn virtual_size(&self) -> u64 {
        virtual_size(self.weight)
    }

    /// Fee rate in sat/vB, or 0.0 if weight is 0.
    pub fn fee_rate(&self) -> f64 {
        let vsize = self.virtual_size();
        if vsize == 0 {
            return 0.0;
        }
        self.fee as f64 / vsize as f64
    }

    /// The integer fee rate bucket this transaction falls into on its own.
    pub fn fee_rate_bucket(&self) -> Option<u64> {
        fee_rate_bucket(self.weight, self.fee)
    }
}

/// Conversion factor from weight units to virtual bytes.
///
/// 1 vB = 4 weight units (WU)
pub const WU_PER_VBYTE: u64 = 4;

/// Converts a weight to a virtual size, rounding up.
pub fn virtual_size(weight: u64) -> u64 {
    weight.div_ceil(WU_PER_VBYTE)
}

/// Bucket index for an aggregate `(weight, fee)` pair: the fee rate in
/// sat/vB rounded up, never below 1.
///
/// Returns `None` when the virtual size is zero and no fee rate exists.
pub fn fee_rate_bucket(weight: u64, fee: u64) -> Option<u64> {
    let vsize = virtual_size(weight);
    if vsize == 0 {
        return None;
    }
    Some(fee.div_ceil(vsize).max(1))
}
