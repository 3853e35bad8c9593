use serde::{Deserialize, Serialize};

use crate::distribution::DistributionMode;
use crate::error::{EstimatorError, Result};

/// Settings for a [`FeeEstimator`](crate::FeeEstimator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorOptions {
    /// How template transactions are grouped before bucketing (default: txs)
    #[serde(default)]
    pub mode: DistributionMode,

    /// Seconds between two estimation cycles (default: 30)
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u64,

    /// Log per-cycle diagnostics at debug level
    #[serde(default)]
    pub debug: bool,
}

fn default_refresh_seconds() -> u64 {
    EstimatorOptions::DEFAULT_REFRESH_SECONDS
}

impl EstimatorOptions {
    pub const DEFAULT_REFRESH_SECONDS: u64 = 30;

    pub fn new(mode: DistributionMode, refresh_seconds: u64) -> Self {
        Self {
            mode,
            refresh_seconds,
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Rejects settings the polling loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_seconds == 0 {
            return Err(EstimatorError::invalid_config(
                "refresh period must be at least one second",
            ));
        }
        Ok(())
    }
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self::new(DistributionMode::default(), Self::DEFAULT_REFRESH_SECONDS)
    }
}
