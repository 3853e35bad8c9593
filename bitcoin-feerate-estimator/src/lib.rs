//! Bitcoin fee rate estimator - live fee estimates from block templates
//!
//! This library polls a Bitcoin node for its block template, groups the
//! template transactions into fee rate buckets, tracks how the weight in each
//! bucket grows between polls, and projects that growth over the time it
//! takes for a block to arrive with a given probability.
//!
//! # Features
//! - Fee rates for 10%, 20%, 50%, 90%, 99% and 99.9% confirmation probability
//! - Per-transaction or CPFP-aware per-bundle distributions
//! - Median-smoothed growth trends reset on every new block
//! - A cancellable background task delivering results over a channel
//!
//! # Example
//! ```no_run
//! use bitcoin_feerate_estimator::{EstimatorEvent, EstimatorOptions, FeeEstimator, NodeRpc};
//!
//! # async fn run(node: impl NodeRpc + 'static) -> bitcoin_feerate_estimator::Result<()> {
//! let (estimator, mut events) = FeeEstimator::spawn(node, EstimatorOptions::default())?;
//!
//! if let Some(EstimatorEvent::Estimate(result)) = events.recv().await {
//!     println!("50% within the next block: {} sat/vB", result.fees.p50);
//! }
//!
//! estimator.stop();
//! estimator.join().await;
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod distribution;
pub mod error;
pub mod rpc;

// Data structures
mod fee_rates;
mod options;
mod template_transaction;

// Polling loop
mod engine;
mod fee_estimator;

// Internal implementation modules
pub(crate) mod internal;

// Public exports
pub use distribution::{DistributionMode, WeightDistribution};
pub use engine::{EngineState, EstimatorEvent};
pub use error::{EstimatorError, Result};
pub use fee_estimator::FeeEstimator;
pub use fee_rates::{BlockSummary, EstimateResult, FeeRates, TARGET_PROBABILITIES};
pub use options::EstimatorOptions;
pub use rpc::{BlockHeader, BlockTemplate, MempoolInfo, NodeRpc, RpcError};
pub use template_transaction::{TemplateTransaction, WU_PER_VBYTE};
