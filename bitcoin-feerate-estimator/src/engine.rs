//! The polling loop driving one estimation cycle per refresh period.

use chrono::Utc;
use std::future::Future;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::distribution::{anchor_bucket, bundles_distribution, txs_distribution, DistributionMode};
use crate::error::EstimatorError;
use crate::fee_rates::{BlockSummary, EstimateResult, FeeRates};
use crate::internal::{stats, QuantileProjector, SlidingWindow, TrendTracker};
use crate::options::EstimatorOptions;
use crate::rpc::{BlockHeader, NodeRpc, RpcError, TEMPLATE_RULES};

/// Number of inter-block intervals averaged (about one day of blocks).
const INTERBLOCK_SAMPLES: usize = 144;

/// Lifecycle of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    /// Cancellation was requested; no further results are emitted.
    Stopping,
    Stopped,
}

/// Messages delivered to the estimator's consumer, in cycle order.
#[derive(Debug)]
pub enum EstimatorEvent {
    /// Result of one polling cycle.
    Estimate(EstimateResult),
    /// The estimation task terminated abnormally; nothing follows.
    Failed(EstimatorError),
}

/// Why a cycle ended early.
#[derive(Debug)]
enum CycleError {
    Cancelled,
    Rpc(RpcError),
}

/// Owns every piece of state carried between cycles.
pub(crate) struct EstimationEngine<R> {
    rpc: R,
    mode: DistributionMode,
    refresh: Duration,
    debug: bool,
    cancel: CancellationToken,
    state: EngineState,
    state_tx: watch::Sender<EngineState>,

    last_block_hash: Option<String>,
    last_block: Option<BlockSummary>,
    previous_block_time: Option<u64>,
    interblocks: SlidingWindow<f64>,
    tracker: TrendTracker,
    projector: QuantileProjector,
    /// Fee rates of the last successful cycle, reported by degraded cycles
    last_fees: FeeRates,
}

impl<R: NodeRpc> EstimationEngine<R> {
    pub fn new(
        rpc: R,
        options: &EstimatorOptions,
        cancel: CancellationToken,
        state_tx: watch::Sender<EngineState>,
    ) -> Self {
        Self {
            rpc,
            mode: options.mode,
            refresh: Duration::from_secs(options.refresh_seconds),
            debug: options.debug,
            cancel,
            state: EngineState::Running,
            state_tx,
            last_block_hash: None,
            last_block: None,
            previous_block_time: None,
            interblocks: SlidingWindow::new(INTERBLOCK_SAMPLES),
            tracker: TrendTracker::new(options.refresh_seconds),
            projector: QuantileProjector::new(options.refresh_seconds),
            last_fees: FeeRates::default(),
        }
    }

    /// Runs cycles until cancelled or until the consumer goes away.
    pub async fn run(
        mut self,
        events: mpsc::Sender<EstimatorEvent>,
        latest: watch::Sender<Option<EstimateResult>>,
    ) {
        info!(
            "Fee estimator started (mode: {}, refresh: {}s)",
            self.mode,
            self.refresh.as_secs()
        );

        while self.state == EngineState::Running {
            let start = Instant::now();
            if self.debug {
                debug!("Starting new iteration at {}", Utc::now().to_rfc3339());
            }

            let result = match self.run_cycle().await {
                Ok(result) => result,
                Err(CycleError::Cancelled) => {
                    self.transition(EngineState::Stopping);
                    break;
                }
                Err(CycleError::Rpc(err)) => {
                    error!("Encountered RPC error: {}", err);
                    self.degraded_result()
                }
            };

            if !self.emit(result, &events, &latest).await {
                break;
            }

            if self.debug {
                debug!(
                    "Done, cycle lasted {:.3} sec",
                    start.elapsed().as_secs_f64()
                );
            }

            if !self.pace(start).await {
                self.transition(EngineState::Stopping);
            }
        }

        self.transition(EngineState::Stopped);
        info!("Fee estimator stopped");
    }

    /// Performs one full polling cycle and returns its result.
    async fn run_cycle(&mut self) -> Result<EstimateResult, CycleError> {
        let (hash, mempool) = cancellable(&self.cancel, async {
            tokio::try_join!(self.rpc.get_best_block_hash(), self.rpc.get_mempool_info())
        })
        .await?;

        if self.last_block_hash.as_deref() != Some(hash.as_str()) {
            self.tracker.reset();
            self.last_block_hash = Some(hash.clone());

            let header = cancellable(&self.cancel, self.rpc.get_block_header(&hash)).await?;
            self.on_new_block(header);
        }

        let avg_interblock = self.average_interblock();

        let template =
            cancellable(&self.cancel, self.rpc.get_block_template(&TEMPLATE_RULES)).await?;
        let transactions = template.transactions;

        // The anchor always comes from the bundle view: packages are what
        // actually clears at the bottom of a block.
        let bundles = bundles_distribution(&transactions);
        let anchor = anchor_bucket(&bundles);
        let weights = match self.mode {
            DistributionMode::Txs => txs_distribution(&transactions),
            DistributionMode::Bundles => bundles,
        };

        if self.debug {
            debug!(
                "Template holds {} transactions in {} buckets (anchor: {:?}, avg interblock: {:.1}s)",
                transactions.len(),
                weights.len(),
                anchor,
                avg_interblock
            );
        }

        self.tracker.observe(&weights, anchor);

        let fees = match anchor {
            Some(lb) => {
                self.projector
                    .project(&weights, self.tracker.history(), lb, avg_interblock)
            }
            None => {
                warn!("Block template has no fee-paying transactions, reusing previous fee rates");
                self.last_fees
            }
        };

        if self.debug {
            debug!("Calculated new feerates: {}", fees);
        }
        self.last_fees = fees;

        Ok(EstimateResult {
            ready: mempool.loaded,
            last_block: self.last_block.clone(),
            fees,
        })
    }

    fn on_new_block(&mut self, header: BlockHeader) {
        info!("Detected new block {} ({})", header.height, header.hash);

        if header.time > 0 {
            if let Some(previous) = self.previous_block_time {
                self.interblocks.push(header.time as f64 - previous as f64);
            }
            self.previous_block_time = Some(header.time);
        }

        self.last_block = Some(BlockSummary {
            height: header.height,
            hash: header.hash,
            time: header.time,
        });
    }

    /// Mean of the retained inter-block intervals, 600s until one is known.
    fn average_interblock(&self) -> f64 {
        stats::mean(self.interblocks.iter().copied())
            .unwrap_or(QuantileProjector::DEFAULT_INTERBLOCK_SECONDS)
    }

    /// Result reported when a cycle failed: previous fee rates, not ready.
    fn degraded_result(&self) -> EstimateResult {
        EstimateResult {
            ready: false,
            last_block: self.last_block.clone(),
            fees: self.last_fees,
        }
    }

    /// Delivers a result unless cancellation was requested first.
    ///
    /// Returns false when the loop must end.
    async fn emit(
        &mut self,
        result: EstimateResult,
        events: &mpsc::Sender<EstimatorEvent>,
        latest: &watch::Sender<Option<EstimateResult>>,
    ) -> bool {
        if self.cancel.is_cancelled() {
            self.transition(EngineState::Stopping);
            return false;
        }

        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            sent = events.send(EstimatorEvent::Estimate(result.clone())) => Some(sent.is_ok()),
        };

        match sent {
            Some(true) => {
                latest.send_replace(Some(result));
                true
            }
            Some(false) => {
                info!("Estimate receiver dropped, stopping");
                self.transition(EngineState::Stopping);
                false
            }
            None => {
                self.transition(EngineState::Stopping);
                false
            }
        }
    }

    /// Sleeps out the rest of the refresh period started at `start`.
    ///
    /// Returns false if cancelled while waiting.
    async fn pace(&self, start: Instant) -> bool {
        let deadline = start + self.refresh;
        if Instant::now() >= deadline {
            return !self.cancel.is_cancelled();
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep_until(deadline) => true,
        }
    }

    fn transition(&mut self, state: EngineState) {
        if self.state != state {
            debug!("Fee estimator state: {:?} -> {:?}", self.state, state);
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }
}

/// Races an RPC call against cancellation, dropping the call if cancelled.
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, RpcError>>,
) -> Result<T, CycleError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CycleError::Cancelled),
        result = call => result.map_err(CycleError::Rpc),
    }
}
