use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    engine::{EngineState, EstimationEngine, EstimatorEvent},
    error::{EstimatorError, Result},
    fee_rates::EstimateResult,
    options::EstimatorOptions,
    rpc::NodeRpc,
};

/// Handle to a running fee estimator.
///
/// The estimator polls the node once per refresh period on a background
/// task and delivers one [`EstimatorEvent::Estimate`] per cycle, in order,
/// on the channel returned by [`FeeEstimator::spawn`]. The channel closes
/// once the estimator has stopped.
///
/// # Example
/// ```no_run
/// use bitcoin_feerate_estimator::{
///     DistributionMode, EstimatorEvent, EstimatorOptions, FeeEstimator, NodeRpc,
/// };
///
/// # async fn run(node: impl NodeRpc + 'static) -> bitcoin_feerate_estimator::Result<()> {
/// let options = EstimatorOptions::new(DistributionMode::Bundles, 30);
/// let (estimator, mut events) = FeeEstimator::spawn(node, options)?;
///
/// while let Some(event) = events.recv().await {
///     match event {
///         EstimatorEvent::Estimate(result) => println!("{}", result.fees),
///         EstimatorEvent::Failed(err) => return Err(err),
///     }
/// }
///
/// estimator.join().await;
/// # Ok(())
/// # }
/// ```
pub struct FeeEstimator {
    cancel: CancellationToken,
    state: watch::Receiver<EngineState>,
    latest: watch::Receiver<Option<EstimateResult>>,
    supervisor: JoinHandle<()>,
}

impl FeeEstimator {
    /// Results buffered before the estimator waits on its consumer.
    pub const CHANNEL_CAPACITY: usize = 16;

    /// Starts polling `rpc` on a new task of the current Tokio runtime.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for unusable options and `Task` when called
    /// outside a Tokio runtime.
    pub fn spawn<R>(rpc: R, options: EstimatorOptions) -> Result<(Self, mpsc::Receiver<EstimatorEvent>)>
    where
        R: NodeRpc + 'static,
    {
        options.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| EstimatorError::task(format!("no Tokio runtime available: {err}")))?;

        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(Self::CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(EngineState::Running);
        let (latest_tx, latest_rx) = watch::channel(None);

        let engine = EstimationEngine::new(rpc, &options, cancel.clone(), state_tx.clone());
        let engine_events = events_tx.clone();
        let worker = runtime.spawn(engine.run(engine_events, latest_tx));

        // Turns an abnormal end of the worker into a final Failed event.
        let supervisor = runtime.spawn(async move {
            if let Err(err) = worker.await {
                error!("Fee estimator task failed: {}", err);
                state_tx.send_replace(EngineState::Stopped);
                let _ = events_tx
                    .send(EstimatorEvent::Failed(EstimatorError::task(err.to_string())))
                    .await;
            }
        });

        Ok((
            Self {
                cancel,
                state: state_rx,
                latest: latest_rx,
                supervisor,
            },
            events_rx,
        ))
    }

    /// Requests the estimator to stop.
    ///
    /// Returns immediately; an RPC call in flight is abandoned and no result
    /// is emitted afterwards. Calling it again has no effect.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == EngineState::Stopped
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// The most recently delivered result, if any.
    pub fn latest(&self) -> Option<EstimateResult> {
        self.latest.borrow().clone()
    }

    /// A receiver that observes every newly delivered result.
    pub fn subscribe(&self) -> watch::Receiver<Option<EstimateResult>> {
        self.latest.clone()
    }

    /// Waits for the background task to finish. Does not request a stop.
    pub async fn join(mut self) {
        if let Err(err) = (&mut self.supervisor).await {
            error!("Fee estimator supervisor failed: {}", err);
        }
    }
}

impl Drop for FeeEstimator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
