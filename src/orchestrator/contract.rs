//! Capability contracts the orchestrator consumes from collaborators.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::{DispatcherError, SequenceError};
use crate::flow::{Progress, RunOutcome, Sequencer};
use crate::signals::{
    CancelSignal, RecoverSignal, ResultsSignal, ShutdownSignal, StartSignal, StatusSignal, TestId,
};
use crate::states::Sequence;

/// Sequence-execution capability consumed by the orchestrator.
///
/// `fatal_error` must be checked after every `run`: a set value gates all
/// further scheduling until `reset_fatal_error`.
#[async_trait]
pub trait SequenceRunner: Send + Sync + 'static {
    /// Sets the runner up. Called once during orchestrator open.
    async fn open(&self) -> Result<(), SequenceError>;

    /// Subscribes to progress snapshots across runs.
    fn subscribe_to_progress(&self) -> broadcast::Receiver<Progress>;

    /// Runs one sequence to completion or early termination.
    async fn run(
        &self,
        cancel: CancellationToken,
        sequence: Sequence,
        test_id: TestId,
    ) -> Result<RunOutcome, SequenceError>;

    /// Returns the latched fatal error, if any.
    fn fatal_error(&self) -> Option<SequenceError>;

    /// Clears the fatal latch, enabling subsequent runs.
    fn reset_fatal_error(&self);

    /// Tears the runner down. Called during orchestrator close.
    async fn close(&self) -> Result<(), SequenceError>;
}

#[async_trait]
impl SequenceRunner for Sequencer {
    async fn open(&self) -> Result<(), SequenceError> {
        Sequencer::open(self).await
    }

    fn subscribe_to_progress(&self) -> broadcast::Receiver<Progress> {
        Sequencer::subscribe_to_progress(self)
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        sequence: Sequence,
        test_id: TestId,
    ) -> Result<RunOutcome, SequenceError> {
        Sequencer::run(self, cancel, sequence, test_id).await
    }

    fn fatal_error(&self) -> Option<SequenceError> {
        Sequencer::fatal_error(self)
    }

    fn reset_fatal_error(&self) {
        Sequencer::reset_fatal_error(self)
    }

    async fn close(&self) -> Result<(), SequenceError> {
        Sequencer::close(self).await
    }
}

/// Subscriptions to the orchestrator's outbound feeds, handed to a dispatcher
/// when it opens.
///
/// Delivery is best-effort broadcast: a dispatcher that falls behind observes
/// `Lagged` and misses updates rather than slowing the publisher down.
pub struct OrchestratorFeeds {
    /// Status snapshots, published on every observable change.
    pub status: broadcast::Receiver<StatusSignal>,
    /// End-of-run verdicts.
    pub results: broadcast::Receiver<ResultsSignal>,
}

/// Receiving halves of one dispatcher's inbound signal channels, returned
/// from [`Dispatcher::open`] and drained by that dispatcher's monitor task.
pub struct DispatcherSignals {
    pub start: mpsc::Receiver<StartSignal>,
    pub cancel: mpsc::Receiver<CancelSignal>,
    pub recover: mpsc::Receiver<RecoverSignal>,
    pub shutdown: mpsc::Receiver<ShutdownSignal>,
}

impl DispatcherSignals {
    /// Creates the paired sending/receiving bundles with the given per-channel
    /// buffer. The [`DispatcherHandle`] side stays with the dispatcher
    /// implementation; the `DispatcherSignals` side is returned from `open`.
    pub fn channel(buffer: usize) -> (DispatcherHandle, DispatcherSignals) {
        let buffer = buffer.max(1);
        let (start_tx, start_rx) = mpsc::channel(buffer);
        let (cancel_tx, cancel_rx) = mpsc::channel(buffer);
        let (recover_tx, recover_rx) = mpsc::channel(buffer);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(buffer);

        (
            DispatcherHandle {
                start: start_tx,
                cancel: cancel_tx,
                recover: recover_tx,
                shutdown: shutdown_tx,
            },
            DispatcherSignals {
                start: start_rx,
                cancel: cancel_rx,
                recover: recover_rx,
                shutdown: shutdown_rx,
            },
        )
    }
}

/// Sending side of a dispatcher's signal channels.
///
/// Sends are fire-and-forget: once the orchestrator side is gone the signals
/// have nowhere to land and are dropped.
#[derive(Clone)]
pub struct DispatcherHandle {
    start: mpsc::Sender<StartSignal>,
    cancel: mpsc::Sender<CancelSignal>,
    recover: mpsc::Sender<RecoverSignal>,
    shutdown: mpsc::Sender<ShutdownSignal>,
}

impl DispatcherHandle {
    /// Requests that a sequence be run.
    pub async fn start_test(&self, signal: StartSignal) {
        let _ = self.start.send(signal).await;
    }

    /// Requests cancellation of the queued or running test with this id.
    pub async fn cancel_test(&self, test_id: TestId) {
        let _ = self.cancel.send(CancelSignal { test_id }).await;
    }

    /// Requests recovery from the fatal-error state.
    pub async fn recover_from_fatal(&self) {
        let _ = self.recover.send(RecoverSignal).await;
    }

    /// Requests engine shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(ShutdownSignal).await;
    }
}

/// External controller that submits run/cancel/recover/shutdown requests and
/// receives status/results broadcasts.
///
/// Implementations own their front-end (terminal UI, network endpoint,
/// scripted harness); the engine only sees this contract.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Stable dispatcher name, used in logs.
    fn name(&self) -> &str;

    /// Called once during orchestrator open. The dispatcher receives
    /// subscriptions to the outbound feeds and returns the receiving halves
    /// of its signal channels (see [`DispatcherSignals::channel`]).
    async fn open(&self, feeds: OrchestratorFeeds) -> Result<DispatcherSignals, DispatcherError>;

    /// Called once during orchestrator close.
    async fn close(&self) -> Result<(), DispatcherError>;
}
