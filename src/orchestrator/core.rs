//! # Orchestrator: the scheduling loop and its fan-in/fan-out wiring.
//!
//! ```text
//! open():
//!   - requires ≥1 dispatcher
//!   - opens the sequence runner, subscribes to its progress feed
//!   - per dispatcher: open (handing out status/results subscriptions),
//!     spawn a monitor task over its four inbound signal channels
//!   - spawn the progress drain (cache snapshot → republish status)
//!
//! run():
//!   loop {
//!     select { poll timer | Shutdown → return | Recover → clear latches, Idle }
//!     if FatalError      → skip dequeue (queue keeps growing, nothing runs)
//!     dequeue or Idle    → publish status
//!     Sequencer::run     → blocks the loop: at most one active run
//!     publish Results    → clear cached progress → latch fatal if set
//!   }
//!
//! close():
//!   cancel monitors, close every dispatcher (collecting errors), close the
//!   sequence runner
//! ```
//!
//! ## Rules
//! - The queue, the cached progress, the state, the current-run handle, and
//!   the fatal latch each sit behind their own lock; no lock is held while
//!   publishing ("mutate then publish" are two independent steps).
//! - One monitor task per dispatcher; cancel-of-current and shutdown act
//!   through the current run's cancellation token, so they take effect even
//!   while the loop is blocked inside a run.
//! - Once the fatal latch is set, nothing dequeues until a Recover signal is
//!   accepted; Start requests received meanwhile wait in the queue.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::Bus;
use crate::config::Config;
use crate::error::{OrchestratorError, SequenceError};
use crate::flow::Progress;
use crate::latch::ErrorLatch;
use crate::orchestrator::contract::{
    Dispatcher, DispatcherSignals, OrchestratorFeeds, SequenceRunner,
};
use crate::orchestrator::queue::TestQueue;
use crate::signals::{
    CancelSignal, OrchestratorState, RecoverSignal, ResultsSignal, ShutdownSignal, StartSignal,
    StatusSignal, TestId,
};

/// Handle to the run currently executing, shared with the monitor tasks so
/// cancel/shutdown can reach a run in flight.
struct CurrentRun {
    test_id: TestId,
    cancel: CancellationToken,
}

/// State shared between the scheduling loop and the monitor tasks. Each field
/// is independently synchronized; none is mutated outside these methods.
struct Shared {
    state: Mutex<OrchestratorState>,
    queue: TestQueue,
    progress: Mutex<Option<Progress>>,
    current: Mutex<Option<CurrentRun>>,
    fatal: ErrorLatch<SequenceError>,
    status_feed: Bus<StatusSignal>,
    results_feed: Bus<ResultsSignal>,
    shutdown_tx: mpsc::Sender<ShutdownSignal>,
    recover_tx: mpsc::Sender<RecoverSignal>,
}

impl Shared {
    fn state(&self) -> OrchestratorState {
        *self.state.lock().expect("state poisoned")
    }

    fn set_state(&self, state: OrchestratorState) {
        *self.state.lock().expect("state poisoned") = state;
    }

    fn set_current(&self, current: Option<CurrentRun>) {
        *self.current.lock().expect("current run poisoned") = current;
    }

    fn current_test_id(&self) -> Option<TestId> {
        self.current
            .lock()
            .expect("current run poisoned")
            .as_ref()
            .map(|c| c.test_id)
    }

    fn clear_progress(&self) {
        *self.progress.lock().expect("progress poisoned") = None;
    }

    /// Publishes a status snapshot. Each backing field is read under its own
    /// lock and every lock is released before the publish itself.
    fn publish_status(&self) {
        let snapshot = StatusSignal {
            state: self.state(),
            test_id: self.current_test_id(),
            progress: self.progress.lock().expect("progress poisoned").clone(),
            queue_length: self.queue.len(),
            fatal_error: self.fatal.err(),
        };
        self.status_feed.publish(snapshot);
    }

    fn handle_start(&self, dispatcher: &str, signal: StartSignal) {
        match self.state() {
            OrchestratorState::Idle | OrchestratorState::Running => {
                let test_id = signal.test_id;
                if self.current_test_id() == Some(test_id) || self.queue.contains(test_id) {
                    warn!(dispatcher, %test_id, "duplicate test id, ignoring start request");
                    return;
                }

                info!(dispatcher, %test_id, "start signal received");
                self.queue.enqueue(signal);
                self.publish_status();
            }
            OrchestratorState::FatalError => {
                // Fatal gate: the request waits in the queue rather than
                // being dropped, so it still runs after recovery.
                info!(
                    dispatcher,
                    test_id = %signal.test_id,
                    "start received in fatal error state, queueing until recovery"
                );
                self.queue.enqueue(signal);
                self.publish_status();
            }
            OrchestratorState::Unknown => {
                warn!(dispatcher, "start received in unknown state, this should not happen");
            }
        }
    }

    fn handle_cancel(&self, dispatcher: &str, signal: CancelSignal) {
        info!(dispatcher, test_id = %signal.test_id, "cancel test signal received");

        let is_current = {
            let current = self.current.lock().expect("current run poisoned");
            match current.as_ref() {
                Some(run) if run.test_id == signal.test_id => {
                    run.cancel.cancel();
                    true
                }
                _ => false,
            }
        };
        if is_current {
            return;
        }

        if self.queue.remove(signal.test_id) {
            // The test never ran; the orchestrator synthesizes its verdict.
            self.results_feed
                .publish(ResultsSignal::canceled(signal.test_id));
            self.publish_status();
        } else {
            debug!(test_id = %signal.test_id, "cancel for unknown test id, ignoring");
        }
    }

    fn handle_recover(&self, dispatcher: &str) {
        match self.state() {
            OrchestratorState::FatalError => {
                info!(dispatcher, "recover from fatal signal received");
                if self.recover_tx.try_send(RecoverSignal).is_err() {
                    debug!(dispatcher, "recover already pending, dropping duplicate");
                }
            }
            state => {
                warn!(
                    dispatcher,
                    %state,
                    "commanded recover from fatal while not in fatal error state"
                );
            }
        }
    }

    fn handle_shutdown(&self, dispatcher: &str) {
        info!(dispatcher, "shutdown signal received");

        // Cancel the run in flight first; queued requests are abandoned.
        if let Some(run) = self.current.lock().expect("current run poisoned").as_ref() {
            run.cancel.cancel();
        }
        let _ = self.shutdown_tx.try_send(ShutdownSignal);
    }
}

/// Owns the run-loop state machine, the test queue, and the fan-in/fan-out
/// wiring between N dispatchers and one [`SequenceRunner`].
pub struct Orchestrator<S> {
    cfg: Config,
    sequencer: S,
    dispatchers: Vec<Arc<dyn Dispatcher>>,
    shared: Arc<Shared>,
    runtime_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    shutdown_rx: mpsc::Receiver<ShutdownSignal>,
    recover_rx: mpsc::Receiver<RecoverSignal>,
}

impl<S: SequenceRunner> Orchestrator<S> {
    /// Creates an orchestrator over the given runner and dispatchers.
    pub fn new(cfg: Config, sequencer: S, dispatchers: Vec<Arc<dyn Dispatcher>>) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(cfg.signal_capacity.max(1));
        let (recover_tx, recover_rx) = mpsc::channel(cfg.signal_capacity.max(1));

        let shared = Arc::new(Shared {
            state: Mutex::new(OrchestratorState::Unknown),
            queue: TestQueue::new(),
            progress: Mutex::new(None),
            current: Mutex::new(None),
            fatal: ErrorLatch::new(),
            status_feed: Bus::new(cfg.feed_capacity),
            results_feed: Bus::new(cfg.feed_capacity),
            shutdown_tx,
            recover_tx,
        });

        Self {
            cfg,
            sequencer,
            dispatchers,
            shared,
            runtime_token: CancellationToken::new(),
            tasks: Vec::new(),
            shutdown_rx,
            recover_rx,
        }
    }

    /// Opens the runner and every dispatcher, and spawns the monitor and
    /// progress-drain tasks. Errors here abort startup; nothing is latched.
    pub async fn open(&mut self) -> Result<(), OrchestratorError> {
        if self.dispatchers.is_empty() {
            return Err(OrchestratorError::NoDispatchers);
        }

        self.sequencer.open().await?;

        let progress_rx = self.sequencer.subscribe_to_progress();
        self.tasks.push(tokio::spawn(drain_progress(
            Arc::clone(&self.shared),
            progress_rx,
            self.runtime_token.child_token(),
        )));

        for dispatcher in &self.dispatchers {
            let feeds = OrchestratorFeeds {
                status: self.shared.status_feed.subscribe(),
                results: self.shared.results_feed.subscribe(),
            };
            let signals =
                dispatcher
                    .open(feeds)
                    .await
                    .map_err(|source| OrchestratorError::DispatcherOpen {
                        name: dispatcher.name().to_string(),
                        source,
                    })?;
            info!(dispatcher = dispatcher.name(), "dispatcher opened");

            self.tasks.push(tokio::spawn(monitor_dispatcher(
                Arc::clone(&self.shared),
                dispatcher.name().to_string(),
                signals,
                self.runtime_token.child_token(),
            )));
        }

        self.shared.set_state(OrchestratorState::Idle);
        self.shared.publish_status();
        Ok(())
    }

    /// The scheduling loop. Returns when a shutdown signal is accepted.
    ///
    /// The loop invokes the runner synchronously, which is the mechanism
    /// enforcing at most one active run system-wide. Its own return value is
    /// reserved for loop-level problems; per-test outcomes travel through the
    /// results feed.
    pub async fn run(&mut self) -> Result<(), OrchestratorError> {
        info!("scheduling loop started");

        loop {
            tokio::select! {
                _ = time::sleep(self.cfg.poll_period) => {}
                Some(_) = self.shutdown_rx.recv() => {
                    info!("shutdown accepted, stopping scheduling loop");
                    return Ok(());
                }
                Some(_) = self.recover_rx.recv() => {
                    info!("recovering from fatal error");
                    self.sequencer.reset_fatal_error();
                    self.shared.fatal.reset();
                    self.shared.set_state(OrchestratorState::Idle);
                    self.shared.publish_status();
                }
            }

            if self.shared.state() == OrchestratorState::FatalError {
                continue;
            }

            let Some(request) = self.shared.queue.dequeue() else {
                if self.shared.state() == OrchestratorState::Running {
                    self.shared.set_state(OrchestratorState::Idle);
                    self.shared.publish_status();
                }
                continue;
            };

            let test_id = request.test_id;
            let run_token = self.runtime_token.child_token();
            self.shared.set_current(Some(CurrentRun {
                test_id,
                cancel: run_token.clone(),
            }));
            self.shared.set_state(OrchestratorState::Running);
            self.shared.publish_status();

            let result = self
                .sequencer
                .run(run_token, request.sequence, test_id)
                .await;
            self.shared.set_current(None);

            let results = match result {
                Ok(outcome) => ResultsSignal {
                    test_id,
                    is_passing: outcome.passed,
                    failed_tags: outcome.failed_tags,
                    test_errors: outcome.errors,
                },
                Err(err) => {
                    error!(%test_id, error = %err, "sequencer run failed");
                    ResultsSignal {
                        test_id,
                        is_passing: false,
                        failed_tags: Vec::new(),
                        test_errors: vec![err],
                    }
                }
            };
            self.shared.results_feed.publish(results);
            self.shared.clear_progress();

            if let Some(fatal) = self.sequencer.fatal_error() {
                error!(error = %fatal, "fatal error latched, gating all further runs");
                self.shared.fatal.set(fatal);
                self.shared.set_state(OrchestratorState::FatalError);
            }
            self.shared.publish_status();
        }
    }

    /// Tears the engine down: stops the monitor tasks, closes every
    /// dispatcher (collecting individual failures rather than
    /// short-circuiting), then closes the runner.
    pub async fn close(&mut self) -> Result<(), OrchestratorError> {
        info!("closing orchestrator");

        self.runtime_token.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        let mut failures = Vec::new();
        for dispatcher in &self.dispatchers {
            if let Err(err) = dispatcher.close().await {
                failures.push(format!("{}: {err}", dispatcher.name()));
            }
        }

        self.sequencer.close().await?;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::Close { failures })
        }
    }

    /// Subscribes to the status feed (primarily for harnesses that are not
    /// full dispatchers).
    pub fn subscribe_to_status(&self) -> broadcast::Receiver<StatusSignal> {
        self.shared.status_feed.subscribe()
    }

    /// Subscribes to the results feed.
    pub fn subscribe_to_results(&self) -> broadcast::Receiver<ResultsSignal> {
        self.shared.results_feed.subscribe()
    }
}

/// Fans one dispatcher's signals into the shared intake. One task per
/// dispatcher, running until context cancellation or shutdown.
async fn monitor_dispatcher(
    shared: Arc<Shared>,
    name: String,
    mut signals: DispatcherSignals,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            Some(signal) = signals.start.recv() => shared.handle_start(&name, signal),
            Some(signal) = signals.cancel.recv() => shared.handle_cancel(&name, signal),
            Some(_) = signals.recover.recv() => shared.handle_recover(&name),
            Some(_) = signals.shutdown.recv() => {
                shared.handle_shutdown(&name);
                break;
            }
            else => break,
        }
    }
    debug!(dispatcher = %name, "dispatcher monitor stopped");
}

/// Drains the runner's progress feed into the shared cache and republishes
/// status on every update.
async fn drain_progress(
    shared: Arc<Shared>,
    mut progress_rx: broadcast::Receiver<Progress>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            msg = progress_rx.recv() => match msg {
                Ok(progress) => {
                    *shared.progress.lock().expect("progress poisoned") = Some(progress);
                    shared.publish_status();
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "progress feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    debug!("progress drain stopped");
}
