//! # Sequencer: ordered execution of one sequence.
//!
//! The [`Sequencer`] runs a [`Sequence`] to completion or early termination,
//! enforcing a per-step timeout on each phase, classifying failures as fatal
//! or recoverable, and publishing [`Progress`] snapshots to subscribers.
//!
//! ## Per-step flow
//! ```text
//! publish Progress{current_state, state_index}
//!   ├─► setup(ctx)   ── error ──► latch FATAL, stop loop
//!   ├─► run(ctx)     ── error ──► record recoverable, continue
//!   ├─► record state duration
//!   ├─► fatal_error()── Some  ──► latch FATAL, stop loop
//!   ├─► submit tags / errors to ResultProcessor
//!   │       └─ failed tag + !continue_on_fail ──► stop loop
//!   └─► cancel observed ──► stop loop, run is canceled, not passing
//! ```
//!
//! After the loop, by any exit path: `complete = true`, `state_index` one past
//! the last attempted index, final snapshot published, then
//! `ResultProcessor::complete_test` yields the end-of-run verdict.
//!
//! ## Rules
//! - Steps execute strictly in list order; no step begins until the prior
//!   step's setup, run, and fatal check have all completed.
//! - Each phase gets a child [`CancellationToken`] bounded by the step's
//!   declared timeout; a cancelled or timed-out phase is abandoned.
//! - An operator cancel observed in either phase stops the run marked
//!   canceled; cancellation never latches the fatal error.
//! - A panicking phase is caught and latched as fatal: hardware state after a
//!   panic is unknown.
//! - Progress publication is fire-and-forget broadcast; a slow subscriber
//!   misses updates, it never blocks the run.
//! - The latched fatal error persists across runs until
//!   [`reset_fatal_error`](Sequencer::reset_fatal_error); the `Sequencer`
//!   itself is reusable once reset.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::Bus;
use crate::error::{SequenceError, StateError};
use crate::flow::processor::ResultProcessor;
use crate::flow::progress::Progress;
use crate::latch::ErrorLatch;
use crate::signals::TestId;
use crate::states::{Sequence, Tag};

/// End-of-run verdict handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Overall pass/fail: the result processor's aggregation, minus any
    /// accumulated recoverable errors, cancellation, or fatal break.
    pub passed: bool,
    /// Tags whose submitted values failed validation, in submission order.
    pub failed_tags: Vec<Tag>,
    /// Recoverable errors accumulated during the run, one at most per state.
    pub errors: Vec<SequenceError>,
    /// True if the run was terminated early by a cancel request.
    pub canceled: bool,
}

/// Executes sequences one at a time, publishing progress and latching the
/// first fatal error until explicitly reset.
pub struct Sequencer {
    processor: Arc<dyn ResultProcessor>,
    progress_feed: Bus<Progress>,
    fatal: ErrorLatch<SequenceError>,
}

impl Sequencer {
    /// Creates a sequencer delegating tag/result aggregation to `processor`.
    ///
    /// `feed_capacity` bounds the progress broadcast ring buffer.
    pub fn new(processor: Arc<dyn ResultProcessor>, feed_capacity: usize) -> Self {
        Self {
            processor,
            progress_feed: Bus::new(feed_capacity),
            fatal: ErrorLatch::new(),
        }
    }

    /// Opens the result processor. Called once at startup.
    pub async fn open(&self) -> Result<(), SequenceError> {
        self.processor.open().await?;
        Ok(())
    }

    /// Closes the result processor.
    pub async fn close(&self) -> Result<(), SequenceError> {
        info!("closing sequencer");
        self.processor.close().await?;
        Ok(())
    }

    /// Subscribes to progress snapshots across runs. Dropping the receiver
    /// unsubscribes; safe at any time.
    pub fn subscribe_to_progress(&self) -> broadcast::Receiver<Progress> {
        self.progress_feed.subscribe()
    }

    /// Returns the latched fatal error, if any. Must be checked after
    /// [`run`](Sequencer::run): a set value means the run halted early and no
    /// further run will be scheduled until recovery.
    pub fn fatal_error(&self) -> Option<SequenceError> {
        self.fatal.err()
    }

    /// Clears the fatal latch, enabling subsequent runs.
    pub fn reset_fatal_error(&self) {
        self.fatal.reset();
    }

    /// Runs `sequence` to completion or early termination.
    ///
    /// `cancel` is the run's unified cancellation token: the orchestrator
    /// cancels it on operator request or shutdown, and every step phase runs
    /// under a child of it bounded by the step's timeout.
    ///
    /// The returned error is reserved for loop-level problems (empty
    /// sequence, result-processor failure); per-test outcomes, including a
    /// fatal halt, travel through [`RunOutcome`] and the fatal latch.
    pub async fn run(
        &self,
        cancel: CancellationToken,
        sequence: Sequence,
        test_id: TestId,
    ) -> Result<RunOutcome, SequenceError> {
        if sequence.is_empty() {
            return Err(SequenceError::Empty);
        }

        info!(
            %test_id,
            sequence = %sequence.name,
            states = sequence.len(),
            "starting sequence"
        );

        let mut progress = Progress::new(sequence.clone());
        let mut errors: Vec<SequenceError> = Vec::new();
        let mut failed_tags: Vec<Tag> = Vec::new();
        let mut canceled = false;
        let mut attempted = 0usize;
        let mut loop_failure: Option<SequenceError> = None;

        'steps: for (idx, state) in sequence.states.iter().enumerate() {
            progress.current_state = Some(state.clone());
            progress.state_index = idx;
            self.publish_progress(&progress);
            attempted = idx + 1;

            let started = Instant::now();

            debug!(state = state.name(), "setting up state");
            if let Err(e) = Self::execute_phase(&cancel, state.timeout(), |ctx| state.setup(ctx)).await
            {
                // An operator cancel is a routine early stop, never fatal.
                if matches!(e, StateError::Canceled) {
                    info!(%test_id, state = state.name(), "canceled during setup, stopping sequence early");
                    progress.state_durations[idx] = started.elapsed();
                    canceled = true;
                    break 'steps;
                }

                let fatal = SequenceError::Setup {
                    state: state.name().to_string(),
                    source: e,
                };
                error!(state = state.name(), error = %fatal, "setup failed, halting sequence");
                progress.state_durations[idx] = started.elapsed();

                if let Err(pe) = self.processor.submit_error(&fatal).await {
                    loop_failure = Some(pe.into());
                }
                self.fatal.set(fatal);
                break 'steps;
            }

            debug!(state = state.name(), "running state");
            let mut step_error: Option<SequenceError> = None;
            if let Err(e) = Self::execute_phase(&cancel, state.timeout(), |ctx| state.run(ctx)).await
            {
                if matches!(e, StateError::Canceled) {
                    info!(%test_id, state = state.name(), "canceled during run, stopping sequence early");
                    progress.state_durations[idx] = started.elapsed();
                    canceled = true;
                    break 'steps;
                }

                // Bench state is unknown after a panic; halt like a fatal.
                if matches!(e, StateError::Panicked { .. }) {
                    let fatal = SequenceError::Fatal {
                        state: state.name().to_string(),
                        source: e,
                    };
                    error!(state = state.name(), error = %fatal, "run panicked, halting sequence");
                    progress.state_durations[idx] = started.elapsed();

                    if let Err(pe) = self.processor.submit_error(&fatal).await {
                        loop_failure = Some(pe.into());
                    }
                    self.fatal.set(fatal);
                    break 'steps;
                }

                let err = SequenceError::Run {
                    state: state.name().to_string(),
                    source: e,
                };
                warn!(state = state.name(), error = %err, "run failed, continuing sequence");
                step_error = Some(err);
            }

            progress.state_durations[idx] = started.elapsed();

            if let Some(e) = state.fatal_error() {
                let fatal = SequenceError::Fatal {
                    state: state.name().to_string(),
                    source: e,
                };
                error!(state = state.name(), error = %fatal, "state reported fatal error, halting sequence");

                if let Err(pe) = self.processor.submit_error(&fatal).await {
                    loop_failure = Some(pe.into());
                }
                self.fatal.set(fatal);
                break 'steps;
            }

            let mut state_passed = true;

            if let Some(err) = step_error {
                state_passed = false;
                if let Err(pe) = self.processor.submit_error(&err).await {
                    loop_failure = Some(pe.into());
                    break 'steps;
                }
                errors.push(err);
            }

            let mut tag_failed = false;
            for (tag, value) in state.results() {
                match self.processor.submit_tag(&tag.id, &value).await {
                    Ok(true) => {}
                    Ok(false) => {
                        state_passed = false;
                        tag_failed = true;
                        failed_tags.push(tag);
                    }
                    Err(pe) => {
                        loop_failure = Some(pe.into());
                        break 'steps;
                    }
                }
            }
            progress.state_passed[idx] = state_passed;

            if tag_failed && !state.continue_on_fail() {
                info!(state = state.name(), "failed tags, stopping sequence early");
                break 'steps;
            }

            if cancel.is_cancelled() {
                info!(%test_id, "test canceled, stopping sequence early");
                canceled = true;
                break 'steps;
            }
        }

        progress.complete = true;
        progress.state_index = attempted;
        self.publish_progress(&progress);

        if let Some(failure) = loop_failure {
            return Err(failure);
        }

        let verdict = self.processor.complete_test(test_id, &sequence.name).await?;
        let passed = verdict && errors.is_empty() && !canceled && !self.fatal.is_set();

        info!(%test_id, passed, errors = errors.len(), "sequence complete");

        Ok(RunOutcome {
            passed,
            failed_tags,
            errors,
            canceled,
        })
    }

    /// Executes one phase under a child token, bounded by `timeout` and the
    /// run's cancellation. Panics are caught and surfaced as errors.
    async fn execute_phase<F, Fut>(
        cancel: &CancellationToken,
        timeout: Duration,
        phase: F,
    ) -> Result<(), StateError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = Result<(), StateError>>,
    {
        let child = cancel.child_token();
        let fut = AssertUnwindSafe(phase(child.clone())).catch_unwind();

        tokio::select! {
            res = time::timeout(timeout, fut) => match res {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(StateError::Panicked {
                    message: panic_message(panic),
                }),
                Err(_elapsed) => {
                    child.cancel();
                    Err(StateError::Timeout { timeout })
                }
            },
            _ = cancel.cancelled() => {
                child.cancel();
                Err(StateError::Canceled)
            }
        }
    }

    fn publish_progress(&self, progress: &Progress) {
        let reached = self.progress_feed.publish(progress.clone());
        debug!(subscribers = reached, "published progress");
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
