//! Error types used across the scheduling engine.
//!
//! Errors are split by the layer that produces them:
//!
//! - [`StateError`] — one step's setup/run failed (timeout, cancellation,
//!   plain failure, or a caught panic).
//! - [`SequenceError`] — a per-run failure classified by the sequencer; the
//!   `Setup`/`Fatal` variants latch, the `Run` variant is recoverable.
//! - [`ProcessorError`] / [`DispatcherError`] — collaborator failures crossing
//!   the boundary contracts.
//! - [`OrchestratorError`] — startup/teardown problems in the scheduling loop
//!   itself, distinct from per-test outcomes.
//!
//! All step-level classification wraps the failure with the state name, so a
//! fatal error always names the step that raised it.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single state's `setup` or `run` phase.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// The phase exceeded the state's declared timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout budget that was exceeded.
        timeout: Duration,
    },

    /// The phase reported a failure.
    #[error("{error}")]
    Fail {
        /// The underlying failure message.
        error: String,
    },

    /// The run was cancelled while the phase was in flight.
    #[error("canceled")]
    Canceled,

    /// The phase panicked; the panic was caught by the sequencer.
    #[error("panicked: {message}")]
    Panicked {
        /// Captured panic payload, if printable.
        message: String,
    },
}

impl StateError {
    /// Convenience constructor for a plain failure.
    pub fn fail(error: impl Into<String>) -> Self {
        StateError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StateError::Timeout { .. } => "state_timeout",
            StateError::Fail { .. } => "state_failed",
            StateError::Canceled => "state_canceled",
            StateError::Panicked { .. } => "state_panicked",
        }
    }
}

/// Failure reported by the result-processing collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("result processor: {message}")]
pub struct ProcessorError {
    /// Human-readable failure description.
    pub message: String,
}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Per-run failure classified by the sequencer.
///
/// `Setup` and `Fatal` latch into the sequencer's fatal error and halt the
/// run; `Run` is recoverable and accumulated into the test's error list.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequenceError {
    /// A run was requested with an empty sequence.
    #[error("sequence cannot be empty")]
    Empty,

    /// A state's setup phase failed; the run halts and the error latches.
    #[error("setup failed in state '{state}': {source}")]
    Setup {
        /// Name of the state whose setup failed.
        state: String,
        source: StateError,
    },

    /// A state's run phase failed; recoverable, the run continues.
    #[error("run failed in state '{state}': {source}")]
    Run {
        /// Name of the state whose run failed.
        state: String,
        source: StateError,
    },

    /// A state reported a non-recoverable condition after running.
    #[error("fatal error in state '{state}': {source}")]
    Fatal {
        /// Name of the state that reported the condition.
        state: String,
        source: StateError,
    },

    /// The result processor failed mid-run; loop-level, not a test verdict.
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

impl SequenceError {
    /// Returns a short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SequenceError::Empty => "sequence_empty",
            SequenceError::Setup { .. } => "sequence_setup_failed",
            SequenceError::Run { .. } => "sequence_run_failed",
            SequenceError::Fatal { .. } => "sequence_fatal",
            SequenceError::Processor(_) => "sequence_processor_failed",
        }
    }

    /// True for errors that latch and halt the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SequenceError::Setup { .. } | SequenceError::Fatal { .. }
        )
    }
}

/// Failure reported by a dispatcher front-end during open/close.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("dispatcher: {message}")]
pub struct DispatcherError {
    /// Human-readable failure description.
    pub message: String,
}

impl DispatcherError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised by the orchestrator's own lifecycle.
///
/// These surface through `open`/`run`/`close` return values; per-test
/// failures travel through the results feed instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// `open` was called with no registered dispatchers.
    #[error("at least one dispatcher is required")]
    NoDispatchers,

    /// A dispatcher failed to open; startup aborts.
    #[error("dispatcher open '{name}': {source}")]
    DispatcherOpen {
        /// Name of the dispatcher that failed.
        name: String,
        source: DispatcherError,
    },

    /// One or more dispatchers failed to close. Collected, not
    /// short-circuited: every dispatcher gets its close call.
    #[error("dispatcher close failures: {failures:?}")]
    Close {
        /// One entry per failing dispatcher.
        failures: Vec<String>,
    },

    /// The sequencer (or its result processor) failed to open or close.
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

impl OrchestratorError {
    /// Returns a short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            OrchestratorError::NoDispatchers => "orchestrator_no_dispatchers",
            OrchestratorError::DispatcherOpen { .. } => "orchestrator_dispatcher_open",
            OrchestratorError::Close { .. } => "orchestrator_close",
            OrchestratorError::Sequence(_) => "orchestrator_sequence",
        }
    }
}
