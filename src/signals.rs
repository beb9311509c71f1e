//! # Boundary signal vocabulary.
//!
//! The types exchanged between dispatchers and the orchestrator:
//!
//! ```text
//! Dispatcher ──► StartSignal / CancelSignal / RecoverSignal / ShutdownSignal ──► Orchestrator
//! Orchestrator ──► StatusSignal / ResultsSignal ──► every Dispatcher
//! ```
//!
//! Inbound signals fan in over per-dispatcher mpsc channels; outbound
//! snapshots fan out over the broadcast feeds. All payloads are in-process —
//! no wire format lives here.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::error::SequenceError;
use crate::flow::Progress;
use crate::states::{Sequence, Tag};

/// Opaque unique identifier of one test run, minted by the dispatcher that
/// issues the run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TestId(Uuid);

impl TestId {
    /// Mints a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Steady states of the orchestrator's run loop.
///
/// `Unknown` is a construction default only, never a valid steady state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestratorState {
    #[default]
    Unknown,
    Idle,
    Running,
    FatalError,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrchestratorState::Unknown => "unknown",
            OrchestratorState::Idle => "idle",
            OrchestratorState::Running => "running",
            OrchestratorState::FatalError => "fatal_error",
        };
        f.write_str(s)
    }
}

/// Request to run a sequence. Metadata is opaque pass-through; the engine
/// never interprets it.
#[derive(Clone)]
pub struct StartSignal {
    /// Id of the requested run.
    pub test_id: TestId,
    /// The ordered steps to execute.
    pub sequence: Sequence,
    /// Dispatcher-defined key/value context, forwarded untouched.
    pub metadata: HashMap<String, String>,
}

impl StartSignal {
    /// Builds a start signal with empty metadata.
    pub fn new(test_id: TestId, sequence: Sequence) -> Self {
        Self {
            test_id,
            sequence,
            metadata: HashMap::new(),
        }
    }
}

/// Request to cancel the queued or currently running test with this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelSignal {
    pub test_id: TestId,
}

/// Request to leave the fatal-error state and return to idle.
///
/// Accepted only while the orchestrator is in
/// [`OrchestratorState::FatalError`]; otherwise logged and ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverSignal;

/// Request to stop the scheduling loop. Best-effort teardown: a running test
/// is cancelled first, queued tests are abandoned.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutdownSignal;

/// Snapshot of the orchestrator's observable state, published to every
/// dispatcher on each change.
///
/// Each backing field is individually mutex-protected; the snapshot is a
/// consistent read of each field at publication time, not an atomic read
/// across all of them.
#[derive(Clone)]
pub struct StatusSignal {
    /// Current run-loop state.
    pub state: OrchestratorState,
    /// Id of the running test; only meaningful while `state` is `Running`.
    pub test_id: Option<TestId>,
    /// Latest progress snapshot of the running test, if any.
    pub progress: Option<Progress>,
    /// Current length of the test queue.
    pub queue_length: usize,
    /// The latched fatal error; only meaningful while `state` is `FatalError`.
    pub fatal_error: Option<SequenceError>,
}

/// End-of-run verdict for one test, published to every dispatcher.
#[derive(Clone)]
pub struct ResultsSignal {
    /// Id of the finished (or cancelled) test.
    pub test_id: TestId,
    /// Overall verdict: collaborator aggregation plus accumulated run errors.
    pub is_passing: bool,
    /// Tags whose submitted values failed validation.
    pub failed_tags: Vec<Tag>,
    /// Recoverable errors accumulated during the run, in step order.
    pub test_errors: Vec<SequenceError>,
}

impl ResultsSignal {
    /// Verdict synthesized by the orchestrator for a test that never ran
    /// (cancelled while queued).
    pub(crate) fn canceled(test_id: TestId) -> Self {
        Self {
            test_id,
            is_passing: false,
            failed_tags: Vec::new(),
            test_errors: Vec::new(),
        }
    }
}
