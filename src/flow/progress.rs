//! Per-run progress snapshots.

use std::time::Duration;

use crate::states::{Sequence, StateRef};

/// Snapshot of a running sequence, published to progress subscribers whenever
/// new information is available.
///
/// `state_durations` and `state_passed` have exactly `sequence.len()` slots,
/// populated left-to-right as steps finish. `complete` turns true only after
/// the step loop exits, normally or via a fatal break; at that point
/// `state_index` sits one past the last attempted index.
#[derive(Clone)]
pub struct Progress {
    /// The currently running state, if the run has started.
    pub current_state: Option<StateRef>,
    /// Index of the currently running state in the sequence.
    pub state_index: usize,
    /// The sequence being run.
    pub sequence: Sequence,
    /// True once the step loop has exited.
    pub complete: bool,
    /// Wall time each finished step took (setup entry through run exit).
    pub state_durations: Vec<Duration>,
    /// Verdict of each finished step.
    pub state_passed: Vec<bool>,
}

impl Progress {
    /// Fresh snapshot for the start of a run; one zeroed slot per state.
    pub(crate) fn new(sequence: Sequence) -> Self {
        let slots = sequence.len();
        Self {
            current_state: None,
            state_index: 0,
            sequence,
            complete: false,
            state_durations: vec![Duration::ZERO; slots],
            state_passed: vec![false; slots],
        }
    }

    /// Total number of states in the running sequence.
    pub fn total_states(&self) -> usize {
        self.sequence.len()
    }
}
