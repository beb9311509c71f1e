//! Ordered list of states executed as one test.

use crate::states::state::StateRef;

/// A named, ordered list of states. Immutable for the duration of one run;
/// ownership moves into the sequencer when the run starts.
#[derive(Clone, Default)]
pub struct Sequence {
    /// Name of the sequence.
    pub name: String,
    /// Purpose of the sequence, for operators and reports.
    pub description: String,
    /// States to run, in order.
    pub states: Vec<StateRef>,
}

impl Sequence {
    /// Builds a sequence from its parts.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        states: Vec<StateRef>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            states,
        }
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if the sequence has no states. An empty sequence is rejected by
    /// the sequencer before any step executes.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
