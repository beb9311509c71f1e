//! # State capability contract.
//!
//! A [`State`] is one step of a test: a setup phase, a run phase, a timeout
//! budget, and fatal-vs-recoverable failure reporting. Both phases receive a
//! [`CancellationToken`] that composes the step's deadline with operator
//! cancellation — implementations should check it and exit promptly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StateError;
use crate::states::tag::{Tag, TagValue};

/// Shared handle to a state, suitable for sequences and progress snapshots.
pub type StateRef = Arc<dyn State>;

/// One unit of test logic executed as part of a [`Sequence`](crate::Sequence).
///
/// ### Execution contract
/// - `setup` runs before `run`; each phase gets its own timeout budget of
///   [`timeout`](State::timeout) (a step may legally take up to ~2× its
///   declared timeout across both phases).
/// - A `setup` error is treated as **fatal**: the sequence halts and no later
///   state executes.
/// - A `run` error is **recoverable**: it is recorded and the sequence
///   continues.
/// - [`fatal_error`](State::fatal_error) is polled after `run`; a reported
///   condition halts the sequence (typical use: a hardware check that demands
///   operator intervention).
#[async_trait]
pub trait State: Send + Sync + 'static {
    /// Stable state name, preferably lower_snake_case. Used to wrap errors
    /// and in progress snapshots.
    fn name(&self) -> &str;

    /// Prepares the state for execution. Called before [`run`](State::run).
    async fn setup(&self, ctx: CancellationToken) -> Result<(), StateError>;

    /// Executes the main logic of the state.
    async fn run(&self, ctx: CancellationToken) -> Result<(), StateError>;

    /// Maximum duration each phase is allowed to run for.
    fn timeout(&self) -> Duration;

    /// Reports a non-recoverable condition observed during execution
    /// (typically a hardware failure). Polled by the sequencer after `run`.
    fn fatal_error(&self) -> Option<StateError> {
        None
    }

    /// Whether the sequence should continue past this state when one of its
    /// tags fails validation.
    fn continue_on_fail(&self) -> bool {
        false
    }

    /// Tag/value pairs gathered by this state, submitted to the result
    /// processor after `run`.
    fn results(&self) -> HashMap<Tag, TagValue> {
        HashMap::new()
    }
}
