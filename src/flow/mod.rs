//! # Sequence execution.
//!
//! - [`Sequencer`] — runs one [`Sequence`](crate::Sequence) to completion or
//!   early termination, publishing [`Progress`] snapshots and classifying
//!   each step's failure as fatal or recoverable
//! - [`RunOutcome`] — the per-run verdict handed back to the orchestrator
//! - [`ResultProcessor`] — external tag-aggregation collaborator
//!
//! See `orchestrator` for how runs are scheduled.

mod processor;
mod progress;
mod sequencer;

pub use processor::ResultProcessor;
pub use progress::Progress;
pub use sequencer::{RunOutcome, Sequencer};
