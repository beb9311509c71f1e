//! # Run scheduling.
//!
//! The [`Orchestrator`] owns the "what runs next" decision: a FIFO test
//! queue, the Idle/Running/FatalError state machine, fan-in of signals from N
//! dispatchers, and fan-out of status/results snapshots back to all of them.
//!
//! ```text
//! Dispatcher 1..N ──► monitor tasks ──► queue / cancel / recover / shutdown
//!                                           │
//!                                           ▼
//!                        scheduling loop ── dequeue ──► SequenceRunner::run
//!                                           │                  │
//!                        Status feed ◄──────┴──── Results feed ┘
//! ```
//!
//! Internal modules:
//! - [`contract`]: capability traits consumed from collaborators
//!   ([`Dispatcher`], [`SequenceRunner`]) and their channel bundles;
//! - [`queue`]: the mutex-protected FIFO of pending run requests;
//! - [`core`]: the orchestrator itself.

mod contract;
mod core;
mod queue;

pub use contract::{
    Dispatcher, DispatcherHandle, DispatcherSignals, OrchestratorFeeds, SequenceRunner,
};
pub use core::Orchestrator;
pub use queue::TestQueue;
