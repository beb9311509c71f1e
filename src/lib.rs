//! # testrig
//!
//! **testrig** is a test-run scheduling engine for hardware-in-the-loop
//! benches.
//!
//! External controllers ("dispatchers") request that a named, ordered list of
//! test steps ("states") be run; exactly one such run is active at a time;
//! results and live progress are broadcast back to every dispatcher; a step
//! reporting a non-recoverable hardware condition latches the whole engine
//! into a fatal state requiring explicit operator recovery.
//!
//! ## Architecture
//! ```text
//!  ┌────────────┐  ┌────────────┐  ┌────────────┐
//!  │ Dispatcher │  │ Dispatcher │  │ Dispatcher │   (terminal UI, network
//!  │    #1      │  │    #2      │  │    #N      │    endpoint, harness, …)
//!  └─────┬──────┘  └─────┬──────┘  └─────┬──────┘
//!        │ Start / CancelTest / RecoverFromFatal / Shutdown
//!        ▼               ▼               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Orchestrator (scheduling loop)                             │
//! │  - TestQueue (FIFO, mutex-protected)                        │
//! │  - state machine: Idle / Running / FatalError               │
//! │  - one monitor task per dispatcher (signal fan-in)          │
//! │  - Status/Results feeds (broadcast fan-out)                 │
//! └───────────────────────────┬─────────────────────────────────┘
//!                             │ one sequence at a time
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Sequencer                                                  │
//! │  - ordered execution of States, per-step timeout            │
//! │  - fatal vs recoverable classification, first-error latch   │
//! │  - Progress feed (broadcast fan-out)                        │
//! │  - tag submission to the ResultProcessor collaborator       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! ```text
//! StartSignal ──► queue ──► dequeue ──► Sequencer::run ──► ResultsSignal
//!                    │                        │
//!                    │                        ├─ Progress ──► StatusSignal
//!                    │                        └─ fatal? ──► FatalError gate
//!                    └─ CancelSignal while queued ──► synthesized fail
//! ```
//!
//! ## Features
//! | Area            | Description                                             | Key types / traits                |
//! |-----------------|---------------------------------------------------------|-----------------------------------|
//! | **Steps**       | Opaque test steps with setup/run phases and timeouts.   | [`State`], [`Sequence`]           |
//! | **Execution**   | Ordered runs with fatal/recoverable classification.     | [`Sequencer`], [`RunOutcome`]     |
//! | **Scheduling**  | FIFO queue, single active run, fatal-error gating.      | [`Orchestrator`]                  |
//! | **Dispatchers** | Multi-controller fan-in/fan-out over channels.          | [`Dispatcher`]                    |
//! | **Results**     | External tag validation and end-of-run verdicts.        | [`ResultProcessor`], [`Tag`]      |
//! | **Errors**      | Layered taxonomy with a first-wins resettable latch.    | [`SequenceError`], [`ErrorLatch`] |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use testrig::{Config, Orchestrator, Sequencer};
//!
//! # async fn example(
//! #     processor: Arc<dyn testrig::ResultProcessor>,
//! #     dispatcher: Arc<dyn testrig::Dispatcher>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = Config::default();
//! let sequencer = Sequencer::new(processor, cfg.feed_capacity);
//!
//! let mut orchestrator = Orchestrator::new(cfg, sequencer, vec![dispatcher]);
//! orchestrator.open().await?;
//! orchestrator.run().await?; // blocks until a dispatcher requests shutdown
//! orchestrator.close().await?;
//! # Ok(())
//! # }
//! ```

mod bus;
mod config;
mod error;
mod flow;
mod latch;
mod orchestrator;
mod signals;
mod states;

// ---- Public re-exports ----

pub use bus::Bus;
pub use config::Config;
pub use error::{DispatcherError, OrchestratorError, ProcessorError, SequenceError, StateError};
pub use flow::{Progress, ResultProcessor, RunOutcome, Sequencer};
pub use latch::ErrorLatch;
pub use orchestrator::{
    Dispatcher, DispatcherHandle, DispatcherSignals, Orchestrator, OrchestratorFeeds,
    SequenceRunner, TestQueue,
};
pub use signals::{
    CancelSignal, OrchestratorState, RecoverSignal, ResultsSignal, ShutdownSignal, StartSignal,
    StatusSignal, TestId,
};
pub use states::{Sequence, State, StateRef, Tag, TagValue};
