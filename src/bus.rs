//! # Broadcast bus for fan-out feeds.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking publishing to any number of subscribers. The engine runs three
//! independent feeds over it: sequencer progress, orchestrator status, and
//! test results.
//!
//! ```text
//! Publisher (one per feed):            Subscribers (N):
//!   Sequencer ── Progress ──► Bus ───► orchestrator progress drain
//!   Orchestrator ── Status ──► Bus ──► dispatcher 1..N
//!   Orchestrator ── Results ─► Bus ──► dispatcher 1..N
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits on a receiver.
//! - **Bounded capacity**: a ring buffer of the most recent `capacity` items.
//! - **Lag handling**: a slow receiver observes `RecvError::Lagged(n)` and
//!   skips the `n` items it missed — subscribers must keep up or miss updates.
//! - **Unsubscribe**: dropping the receiver; idempotent by construction and
//!   safe after the publisher side has stopped.

use tokio::sync::broadcast;

/// Broadcast feed with best-effort, non-blocking delivery.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus<T> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Bus<T> {
    /// Creates a new bus with the given ring-buffer capacity (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes a value to all active subscribers.
    ///
    /// Returns the number of subscribers that will observe the value; zero if
    /// there are none (the value is dropped, the call still returns
    /// immediately).
    pub fn publish(&self, value: T) -> usize {
        self.tx.send(value).unwrap_or(0)
    }

    /// Creates an independent receiver observing values published after this
    /// call.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Number of currently attached receivers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
