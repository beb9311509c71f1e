//! # Resettable first-error latch.
//!
//! [`ErrorLatch`] stores at most one error between resets: the first
//! successful [`set`](ErrorLatch::set) wins, every later `set` is a no-op
//! until [`reset`](ErrorLatch::reset) re-arms the latch.
//!
//! The sequencer uses one latch for its fatal error, the orchestrator another
//! for its own fatal gate. "Latched" is what makes a fatal condition sticky:
//! it stays visible in every status publication until an operator recovers.
//!
//! ## Rules
//! - `set(e)` stores `e` only if no error is currently held.
//! - `err()` returns a clone of the held error, if any.
//! - `reset()` clears the held error and re-arms the latch.

use std::sync::Mutex;

/// First-wins error latch, cleared only by an explicit reset.
#[derive(Debug, Default)]
pub struct ErrorLatch<E> {
    inner: Mutex<Option<E>>,
}

impl<E: Clone> ErrorLatch<E> {
    /// Creates an empty, armed latch.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Latches `err` if nothing is held yet; otherwise a no-op.
    pub fn set(&self, err: E) {
        let mut slot = self.inner.lock().expect("error latch poisoned");
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    /// Returns the latched error, if any.
    pub fn err(&self) -> Option<E> {
        self.inner.lock().expect("error latch poisoned").clone()
    }

    /// True if an error is currently latched.
    pub fn is_set(&self) -> bool {
        self.inner.lock().expect("error latch poisoned").is_some()
    }

    /// Clears the latch and re-arms it for the next `set`.
    pub fn reset(&self) {
        *self.inner.lock().expect("error latch poisoned") = None;
    }
}
