//! # Engine configuration.
//!
//! [`Config`] centralizes the orchestrator's runtime settings and is passed
//! explicitly to constructors — there is no global configuration state.
//!
//! ## Field semantics
//! - `poll_period`: how long the scheduling loop waits between dequeue
//!   attempts when no control signal wakes it earlier.
//! - `feed_capacity`: ring-buffer size of the progress/status/results
//!   broadcast feeds (min 1; clamped by the bus).
//! - `signal_capacity`: buffer of each dispatcher's inbound signal channels.

use std::time::Duration;

/// Runtime configuration for the orchestrator and its feeds.
#[derive(Clone, Debug)]
pub struct Config {
    /// Poll interval of the scheduling loop while idle.
    pub poll_period: Duration,

    /// Capacity of each broadcast feed (progress, status, results).
    ///
    /// Subscribers that lag behind more than this many items observe
    /// `Lagged` and skip the missed updates.
    pub feed_capacity: usize,

    /// Capacity of each dispatcher inbound signal channel.
    pub signal_capacity: usize,
}

impl Default for Config {
    /// Defaults:
    ///
    /// - `poll_period = 100ms`
    /// - `feed_capacity = 64`
    /// - `signal_capacity = 16`
    fn default() -> Self {
        Self {
            poll_period: Duration::from_millis(100),
            feed_capacity: 64,
            signal_capacity: 16,
        }
    }
}
