//! FIFO queue of pending run requests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::signals::{StartSignal, TestId};

/// Mutex-protected FIFO of [`StartSignal`]s.
///
/// Every mutation is a single short critical section; callers publish a fresh
/// status snapshot after each mutation so the observable queue length stays
/// current.
#[derive(Default)]
pub struct TestQueue {
    inner: Mutex<VecDeque<StartSignal>>,
}

impl TestQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends a request to the back of the queue.
    pub fn enqueue(&self, signal: StartSignal) {
        self.lock().push_back(signal);
    }

    /// Pops the request at the front, if any. Empty queue is a defined no-op.
    pub fn dequeue(&self) -> Option<StartSignal> {
        self.lock().pop_front()
    }

    /// Removes the queued request with this id. Returns false if no such
    /// request is queued (cancel of an unknown id is a defined no-op).
    pub fn remove(&self, test_id: TestId) -> bool {
        let mut queue = self.lock();
        if let Some(pos) = queue.iter().position(|s| s.test_id == test_id) {
            queue.remove(pos);
            true
        } else {
            false
        }
    }

    /// True if a request with this id is queued.
    pub fn contains(&self, test_id: TestId) -> bool {
        self.lock().iter().any(|s| s.test_id == test_id)
    }

    /// Current queue length.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<StartSignal>> {
        self.inner.lock().expect("test queue poisoned")
    }
}
