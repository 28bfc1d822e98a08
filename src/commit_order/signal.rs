//! Per-handle wake-up primitive
//!
//! Each registered transaction owns one signal. Its prior releases it on
//! unregister; only the owner ever waits on it. Waiting and waking never
//! touch the queue lock.

use std::sync::{Condvar, Mutex};

#[derive(Debug)]
pub(crate) struct CommitSignal {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl CommitSignal {
    pub(crate) fn new(ready: bool) -> Self {
        Self {
            ready: Mutex::new(ready),
            cond: Condvar::new(),
        }
    }

    /// Mark ready and wake the waiter, if any.
    pub(crate) fn release(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        *ready = true;
        self.cond.notify_all();
    }

    pub(crate) fn is_ready(&self) -> bool {
        *self.ready.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until released. Returns whether the caller actually had to
    /// wait.
    pub(crate) fn wait(&self) -> bool {
        let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
        let waited = !*ready;
        while !*ready {
            ready = self.cond.wait(ready).unwrap_or_else(|e| e.into_inner());
        }
        waited
    }
}
