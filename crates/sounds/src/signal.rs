// Binary wait signal shared between the caller and the audio subsystem's context

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// One-slot semaphore: `post` sets it, a successful wait consumes it.
/// Posting an already posted signal is a no-op.
pub struct Signal {
    posted: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            posted: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub fn post(&self) {
        *self.posted.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_posted(&self) -> bool {
        *self.posted.lock()
    }

    /// Block until posted
    pub fn wait(&self) {
        let mut posted = self.posted.lock();
        while !*posted {
            self.cond.wait(&mut posted);
        }
        *posted = false;
    }

    /// Block until posted or `deadline` passes. Returns false on timeout.
    /// Wakeups without a post wait again against the same deadline.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut posted = self.posted.lock();
        while !*posted {
            if self.cond.wait_until(&mut posted, deadline).timed_out() && !*posted {
                return false;
            }
        }
        *posted = false;
        true
    }

    /// Block for at most `timeout`. The deadline is fixed on entry.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => {
                self.wait();
                true
            }
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
