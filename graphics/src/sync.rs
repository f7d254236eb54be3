//! CPU-GPU synchronization.
//!
//! [`Fence`] is a timeline fence: a monotonically increasing counter that
//! the GPU advances as submissions complete. The CPU waits for a specific
//! value instead of resetting and re-arming a binary fence.
//!
//! ```ignore
//! let fence = device.create_fence("readback");
//! let value = 1;
//! device.submit(list, Some((&fence, value)))?;
//! fence.wait(value);
//! let pixels = device.read_texture(&target)?;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Status of a fence relative to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The fence has not yet reached the value.
    Pending,
    /// The fence has reached or passed the value.
    Complete,
}

#[derive(Debug)]
struct FenceInner {
    label: String,
    completed: Mutex<u64>,
    cond: Condvar,
}

/// Timeline fence shared between the submitting thread and the GPU.
///
/// Cloning yields another handle to the same fence.
#[derive(Debug, Clone)]
pub struct Fence {
    inner: Arc<FenceInner>,
}

impl Fence {
    /// Create a fence at value 0.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(FenceInner {
                label: label.into(),
                completed: Mutex::new(0),
                cond: Condvar::new(),
            }),
        }
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Highest value signaled so far.
    pub fn completed_value(&self) -> u64 {
        *self.inner.completed.lock()
    }

    /// Status of `value`.
    pub fn status(&self, value: u64) -> FenceStatus {
        if self.completed_value() >= value {
            FenceStatus::Complete
        } else {
            FenceStatus::Pending
        }
    }

    /// Advance the fence to `value`. Lower values are ignored.
    pub fn signal(&self, value: u64) {
        let mut completed = self.inner.completed.lock();
        if value > *completed {
            *completed = value;
            self.inner.cond.notify_all();
        }
    }

    /// Block until the fence reaches `value`.
    pub fn wait(&self, value: u64) {
        let mut completed = self.inner.completed.lock();
        while *completed < value {
            self.inner.cond.wait(&mut completed);
        }
    }

    /// Block until the fence reaches `value` or `timeout` elapses.
    ///
    /// Returns `true` if the value was reached.
    pub fn wait_timeout(&self, value: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut completed = self.inner.completed.lock();
        while *completed < value {
            if self
                .inner
                .cond
                .wait_until(&mut completed, deadline)
                .timed_out()
            {
                return *completed >= value;
            }
        }
        true
    }
}

static_assertions::assert_impl_all!(Fence: Send, Sync);
