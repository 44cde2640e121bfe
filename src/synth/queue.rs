//! Bounded FIFO of outgoing synthesis requests.
//!
//! The opposite overflow policy from the capture-side
//! [`FrameQueue`](crate::audio::FrameQueue): speech already queued keeps
//! its place, a request that does not fit is dropped.  Submission never
//! blocks the caller.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Default request capacity.
pub const DEFAULT_SYNTH_QUEUE_CAPACITY: usize = 40;

#[derive(Debug)]
struct Inner {
    requests: Mutex<VecDeque<String>>,
    available: Condvar,
    capacity: usize,
}

/// Cloneable handle to a bounded request queue shared between submitters
/// and the synthesis worker.
#[derive(Debug, Clone)]
pub struct SynthesisQueue {
    inner: Arc<Inner>,
}

impl SynthesisQueue {
    /// Create a queue holding at most `capacity` requests.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Arc::new(Inner {
                requests: Mutex::new(VecDeque::with_capacity(capacity)),
                available: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Enqueue `text` for synthesis.  Returns `false` (and logs a warning)
    /// when the queue is full; the request is dropped, queued requests keep
    /// their order.  Never blocks.
    pub fn submit(&self, text: String) -> bool {
        let mut requests = self
            .inner
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if requests.len() >= self.inner.capacity {
            log::warn!(
                "synthesis queue full ({} requests); dropping new request",
                self.inner.capacity
            );
            return false;
        }
        requests.push_back(text);
        drop(requests);
        self.inner.available.notify_one();
        true
    }

    /// Dequeue the oldest request, waiting up to `timeout` for one to
    /// arrive.  Returns `None` on timeout.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<String> {
        let requests = self
            .inner
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let (mut requests, _) = self
            .inner
            .available
            .wait_timeout_while(requests, timeout, |q| q.is_empty())
            .unwrap_or_else(|e| e.into_inner());
        requests.pop_front()
    }

    /// Discard all pending requests.
    pub fn clear(&self) {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
