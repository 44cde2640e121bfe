//! Audio frames and the bounded frame queue between the capture callback
//! and the session worker.
//!
//! The cpal callback runs on a latency-sensitive audio thread: it may only
//! copy samples and push, never block.  [`FrameQueue`] therefore implements
//! **drop-oldest backpressure** — when the queue is full the oldest frame is
//! discarded and the new one admitted, keeping staleness bounded without
//! ever stalling the producer.
//!
//! # Example
//!
//! ```rust
//! use voice_pipeline::audio::{AudioFrame, FrameQueue};
//! use std::time::Duration;
//!
//! let queue = FrameQueue::new(4);
//! queue.push(AudioFrame::new(vec![0.0; 512]));
//! let frame = queue.pop_timeout(Duration::from_millis(10)).unwrap();
//! assert_eq!(frame.samples.len(), 512);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// A single block of mono `f32` samples at the active stream rate.
///
/// Ownership passes once into the [`FrameQueue`]; the session worker takes
/// it back out with [`FrameQueue::pop_timeout`].
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }
}

// ---------------------------------------------------------------------------
// FrameQueue
// ---------------------------------------------------------------------------

/// Default queue depth — at 1 024-sample frames and 16 kHz this bounds
/// staleness to roughly 16 seconds of audio.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct Inner {
    frames: Mutex<VecDeque<AudioFrame>>,
    available: Condvar,
    capacity: usize,
}

/// Bounded, drop-oldest frame buffer shared between the audio callback and
/// the session worker.
///
/// Cheap to clone (`Arc` internally).  `push` never blocks; `pop_timeout`
/// waits up to the given duration so the consumer can poll its wall-clock
/// timeouts even when frames are sparse.
#[derive(Clone)]
pub struct FrameQueue {
    inner: Arc<Inner>,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FrameQueue capacity must be > 0");
        Self {
            inner: Arc::new(Inner {
                frames: Mutex::new(VecDeque::with_capacity(capacity)),
                available: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Append a frame, discarding the oldest queued frame when full.
    ///
    /// Safe to call from the real-time audio callback: the critical section
    /// is a deque push/pop and the call never waits on the consumer.
    pub fn push(&self, frame: AudioFrame) {
        let mut frames = match self.inner.frames.lock() {
            Ok(guard) => guard,
            // A poisoned lock means the consumer panicked; dropping the
            // frame is the only safe response on the audio thread.
            Err(_) => return,
        };
        if frames.len() == self.inner.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
        drop(frames);
        self.inner.available.notify_one();
    }

    /// Remove and return the oldest frame, waiting up to `timeout` for one
    /// to arrive.  Returns `None` only after the full timeout has elapsed
    /// with the queue empty — a spurious condvar wakeup resumes the wait.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<AudioFrame> {
        let frames = self.inner.frames.lock().ok()?;
        let (mut frames, _result) = self
            .inner
            .available
            .wait_timeout_while(frames, timeout, |f| f.is_empty())
            .ok()?;
        frames.pop_front()
    }

    /// Discard all queued frames.  Called at session start so a new session
    /// never sees audio recorded before it began.
    pub fn clear(&self) {
        if let Ok(mut frames) = self.inner.frames.lock() {
            frames.clear();
        }
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.inner.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// Returns `true` when no frames are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of frames the queue can hold.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
