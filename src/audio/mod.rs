//! Audio input plumbing — capture, frame queue, loudness and resampling.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → stereo_to_mono → AudioFrame → FrameQueue
//!           → session worker (→ resample → recognizer)
//! ```
//!
//! The callback side never blocks: [`FrameQueue`] drops its oldest frame on
//! overflow so the producer always makes progress and staleness stays
//! bounded.

pub mod capture;
pub mod frame;
pub mod level;
pub mod resample;

pub use capture::{
    AudioSource, CaptureError, MicSource, NoopGuard, SourceStream, StreamFault, StreamGuard,
};
pub use frame::{AudioFrame, FrameQueue, DEFAULT_QUEUE_CAPACITY};
pub use level::{mic_level, rms};
pub use resample::{resample, stereo_to_mono};
