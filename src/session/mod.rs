//! Listening sessions: endpointing, partial transcripts and the capture
//! worker.
//!
//! A session moves through calibration, speech detection and capture on a
//! dedicated worker thread, publishing [`ListenerEvent`]s along the way.
//! The endpointing rules live in [`endpoint`]; [`capture`] owns the thread
//! and the wiring to audio input and transcription.

pub mod capture;
pub mod endpoint;
pub mod events;

pub use capture::{CaptureSession, SessionState, SharedEngineFactory, POLL_INTERVAL};
pub use endpoint::{Deadline, Endpointer, FrameStep, Phase};
pub use events::ListenerEvent;
