//! Speech-to-text subsystem.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │             SpeechRecognizer (trait)               │
//! │                                                    │
//! │   WhisperRecognizer ──▶ Vec<RecognizedSegment>     │
//! │                              │                     │
//! │                              ▼                     │
//! │   confidence::score ──▶ TranscriptResult           │
//! │                                                    │
//! │   TranscriptionClient: engine ownership,           │
//! │   Primary → Fallback (GPU → CPU, one-shot)         │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! The capture worker owns exactly one [`TranscriptionClient`]; the engine
//! handle never leaves it.

pub mod client;
pub mod confidence;
pub mod engine;

pub use client::{EngineFactory, EngineMode, TranscriptionClient};
pub use confidence::{score, TranscriptResult, DEFAULT_CONFIDENCE};
pub use engine::{
    RecognizedSegment, SpeechRecognizer, SttError, WhisperRecognizer, MIN_AUDIO_SAMPLES,
    RECOGNIZER_SAMPLE_RATE,
};

// test-only re-export so other modules' tests can import the mock without
// the full engine path.
#[cfg(test)]
pub use engine::MockRecognizer;
