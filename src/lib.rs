//! Real-time voice pipeline: microphone capture, utterance endpointing and
//! Whisper transcription on the input side, a queued text-to-speech worker
//! on the output side.
//!
//! # Architecture
//!
//! ```text
//!  cpal callback ──▶ FrameQueue ──▶ CaptureSession worker
//!                                       │  endpointing (Endpointer)
//!                                       │  resample → TranscriptionClient
//!                                       ▼
//!                                  ListenerEvent channel
//!
//!  submit(text) ──▶ SynthesisQueue ──▶ Synthesizer worker
//!                                       │  chunking → SpeechSynth
//!                                       ▼
//!                                  SynthEvent channel
//! ```
//!
//! The audio callback only copies frames into the bounded queue; all
//! heavy work (transcription, HTTP synthesis, playback) runs on the two
//! worker threads.  The caller's thread issues `start` / `stop` / `submit`
//! and drains the event channels.

pub mod audio;
pub mod config;
pub mod session;
pub mod stt;
pub mod synth;
