//! Speech synthesis: request queue, chunking and the rendering worker.
//!
//! Callers hand text to [`Synthesizer::submit`] and listen for
//! [`SynthEvent`]s; everything else (chunking, HTTP synthesis, playback,
//! pacing) happens on the worker thread.

pub mod chunk;
pub mod engine;
pub mod queue;
pub mod worker;

pub use chunk::{split_chunks, TextChunk, CLAUSE_PAUSE, SENTENCE_PAUSE, WORD_PAUSE};
pub use engine::{HttpSynth, SpeechSynth, SynthError, TTS_SAMPLE_RATE};
pub use queue::{SynthesisQueue, DEFAULT_SYNTH_QUEUE_CAPACITY};
pub use worker::{SynthEvent, SynthFactory, Synthesizer};
