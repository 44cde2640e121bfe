//! Core recognition engine trait and the whisper-rs implementation.
//!
//! [`SpeechRecognizer`] is the narrow contract the pipeline consumes:
//! `transcribe(samples, language)` → a sequence of [`RecognizedSegment`]s,
//! each carrying text and (when the engine exposes it) an average
//! log-probability used for confidence scoring.
//!
//! [`WhisperRecognizer`] is the production implementation wrapping a
//! `whisper_rs::WhisperContext`.  [`MockRecognizer`] (test-only) returns
//! scripted responses so the session state machine can be exercised without
//! a GGML model file.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the recognition subsystem.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a context or per-call state.
    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("transcription error: {0}")]
    Transcription(String),
}

// ---------------------------------------------------------------------------
// RecognizedSegment
// ---------------------------------------------------------------------------

/// A single text segment produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSegment {
    /// Segment text as emitted by the engine (whitespace not yet trimmed).
    pub text: String,
    /// Mean log-probability of the segment's tokens, when the engine
    /// exposes token probabilities.  Natural log; `0.0` means certainty.
    pub avg_log_prob: Option<f32>,
}

// ---------------------------------------------------------------------------
// SpeechRecognizer trait
// ---------------------------------------------------------------------------

/// Object-safe interface for speech-recognition engines.
///
/// # Contract
///
/// - `audio` must be **16 kHz, mono, f32** PCM samples.
/// - Buffers shorter than [`MIN_AUDIO_SAMPLES`] yield `Ok(vec![])` — too
///   little audio is not an error in a live pipeline, it is simply nothing
///   to say yet.
/// - Engines are owned by exactly one worker; `Send` lets the boxed engine
///   move into that worker, after which it never crosses threads again.
pub trait SpeechRecognizer: Send {
    /// Transcribe `audio` in `language` ("auto" enables language detection).
    fn transcribe(
        &self,
        audio: &[f32],
        language: &str,
    ) -> Result<Vec<RecognizedSegment>, SttError>;
}

// Compile-time assertion: Box<dyn SpeechRecognizer> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechRecognizer>) {}
};

/// Minimum audio fed to the engine: 0.5 s at 16 kHz.  whisper.cpp degrades
/// badly below this and the endpointer never has a reason to ask.
pub const MIN_AUDIO_SAMPLES: usize = 8_000;

/// Sample rate the recognition engine requires, in Hz.
pub const RECOGNIZER_SAMPLE_RATE: u32 = 16_000;

/// Number of CPU threads handed to Whisper, capped at 8 to avoid
/// diminishing returns.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// WhisperRecognizer
// ---------------------------------------------------------------------------

/// Production recognizer wrapping a `whisper_rs::WhisperContext`.
///
/// A fresh `WhisperState` is created per call, so `&self` suffices and the
/// owning worker needs no locking.
pub struct WhisperRecognizer {
    ctx: WhisperContext,
    threads: i32,
}

impl std::fmt::Debug for WhisperRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRecognizer")
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

impl WhisperRecognizer {
    /// Load a GGML model from `model_path`.
    ///
    /// `use_gpu` requests hardware acceleration; the one-shot CPU fallback
    /// in [`crate::stt::TranscriptionClient`] reloads with `use_gpu =
    /// false` when the accelerated backend faults.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] — `model_path` does not exist.
    /// - [`SttError::ContextInit`]  — whisper-rs failed to load the file.
    pub fn load(model_path: impl AsRef<Path>, use_gpu: bool) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(use_gpu);

        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        Ok(Self {
            ctx,
            threads: optimal_threads(),
        })
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn transcribe(
        &self,
        audio: &[f32],
        language: &str,
    ) -> Result<Vec<RecognizedSegment>, SttError> {
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Ok(Vec::new());
        }

        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        let lang: Option<&str> = if language == "auto" {
            None
        } else {
            Some(language)
        };
        fp.set_language(lang);
        fp.set_n_threads(self.threads);
        fp.set_temperature(0.0);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut segments = Vec::with_capacity(n_segments as usize);

        for i in 0..n_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;

            // Mean natural-log token probability for confidence scoring.
            let n_tokens = state.full_n_tokens(i).unwrap_or(0);
            let avg_log_prob = if n_tokens > 0 {
                let mut sum = 0.0_f32;
                for t in 0..n_tokens {
                    let p = state.full_get_token_prob(i, t).unwrap_or(0.0);
                    sum += p.max(1e-10).ln();
                }
                Some(sum / n_tokens as f32)
            } else {
                None
            };

            segments.push(RecognizedSegment { text, avg_log_prob });
        }

        Ok(segments)
    }
}

// ---------------------------------------------------------------------------
// MockRecognizer  (test-only)
// ---------------------------------------------------------------------------

/// A test double returning a scripted sequence of responses, one per call,
/// repeating the final entry once the script runs out.
#[cfg(test)]
pub struct MockRecognizer {
    script: std::sync::Mutex<Vec<Result<Vec<RecognizedSegment>, SttError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockRecognizer {
    /// A recognizer that always returns one segment with the given text and
    /// log-probability.
    pub fn ok(text: &str, avg_log_prob: Option<f32>) -> Self {
        Self::scripted(vec![Ok(vec![RecognizedSegment {
            text: text.into(),
            avg_log_prob,
        }])])
    }

    /// A recognizer that always fails with `error`.
    pub fn err(error: SttError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    /// A recognizer that plays `responses` in order, repeating the last.
    pub fn scripted(responses: Vec<Result<Vec<RecognizedSegment>, SttError>>) -> Self {
        assert!(!responses.is_empty(), "script must not be empty");
        Self {
            script: std::sync::Mutex::new(responses),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// How many times `transcribe` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SpeechRecognizer for MockRecognizer {
    fn transcribe(
        &self,
        _audio: &[f32],
        _language: &str,
    ) -> Result<Vec<RecognizedSegment>, SttError> {
        let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        script[n.min(script.len() - 1)].clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_scripted_text() {
        let engine = MockRecognizer::ok("hello", Some(-0.1));
        let segments = engine.transcribe(&vec![0.0; 16_000], "en").unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hello");
    }

    #[test]
    fn mock_plays_script_in_order_then_repeats_last() {
        let engine = MockRecognizer::scripted(vec![
            Ok(vec![RecognizedSegment {
                text: "first".into(),
                avg_log_prob: None,
            }]),
            Ok(vec![RecognizedSegment {
                text: "second".into(),
                avg_log_prob: None,
            }]),
        ]);
        assert_eq!(engine.transcribe(&[], "en").unwrap()[0].text, "first");
        assert_eq!(engine.transcribe(&[], "en").unwrap()[0].text, "second");
        assert_eq!(engine.transcribe(&[], "en").unwrap()[0].text, "second");
        assert_eq!(engine.call_count(), 3);
    }

    #[test]
    fn mock_err_returns_configured_error() {
        let engine = MockRecognizer::err(SttError::Transcription("boom".into()));
        let err = engine.transcribe(&[], "en").unwrap_err();
        assert!(matches!(err, SttError::Transcription(_)));
    }

    #[test]
    fn load_missing_model_returns_model_not_found() {
        let result = WhisperRecognizer::load("/nonexistent/model.bin", false);
        assert!(
            matches!(result, Err(SttError::ModelNotFound(_))),
            "expected ModelNotFound, got: {result:?}"
        );
    }

    #[test]
    fn box_dyn_recognizer_compiles() {
        // If this test compiles, the trait is object-safe.
        let engine: Box<dyn SpeechRecognizer> = Box::new(MockRecognizer::ok("ok", None));
        let _ = engine.transcribe(&[], "en");
    }

    #[test]
    fn optimal_threads_is_positive_and_at_most_8() {
        let t = optimal_threads();
        assert!((1..=8).contains(&t));
    }
}
