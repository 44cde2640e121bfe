//! Transcription client: engine ownership, confidence scoring and the
//! one-shot GPU → CPU fallback.
//!
//! [`TranscriptionClient`] wraps the recognition engine for the capture
//! worker.  Transient engine faults degrade to an empty result so the
//! session loop keeps running; a GPU-class fault additionally triggers a
//! single `Primary → Fallback` engine rebuild (CPU, reduced precision) and
//! one retry of the same call.  The transition is guarded — it can happen
//! at most once per session, and a second failure after it surfaces as an
//! empty result with no further retries.

use super::confidence::{score, TranscriptResult};
use super::engine::{SpeechRecognizer, SttError};

// ---------------------------------------------------------------------------
// EngineMode
// ---------------------------------------------------------------------------

/// Which backend the client currently runs on.  The transition
/// `Primary → Fallback` is one-way and happens at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// The engine built from the configured device (possibly accelerated).
    Primary,
    /// The CPU, reduced-precision engine installed after a GPU fault.
    Fallback,
}

/// Builds a recognition engine for the requested mode.  Called once at
/// session start for [`EngineMode::Primary`] and at most once more for
/// [`EngineMode::Fallback`], always from the worker that owns the client.
pub type EngineFactory =
    Box<dyn Fn(EngineMode) -> Result<Box<dyn SpeechRecognizer>, SttError> + Send>;

/// Returns `true` when an engine error message indicates a GPU/driver
/// fault rather than an ordinary decode failure.
fn is_gpu_fault(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["cublas", "cuda", "cudnn"]
        .iter()
        .any(|token| lower.contains(token))
}

// ---------------------------------------------------------------------------
// TranscriptionClient
// ---------------------------------------------------------------------------

/// Owns the recognition engine for exactly one capture worker.
///
/// `transcribe` never fails: recoverable engine faults are logged and
/// collapse to [`TranscriptResult::empty`] so a single bad inference call
/// can never take the session down.
pub struct TranscriptionClient {
    engine: Box<dyn SpeechRecognizer>,
    factory: EngineFactory,
    mode: EngineMode,
    language: String,
    /// One-shot warning for the session to surface after a fallback.
    notice: Option<String>,
}

impl TranscriptionClient {
    /// Build the primary engine and the client around it.
    ///
    /// # Errors
    ///
    /// Propagates the factory's engine-load error (missing model, context
    /// initialisation failure).
    pub fn new(factory: EngineFactory, language: impl Into<String>) -> Result<Self, SttError> {
        let engine = factory(EngineMode::Primary)?;
        Ok(Self {
            engine,
            factory,
            mode: EngineMode::Primary,
            language: language.into(),
            notice: None,
        })
    }

    /// Current backend mode.
    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    /// Drain the pending fallback warning, if one was raised since the last
    /// call.  The capture worker forwards it as a warning-grade error event.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Transcribe `audio` (16 kHz mono) and score the result.
    ///
    /// Empty audio and recoverable faults return an empty result; a
    /// GPU-class fault swaps in the CPU fallback once and retries the same
    /// call once.
    pub fn transcribe(&mut self, audio: &[f32]) -> TranscriptResult {
        if audio.is_empty() {
            return TranscriptResult::empty();
        }

        match self.engine.transcribe(audio, &self.language) {
            Ok(segments) => score(&segments),
            Err(e) => {
                log::warn!("transcription failed: {e}");

                if self.mode == EngineMode::Primary && is_gpu_fault(&e.to_string()) {
                    if self.switch_to_fallback() {
                        return match self.engine.transcribe(audio, &self.language) {
                            Ok(segments) => score(&segments),
                            Err(retry_err) => {
                                log::warn!("fallback retry failed: {retry_err}");
                                TranscriptResult::empty()
                            }
                        };
                    }
                }

                TranscriptResult::empty()
            }
        }
    }

    /// Rebuild the engine in CPU mode.  Returns `false` (and records the
    /// failure notice) when even the fallback cannot be constructed.
    fn switch_to_fallback(&mut self) -> bool {
        log::warn!("GPU transcription backend faulted; switching to CPU fallback");
        match (self.factory)(EngineMode::Fallback) {
            Ok(engine) => {
                self.engine = engine;
                self.mode = EngineMode::Fallback;
                self.notice = Some(
                    "GPU transcription backend unavailable. \
                     Switched to CPU mode for stable listening."
                        .into(),
                );
                true
            }
            Err(e) => {
                log::error!("CPU fallback initialisation failed: {e}");
                self.notice = Some(format!("CPU fallback failed: {e}"));
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
