//! Tagged events emitted by the capture session.
//!
//! One explicit event enum, drained from a `std::sync::mpsc` channel by
//! the owner, so no consumer code ever runs on the capture worker (or,
//! worse, the audio callback).

/// Everything a capture session can tell the surrounding application.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    /// Low-latency, possibly-revised in-progress transcription.
    Partial { text: String, confidence: f32 },
    /// The finished utterance transcript.
    Final { text: String, confidence: f32 },
    /// Normalised input loudness in `[0, 1]`, one per processed frame.
    MicLevel(f32),
    /// The session started (`true`) or ended (`false`) listening.
    ListeningChanged(bool),
    /// No speech was heard (or nothing was recognised) — not an error.
    SilenceTimeout,
    /// A capture or engine fault.  The session has stopped (or, for
    /// warning-grade messages such as the GPU fallback notice, degraded).
    Error(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
