//! Confidence scoring from engine segment probabilities.
//!
//! The recognition engine reports a mean log-probability per segment.  The
//! transcript confidence is `clamp(exp(mean of those), 0, 1)`: a perfectly
//! certain decode (log-prob 0) scores 1.0 and confidence decays towards 0
//! as the engine grows less sure.  When the engine produced text but no
//! probabilities, a fixed mid-high default applies; empty text always
//! scores 0.

use super::engine::RecognizedSegment;

/// Confidence assigned to non-empty text when the engine exposes no token
/// probabilities.
pub const DEFAULT_CONFIDENCE: f32 = 0.65;

// ---------------------------------------------------------------------------
// TranscriptResult
// ---------------------------------------------------------------------------

/// A scored transcript: joined segment text plus confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptResult {
    pub text: String,
    pub confidence: f32,
}

impl TranscriptResult {
    /// The canonical "nothing recognised" result.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

// ---------------------------------------------------------------------------
// score
// ---------------------------------------------------------------------------

/// Join segment texts and derive a confidence score.
///
/// - Empty (or all-whitespace) text → confidence `0.0`.
/// - Segments carrying `avg_log_prob` → `clamp(exp(mean), 0, 1)`.
/// - Text without any probabilities → [`DEFAULT_CONFIDENCE`].
pub fn score(segments: &[RecognizedSegment]) -> TranscriptResult {
    let mut pieces: Vec<&str> = Vec::new();
    let mut log_probs: Vec<f32> = Vec::new();

    for segment in segments {
        let trimmed = segment.text.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed);
        }
        if let Some(lp) = segment.avg_log_prob {
            log_probs.push(lp);
        }
    }

    let text = pieces.join(" ");
    if text.is_empty() {
        return TranscriptResult::empty();
    }

    let confidence = if log_probs.is_empty() {
        DEFAULT_CONFIDENCE
    } else {
        let mean = log_probs.iter().sum::<f32>() / log_probs.len() as f32;
        mean.exp().clamp(0.0, 1.0)
    };

    TranscriptResult { text, confidence }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, lp: Option<f32>) -> RecognizedSegment {
        RecognizedSegment {
            text: text.into(),
            avg_log_prob: lp,
        }
    }

    #[test]
    fn zero_log_prob_maps_to_full_confidence() {
        let result = score(&[seg("hello", Some(0.0))]);
        assert_eq!(result.text, "hello");
        assert!((result.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn very_negative_log_prob_approaches_zero() {
        let result = score(&[seg("mumble", Some(-50.0))]);
        assert!(result.confidence < 1e-6);
    }

    #[test]
    fn confidence_always_in_unit_interval() {
        for lp in [-100.0_f32, -5.0, -1.0, -0.2, 0.0, 0.5] {
            let c = score(&[seg("x", Some(lp))]).confidence;
            assert!((0.0..=1.0).contains(&c), "lp {lp} produced {c}");
        }
    }

    #[test]
    fn mean_is_taken_over_all_segments() {
        // mean of -1.0 and -3.0 is -2.0 → exp(-2.0)
        let result = score(&[seg("a", Some(-1.0)), seg("b", Some(-3.0))]);
        assert!((result.confidence - (-2.0_f32).exp()).abs() < 1e-5);
        assert_eq!(result.text, "a b");
    }

    #[test]
    fn text_without_probs_gets_default_confidence() {
        let result = score(&[seg("plain", None)]);
        assert!((result.confidence - DEFAULT_CONFIDENCE).abs() < 1e-6);
    }

    #[test]
    fn empty_segments_score_zero() {
        let result = score(&[]);
        assert!(result.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn whitespace_only_text_scores_zero() {
        let result = score(&[seg("   ", Some(0.0))]);
        assert!(result.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn segment_text_is_trimmed_and_joined() {
        let result = score(&[seg(" hello ", None), seg(" there ", None)]);
        assert_eq!(result.text, "hello there");
    }
}
