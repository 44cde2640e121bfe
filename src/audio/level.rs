//! Loudness helpers: RMS amplitude and the normalised microphone level.
//!
//! RMS (root-mean-square) is the loudness proxy used everywhere in the
//! endpointing state machine — calibration, the speech trigger and the
//! per-frame mic-level events all derive from it.

/// Root-mean-square amplitude of `samples`.  Returns `0.0` for an empty
/// slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt()
}

/// Map an RMS value onto a displayable `[0.0, 1.0]` microphone level.
///
/// Speech RMS on consumer microphones rarely exceeds ~0.08, so a ×12 gain
/// puts normal speech near full scale.
pub fn mic_level(rms: f32) -> f32 {
    (rms * 12.0).min(1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_zero_rms() {
        assert_eq!(rms(&[0.0; 256]), 0.0);
    }

    #[test]
    fn empty_slice_has_zero_rms() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn dc_signal_rms_equals_amplitude() {
        let r = rms(&[0.5; 128]);
        assert!((r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn alternating_sign_has_same_rms_as_positive() {
        let pos = rms(&[0.3; 64]);
        let mixed: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 0.3 } else { -0.3 }).collect();
        assert!((pos - rms(&mixed)).abs() < 1e-6);
    }

    #[test]
    fn mic_level_scales_by_twelve() {
        assert!((mic_level(0.02) - 0.24).abs() < 1e-6);
    }

    #[test]
    fn mic_level_clamps_to_one() {
        assert_eq!(mic_level(0.5), 1.0);
        assert_eq!(mic_level(10.0), 1.0);
    }
}
