//! Audio resampling and channel mixing utilities.
//!
//! The recognition engine requires **16 kHz mono `f32`** audio while the
//! input device runs at its own native rate, so every buffer is converted
//! just before transcription:
//!
//! 1. [`stereo_to_mono`] — downmix interleaved channels (in the capture
//!    callback, before frames enter the queue).
//! 2. [`resample`] — linear interpolation from the stream rate to the
//!    recognizer rate, with output clipped to `[-1.0, 1.0]`.
//!
//! Linear interpolation is deliberate: it is fast enough for the real-time
//! partial-update path and speech recognition is insensitive to the small
//! aliasing it introduces.

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec` with no
///   averaging (fast path).
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use voice_pipeline::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!(mono[0].abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample `samples` from `source_rate` Hz to `target_rate` Hz using linear
/// interpolation, clipping the result to `[-1.0, 1.0]`.
///
/// * Equal rates return the input unchanged (no-op fast path — no
///   interpolation, no clipping).
/// * An empty input or a zero rate returns an empty vector.
///
/// The output spans the same duration as the input: its length is
/// `max(1, floor(samples.len() × target_rate / source_rate))`.
///
/// # Example
///
/// ```rust
/// use voice_pipeline::audio::resample;
///
/// // Downsample 10 ms of 48 kHz audio to 16 kHz
/// let hi = vec![0.5_f32; 480];
/// let lo = resample(&hi, 48_000, 16_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }
    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = ((samples.len() as f64 * ratio) as usize).max(1);
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        // Fractional position on the uniform source grid spanning the same
        // duration as the target grid.
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample.clamp(-1.0, 1.0));
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
