//! Speech synthesis engines.
//!
//! [`SpeechSynth`] is the narrow seam the worker renders through;
//! [`HttpSynth`] is the production engine, posting chunks to an
//! OpenAI-compatible `/v1/audio/speech` endpoint and playing the returned
//! PCM on the default output device.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::resample;
use crate::config::SynthesisConfig;

/// Sample rate of the PCM the speech endpoint returns.
pub const TTS_SAMPLE_RATE: u32 = 24_000;

/// Speaking rate (words per minute) that maps to engine speed 1.0.
const BASELINE_RATE_WPM: f32 = 178.0;

// ---------------------------------------------------------------------------
// SynthError
// ---------------------------------------------------------------------------

/// All errors that can arise from the synthesis subsystem.
#[derive(Debug, Error)]
pub enum SynthError {
    /// The HTTP request to the speech endpoint failed.
    #[error("speech endpoint request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The speech endpoint answered with a non-success status.
    #[error("speech endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    /// No audio output device is available.
    #[error("no audio output device available")]
    NoOutputDevice,

    /// The output device rejected its default stream configuration.
    #[error("failed to query output config: {0}")]
    OutputConfig(#[from] cpal::DefaultStreamConfigError),

    /// Building the output stream failed.
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    /// Starting playback failed.
    #[error("failed to start playback: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// Any other engine fault.
    #[error("synthesis failed: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// SpeechSynth
// ---------------------------------------------------------------------------

/// A black-box text-to-speech engine.  `speak` renders one chunk and
/// blocks until its audio has played out.
pub trait SpeechSynth: Send {
    fn speak(&mut self, text: &str) -> Result<(), SynthError>;
}

// ---------------------------------------------------------------------------
// HttpSynth
// ---------------------------------------------------------------------------

/// Production engine: OpenAI-compatible speech endpoint plus local cpal
/// playback.
///
/// The endpoint is asked for raw PCM (16-bit little-endian mono at
/// 24 kHz), which avoids a decoder dependency; the samples are gain-scaled
/// and resampled to the output device's native rate before playback.
pub struct HttpSynth {
    client: reqwest::blocking::Client,
    url: String,
    api_key: Option<String>,
    voice: String,
    model: String,
    speed: f32,
    volume: f32,
}

impl HttpSynth {
    /// Build an engine from the synthesis settings.
    ///
    /// # Errors
    ///
    /// - [`SynthError::Request`] — the HTTP client could not be constructed.
    pub fn new(config: &SynthesisConfig) -> Result<Self, SynthError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}/v1/audio/speech",
                config.base_url.trim_end_matches('/')
            ),
            api_key: config.api_key.clone(),
            voice: config.voice.clone(),
            model: config.model.clone(),
            speed: config.rate_wpm as f32 / BASELINE_RATE_WPM,
            volume: config.volume,
        })
    }

    fn fetch_pcm(&self, text: &str) -> Result<Vec<u8>, SynthError> {
        #[derive(serde::Serialize)]
        struct SpeakRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let mut request = self.client.post(&self.url).json(&SpeakRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "pcm",
        });
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(SynthError::Endpoint { status, body });
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl SpeechSynth for HttpSynth {
    fn speak(&mut self, text: &str) -> Result<(), SynthError> {
        let pcm = self.fetch_pcm(text)?;
        let mut samples = decode_pcm_s16le(&pcm);
        if self.volume != 1.0 {
            for s in &mut samples {
                *s = (*s * self.volume).clamp(-1.0, 1.0);
            }
        }
        log::debug!(
            "rendered {} samples for a {}-char chunk",
            samples.len(),
            text.len()
        );
        play_blocking(&samples)
    }
}

/// Interpret raw bytes as 16-bit little-endian mono PCM.  A trailing odd
/// byte is ignored.
fn decode_pcm_s16le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32_768.0)
        .collect()
}

/// Play `samples` (mono, [`TTS_SAMPLE_RATE`]) on the default output device
/// and block until they have played out.
fn play_blocking(samples: &[f32]) -> Result<(), SynthError> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(SynthError::NoOutputDevice)?;
    let config: cpal::StreamConfig = device.default_output_config()?.into();

    let channels = config.channels as usize;
    let samples = Arc::new(resample(samples, TTS_SAMPLE_RATE, config.sample_rate.0));
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let pos = position.load(Ordering::Relaxed);
                    let sample = if pos < samples.len() {
                        position.store(pos + 1, Ordering::Relaxed);
                        samples[pos]
                    } else {
                        finished.store(true, Ordering::Relaxed);
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| log::error!("output stream error: {err}"),
            None,
        )?
    };
    stream.play()?;

    // Poll for drain, capped a little past the nominal duration in case
    // the device stalls.
    let nominal_ms = samples.len() as u64 * 1_000 / u64::from(config.sample_rate.0);
    let deadline = Instant::now() + Duration::from_millis(nominal_ms + 500);
    while !finished.load(Ordering::Relaxed) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    drop(stream);
    Ok(())
}

// ---------------------------------------------------------------------------
// MockSynth  (test-only)
// ---------------------------------------------------------------------------

/// A test double recording every spoken chunk, optionally failing on a
/// scripted call index.
#[cfg(test)]
pub struct MockSynth {
    spoken: Arc<std::sync::Mutex<Vec<String>>>,
    fail_on: Option<usize>,
    calls: usize,
}

#[cfg(test)]
impl MockSynth {
    pub fn new() -> Self {
        Self {
            spoken: Arc::new(std::sync::Mutex::new(Vec::new())),
            fail_on: None,
            calls: 0,
        }
    }

    /// Fail the `index`-th `speak` call (zero-based); all others succeed.
    pub fn failing_on(index: usize) -> Self {
        Self {
            fail_on: Some(index),
            ..Self::new()
        }
    }

    /// Shared view of everything spoken so far.
    pub fn spoken(&self) -> Arc<std::sync::Mutex<Vec<String>>> {
        Arc::clone(&self.spoken)
    }
}

#[cfg(test)]
impl SpeechSynth for MockSynth {
    fn speak(&mut self, text: &str) -> Result<(), SynthError> {
        let index = self.calls;
        self.calls += 1;
        if self.fail_on == Some(index) {
            return Err(SynthError::Engine("scripted failure".into()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_decode_maps_full_scale() {
        let bytes = [
            0x00, 0x00, // 0
            0xFF, 0x7F, // i16::MAX
            0x00, 0x80, // i16::MIN
        ];
        let samples = decode_pcm_s16le(&bytes);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - (32_767.0 / 32_768.0)).abs() < 1e-6);
        assert_eq!(samples[2], -1.0);
    }

    #[test]
    fn pcm_decode_ignores_trailing_odd_byte() {
        assert_eq!(decode_pcm_s16le(&[0x00, 0x00, 0x42]).len(), 1);
    }

    #[test]
    fn speed_derives_from_rate_wpm() {
        let config = SynthesisConfig {
            rate_wpm: 178,
            ..SynthesisConfig::default()
        };
        let engine = HttpSynth::new(&config).unwrap();
        assert!((engine.speed - 1.0).abs() < 1e-6);

        let engine = HttpSynth::new(&SynthesisConfig {
            rate_wpm: 89,
            ..SynthesisConfig::default()
        })
        .unwrap();
        assert!((engine.speed - 0.5).abs() < 1e-6);
    }

    #[test]
    fn url_joins_without_double_slash() {
        let engine = HttpSynth::new(&SynthesisConfig {
            base_url: "http://localhost:8880/".into(),
            ..SynthesisConfig::default()
        })
        .unwrap();
        assert_eq!(engine.url, "http://localhost:8880/v1/audio/speech");
    }

    #[test]
    fn mock_records_in_order_and_fails_on_script() {
        let mut engine = MockSynth::failing_on(1);
        let spoken = engine.spoken();
        engine.speak("one").unwrap();
        assert!(engine.speak("two").is_err());
        engine.speak("three").unwrap();
        assert_eq!(*spoken.lock().unwrap(), vec!["one", "three"]);
    }
}
