//! Pipeline settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to the capture
//! and synthesis workers at construction time.  There is no runtime
//! reconfiguration — workers receive an owned snapshot.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ListenerConfig
// ---------------------------------------------------------------------------

/// Settings for the capture/endpointing/transcription side of the pipeline.
///
/// Handed to [`crate::session::CaptureSession`] once, at construction.
/// Validate with [`PipelineConfig::validate`] before use — every duration
/// and multiplier must be strictly positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Whisper model size / file stem (e.g. `"small"`, `"medium"`).
    pub model_size: String,
    /// Speech language as an ISO-639-1 code, or `"auto"` for built-in
    /// language detection.
    pub language: String,
    /// Inference device: `"cpu"` or `"cuda"`.
    pub device: String,
    /// Compute precision hint (e.g. `"int8"`, `"float16"`).  The CPU
    /// fallback always drops to reduced precision regardless of this value.
    pub compute_type: String,
    /// Requested capture sample rate in Hz.  The session adopts the input
    /// device's native rate when it differs — see
    /// [`crate::audio::MicSource`].
    pub sample_rate: u32,
    /// Frames delivered by the input stream, in samples.
    pub chunk_size: u32,
    /// Explicit input device index — `None` means resolve automatically
    /// (system default, else the first device with an input channel).
    pub input_device_index: Option<usize>,
    /// Speech trigger threshold as a multiple of the calibrated noise floor.
    pub speech_threshold_multiplier: f32,
    /// Seconds of trailing silence that end an utterance.
    pub silence_timeout_secs: f32,
    /// Seconds without any speech trigger before the session gives up.
    pub not_hearing_timeout_secs: f32,
    /// Interval between partial-transcript updates, in seconds.
    pub partial_update_secs: f32,
    /// Hard cap on a single utterance, in seconds.
    pub max_record_secs: f32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            model_size: "small".into(),
            language: "en".into(),
            device: "cpu".into(),
            compute_type: "int8".into(),
            sample_rate: 16_000,
            chunk_size: 1_024,
            input_device_index: None,
            speech_threshold_multiplier: 1.35,
            silence_timeout_secs: 1.7,
            not_hearing_timeout_secs: 6.0,
            partial_update_secs: 0.8,
            max_record_secs: 14.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SynthesisConfig
// ---------------------------------------------------------------------------

/// Settings for the speech-synthesis side of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Speaking rate in words per minute (178 ≈ 1.0× endpoint speed).
    pub rate_wpm: u32,
    /// Output volume gain in `[0.0, 1.0]`.
    pub volume: f32,
    /// Voice identifier sent to the synthesis endpoint.
    pub voice: String,
    /// Base URL of the OpenAI-compatible speech endpoint.
    pub base_url: String,
    /// API key — `None` for endpoints that do not require one.
    pub api_key: Option<String>,
    /// Model identifier sent to the endpoint.
    pub model: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            rate_wpm: 178,
            volume: 0.95,
            voice: "alloy".into(),
            base_url: "http://localhost:8880".into(),
            api_key: None,
            model: "tts-1".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level pipeline configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_pipeline::config::PipelineConfig;
///
/// // Load (returns Default when file is missing)
/// let config = PipelineConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capture / transcription settings.
    pub listener: ListenerConfig,
    /// Speech synthesis settings.
    pub synthesis: SynthesisConfig,
}

impl PipelineConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(PipelineConfig::default())` when the file does not exist
    /// yet so callers never need to special-case a missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the invariant that every duration and multiplier is strictly
    /// positive.  A zero or negative value would either disable endpointing
    /// entirely or make a timeout fire on the first poll.
    pub fn validate(&self) -> Result<()> {
        let l = &self.listener;
        if l.speech_threshold_multiplier <= 0.0 {
            bail!("speech_threshold_multiplier must be > 0");
        }
        if l.silence_timeout_secs <= 0.0 {
            bail!("silence_timeout_secs must be > 0");
        }
        if l.not_hearing_timeout_secs <= 0.0 {
            bail!("not_hearing_timeout_secs must be > 0");
        }
        if l.partial_update_secs <= 0.0 {
            bail!("partial_update_secs must be > 0");
        }
        if l.max_record_secs <= 0.0 {
            bail!("max_record_secs must be > 0");
        }
        if l.sample_rate == 0 {
            bail!("sample_rate must be > 0");
        }
        if l.chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if self.synthesis.volume < 0.0 || self.synthesis.volume > 1.0 {
            bail!("synthesis volume must be in [0.0, 1.0]");
        }
        if self.synthesis.rate_wpm == 0 {
            bail!("synthesis rate_wpm must be > 0");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
