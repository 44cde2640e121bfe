//! Endpointing state machine: calibration, speech trigger and utterance
//! boundaries.
//!
//! [`Endpointer`] holds the per-session mutable state — calibration buffer,
//! noise-floor estimate, lead-in ring, accumulated speech — and decides,
//! frame by frame, when an utterance starts and when it must be finalized.
//! It is deliberately free of threads, channels and engines: the capture
//! worker feeds it frames and a wall-clock `Instant`, which is what makes
//! every boundary condition testable with synthetic time.
//!
//! # Phases
//!
//! ```text
//! Calibrating ──10 frames──▶ AwaitingSpeech ──rms > floor×mult──▶ Capturing
//! ```
//!
//! Finalization (max-record or trailing-silence) and the not-hearing
//! timeout are reported through [`Endpointer::check_deadline`], polled by
//! the worker on every queue-pop attempt so deadlines fire even when the
//! device goes quiet and frames stop arriving.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::audio::rms;
use crate::config::ListenerConfig;

/// Frames accumulated before the noise floor is fixed.
pub const CALIBRATION_FRAMES: usize = 10;
/// Rolling pre-utterance frames kept so word onsets are not clipped.
pub const LEAD_IN_FRAMES: usize = 10;
/// Most-recent frames sent for a partial transcription.
pub const PARTIAL_WINDOW_FRAMES: usize = 24;
/// Lower bound on the calibrated noise floor — a dead-silent room must not
/// produce a threshold that any breath would cross.
pub const MIN_NOISE_FLOOR: f32 = 0.004;
/// Floor assumed until calibration has seen its first frame.
const INITIAL_NOISE_FLOOR: f32 = 0.008;

// ---------------------------------------------------------------------------
// Phase / FrameStep / Deadline
// ---------------------------------------------------------------------------

/// Endpointer phase within a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accumulating the calibration frames.
    Calibrating,
    /// Floor fixed; watching for the speech trigger.
    AwaitingSpeech,
    /// An utterance is being recorded.
    Capturing,
}

/// What a single fed frame did to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    /// Frame consumed for calibration.
    Calibrating,
    /// This frame completed calibration; now awaiting speech.
    CalibrationComplete,
    /// Below threshold, no utterance in progress.
    Waiting,
    /// This frame crossed the threshold and started the utterance.
    SpeechStarted,
    /// In-utterance frame above the threshold.
    Voiced,
    /// In-utterance frame below the threshold (still recorded — dropping
    /// it would clip word endings).
    Unvoiced,
}

/// A wall-clock boundary that ends the session's current activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// No trigger within the not-hearing window; give up silently.
    NotHearing,
    /// Trailing silence exceeded the silence timeout; finalize.
    TrailingSilence,
    /// The utterance hit the hard recording cap; finalize.
    MaxRecord,
}

// ---------------------------------------------------------------------------
// Endpointer
// ---------------------------------------------------------------------------

/// Per-session endpointing state.  Created at session start, discarded at
/// session end — nothing here survives into the next session.
pub struct Endpointer {
    phase: Phase,
    threshold_multiplier: f32,
    silence_timeout: Duration,
    not_hearing_timeout: Duration,
    partial_interval: Duration,
    max_record: Duration,

    calibration: Vec<Vec<f32>>,
    noise_floor: f32,
    lead_in: VecDeque<Vec<f32>>,
    speech: Vec<Vec<f32>>,

    idle_started_at: Instant,
    speech_started_at: Option<Instant>,
    last_voice_at: Instant,
    last_partial_at: Option<Instant>,
    latest_partial: String,
}

impl Endpointer {
    pub fn new(config: &ListenerConfig, now: Instant) -> Self {
        Self {
            phase: Phase::Calibrating,
            threshold_multiplier: config.speech_threshold_multiplier,
            silence_timeout: Duration::from_secs_f32(config.silence_timeout_secs),
            not_hearing_timeout: Duration::from_secs_f32(config.not_hearing_timeout_secs),
            partial_interval: Duration::from_secs_f32(config.partial_update_secs),
            max_record: Duration::from_secs_f32(config.max_record_secs),
            calibration: Vec::with_capacity(CALIBRATION_FRAMES),
            noise_floor: INITIAL_NOISE_FLOOR,
            lead_in: VecDeque::with_capacity(LEAD_IN_FRAMES),
            speech: Vec::new(),
            idle_started_at: now,
            speech_started_at: None,
            last_voice_at: now,
            last_partial_at: None,
            latest_partial: String::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Calibrated ambient loudness baseline.
    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    /// The speech trigger level: `noise_floor × multiplier`.
    pub fn threshold(&self) -> f32 {
        self.noise_floor * self.threshold_multiplier
    }

    pub fn in_speech(&self) -> bool {
        self.speech_started_at.is_some()
    }

    /// Most recent non-empty partial transcript for this utterance.
    pub fn latest_partial(&self) -> &str {
        &self.latest_partial
    }

    pub fn set_latest_partial(&mut self, text: String) {
        self.latest_partial = text;
    }

    /// Advance the state machine by one frame.
    pub fn feed(&mut self, frame: Vec<f32>, now: Instant) -> FrameStep {
        match self.phase {
            Phase::Calibrating => {
                self.calibration.push(frame);
                // The floor is the RMS over everything heard so far, never
                // below the hard minimum.
                let merged: Vec<f32> = self.calibration.iter().flatten().copied().collect();
                self.noise_floor = rms(&merged).max(MIN_NOISE_FLOOR);

                if self.calibration.len() >= CALIBRATION_FRAMES {
                    self.phase = Phase::AwaitingSpeech;
                    FrameStep::CalibrationComplete
                } else {
                    FrameStep::Calibrating
                }
            }

            Phase::AwaitingSpeech => {
                let level = rms(&frame);

                if self.lead_in.len() == LEAD_IN_FRAMES {
                    self.lead_in.pop_front();
                }
                self.lead_in.push_back(frame.clone());

                if level > self.threshold() {
                    // Seed with the pre-utterance ring plus the triggering
                    // frame so onsets survive intact.
                    self.speech = self.lead_in.iter().cloned().collect();
                    self.speech.push(frame);
                    self.speech_started_at = Some(now);
                    self.last_voice_at = now;
                    self.phase = Phase::Capturing;
                    FrameStep::SpeechStarted
                } else {
                    FrameStep::Waiting
                }
            }

            Phase::Capturing => {
                let level = rms(&frame);
                // Every frame is recorded regardless of its instantaneous
                // classification.
                self.speech.push(frame);

                if level > self.threshold() {
                    self.last_voice_at = now;
                    FrameStep::Voiced
                } else {
                    FrameStep::Unvoiced
                }
            }
        }
    }

    /// Which deadline, if any, has passed at `now`.
    pub fn check_deadline(&self, now: Instant) -> Option<Deadline> {
        match self.speech_started_at {
            Some(started) => {
                if now.duration_since(started) > self.max_record {
                    Some(Deadline::MaxRecord)
                } else if now.duration_since(self.last_voice_at) > self.silence_timeout {
                    Some(Deadline::TrailingSilence)
                } else {
                    None
                }
            }
            None => {
                if now.duration_since(self.idle_started_at) > self.not_hearing_timeout {
                    Some(Deadline::NotHearing)
                } else {
                    None
                }
            }
        }
    }

    /// Whether a partial update is due at `now`.
    pub fn partial_due(&self, now: Instant) -> bool {
        if self.phase != Phase::Capturing || self.speech.is_empty() {
            return false;
        }
        match self.last_partial_at {
            None => true,
            Some(last) => now.duration_since(last) >= self.partial_interval,
        }
    }

    /// The most recent [`PARTIAL_WINDOW_FRAMES`] of speech, concatenated,
    /// marking the partial clock at `now`.
    pub fn take_partial_window(&mut self, now: Instant) -> Vec<f32> {
        self.last_partial_at = Some(now);
        let skip = self.speech.len().saturating_sub(PARTIAL_WINDOW_FRAMES);
        self.speech[skip..].iter().flatten().copied().collect()
    }

    /// The full utterance, concatenated, for the final transcription.
    pub fn speech_audio(&self) -> Vec<f32> {
        self.speech.iter().flatten().copied().collect()
    }

    /// Number of frames recorded for the current utterance.
    pub fn speech_frames(&self) -> usize {
        self.speech.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
