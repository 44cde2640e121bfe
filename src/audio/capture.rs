//! Microphone capture via `cpal`.
//!
//! [`MicSource`] resolves an input device, adopts its **native** sample rate
//! and streams mono [`AudioFrame`]s into a [`FrameQueue`].  The cpal
//! callback does nothing but downmix and push — no I/O, no allocation-heavy
//! work — so the audio thread never stalls.
//!
//! [`AudioSource`] is the seam the session worker opens its stream through;
//! tests substitute a source that feeds the queue directly.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::frame::{AudioFrame, FrameQueue};
use super::resample::stereo_to_mono;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while resolving a device or running the stream.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("configured input device index {0} does not exist")]
    BadDeviceIndex(usize),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// AudioSource / SourceStream
// ---------------------------------------------------------------------------

/// Keeps a platform stream alive for the duration of a session.  Dropping
/// the guard stops the stream.
pub trait StreamGuard {}

/// A guard for sources that have no platform stream to keep alive
/// (scripted test sources).
pub struct NoopGuard;

impl StreamGuard for NoopGuard {}

/// Shared slot carrying a mid-session stream fault from the platform error
/// callback to the session worker.  The first fault wins; later ones are
/// dropped.
#[derive(Clone, Default)]
pub struct StreamFault {
    slot: std::sync::Arc<std::sync::Mutex<Option<String>>>,
}

impl StreamFault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault.  Safe to call from the audio error callback.
    pub fn raise(&self, message: String) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.get_or_insert(message);
        }
    }

    /// Drain the pending fault, if one was raised.
    pub fn take(&self) -> Option<String> {
        self.slot.lock().ok()?.take()
    }
}

/// An opened audio stream: the negotiated sample rate, the fault slot its
/// error callback reports into, and the guard that keeps it running.  Not
/// `Send` — it stays on the worker thread that opened it.
pub struct SourceStream {
    sample_rate: u32,
    fault: StreamFault,
    _guard: Box<dyn StreamGuard>,
}

impl SourceStream {
    pub fn new(sample_rate: u32, guard: Box<dyn StreamGuard>) -> Self {
        Self::with_fault(sample_rate, guard, StreamFault::new())
    }

    /// Build a stream whose error callback already holds a clone of
    /// `fault`.
    pub fn with_fault(sample_rate: u32, guard: Box<dyn StreamGuard>, fault: StreamFault) -> Self {
        Self {
            sample_rate,
            fault,
            _guard: guard,
        }
    }

    /// Sample rate the stream actually runs at (the device's native rate,
    /// which may differ from the configured rate).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Drain a stream fault raised since the last check.  The session
    /// worker polls this every loop iteration and aborts on `Some`.
    pub fn take_fault(&self) -> Option<String> {
        self.fault.take()
    }
}

/// Abstraction over a live audio input delivering fixed-size mono frames.
///
/// `open` is called once per session, **on the session worker thread**, so
/// implementations may hold non-`Send` platform handles inside the returned
/// [`SourceStream`].
pub trait AudioSource: Send {
    /// Open the stream and begin pushing frames into `queue`.
    fn open(&mut self, queue: FrameQueue) -> Result<SourceStream, CaptureError>;
}

// ---------------------------------------------------------------------------
// MicSource
// ---------------------------------------------------------------------------

/// Production [`AudioSource`] backed by the default cpal host.
///
/// Device resolution, once per `open`:
///
/// 1. an explicitly configured device index, if any;
/// 2. otherwise the system default input device;
/// 3. otherwise the first enumerated device exposing an input channel.
///
/// The device's native sample rate is adopted even when it differs from the
/// configured rate — many consumer interfaces reject a forced fixed rate
/// and fail the whole stream.  Callers read the adopted rate from
/// [`SourceStream::sample_rate`] and resample before transcription.
pub struct MicSource {
    device_index: Option<usize>,
    chunk_size: u32,
}

impl MicSource {
    pub fn new(device_index: Option<usize>, chunk_size: u32) -> Self {
        Self {
            device_index,
            chunk_size,
        }
    }

    fn resolve_device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();

        if let Some(index) = self.device_index {
            return host
                .input_devices()?
                .nth(index)
                .ok_or(CaptureError::BadDeviceIndex(index));
        }

        if let Some(device) = host.default_input_device() {
            return Ok(device);
        }

        // `input_devices` only yields devices with at least one supported
        // input config, so the first hit satisfies the input-channel rule.
        host.input_devices()?.next().ok_or(CaptureError::NoDevice)
    }
}

struct CpalGuard {
    _stream: cpal::Stream,
}

impl StreamGuard for CpalGuard {}

impl AudioSource for MicSource {
    fn open(&mut self, queue: FrameQueue) -> Result<SourceStream, CaptureError> {
        let device = self.resolve_device()?;
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let native_rate = supported.sample_rate().0;

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(native_rate),
            buffer_size: cpal::BufferSize::Fixed(self.chunk_size),
        };

        log::info!(
            "input device \"{}\": {} Hz native, {} ch, {}-sample frames",
            device.name().unwrap_or_else(|_| "unknown".into()),
            native_rate,
            channels,
            self.chunk_size
        );

        let fault = StreamFault::new();
        let callback_fault = fault.clone();

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Copy + downmix only; the queue push never blocks.
                let mono = stereo_to_mono(data, channels);
                queue.push(AudioFrame::new(mono));
            },
            move |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
                callback_fault.raise(format!("audio stream failed: {err}"));
            },
            None, // no timeout
        )?;

        stream.play()?;

        Ok(SourceStream::with_fault(
            native_rate,
            Box::new(CpalGuard { _stream: stream }),
            fault,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
