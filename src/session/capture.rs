//! The capture session: worker lifecycle around the endpointing state
//! machine.
//!
//! [`CaptureSession`] is the public handle.  `start` spawns one worker
//! thread per session; the worker opens the audio source, builds the
//! transcription client from the engine factory, then drives an
//! [`Endpointer`] off the [`FrameQueue`] until a deadline, an explicit
//! stop, or a fault ends the session.
//!
//! ```text
//! Idle → Calibrating → AwaitingSpeech → Capturing → Finalizing → Stopped
//!   └────────────────────── any fault ──────────────────────────▶ Error
//! ```
//!
//! All timeouts are wall-clock and polled on every queue-pop attempt (120
//! ms poll), so they fire even when the device stops delivering frames.
//! Cancellation is a shared flag observed at each iteration; an in-flight
//! engine call is never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::audio::{mic_level, resample, rms, AudioSource, FrameQueue, DEFAULT_QUEUE_CAPACITY};
use crate::config::ListenerConfig;
use crate::stt::{EngineFactory, EngineMode, SpeechRecognizer, SttError, TranscriptionClient,
    RECOGNIZER_SAMPLE_RATE};

use super::endpoint::{Deadline, Endpointer, FrameStep};
use super::events::ListenerEvent;

/// How long a queue pop waits before the loop re-checks its deadlines and
/// the stop flag.  This bounds both timeout jitter and shutdown latency.
pub const POLL_INTERVAL: Duration = Duration::from_millis(120);

/// How long `shutdown` waits for the worker before detaching it.  An
/// in-flight engine call can outlast this; the detached worker still
/// observes its stop flag and exits on its own.
pub const JOIN_TIMEOUT: Duration = Duration::from_millis(1_200);

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Externally observable lifecycle state of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No worker has run yet.
    Idle,
    /// Worker running; accumulating calibration frames.
    Calibrating,
    /// Noise floor fixed; waiting for the speech trigger.
    AwaitingSpeech,
    /// Recording an utterance.
    Capturing,
    /// Transcribing the full utterance.
    Finalizing,
    /// Terminal: the session ended normally (finalize, timeout or stop).
    Stopped,
    /// Terminal: the session aborted on an unrecoverable fault.
    Error,
}

/// Factory shared across sessions; each `start` hands the worker a fresh
/// per-session [`EngineFactory`] view of it.
pub type SharedEngineFactory =
    Arc<dyn Fn(EngineMode) -> Result<Box<dyn SpeechRecognizer>, SttError> + Send + Sync>;

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// Public handle to the capture side of the pipeline.
///
/// The caller's thread only issues `start` / `stop` / `shutdown` and drains
/// the event receiver — capture, endpointing and transcription all happen
/// on the per-session worker.
pub struct CaptureSession {
    config: ListenerConfig,
    queue: FrameQueue,
    events: Sender<ListenerEvent>,
    make_source: Box<dyn Fn() -> Box<dyn AudioSource>>,
    engine_factory: SharedEngineFactory,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Create a session handle.
    ///
    /// * `make_source`     — produces the audio source a new worker opens
    ///   (the production closure builds a [`crate::audio::MicSource`]).
    /// * `engine_factory`  — builds recognition engines; invoked inside the
    ///   worker so the engine handle never crosses threads.
    /// * `events`          — the tagged-event channel drained by the owner.
    pub fn new(
        config: ListenerConfig,
        make_source: Box<dyn Fn() -> Box<dyn AudioSource>>,
        engine_factory: SharedEngineFactory,
        events: Sender<ListenerEvent>,
    ) -> Self {
        Self {
            config,
            queue: FrameQueue::new(DEFAULT_QUEUE_CAPACITY),
            events,
            make_source,
            engine_factory,
            stop: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            worker: None,
        }
    }

    /// The frame queue the worker consumes.  Exposed so in-process sources
    /// (and tests) can feed frames without going through cpal.
    pub fn frame_queue(&self) -> FrameQueue {
        self.queue.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns `true` while a worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Begin a listening session.
    ///
    /// No-op (returns `false`) while a worker is already running — exactly
    /// one worker exists per session.  Otherwise clears any stale frames,
    /// spawns the worker and emits `ListeningChanged(true)`.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        // Reap a finished worker from a previous session.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        // Fresh flag and state per session: a worker detached by a timed-out
        // shutdown still holds the previous Arcs and must keep seeing its
        // own stop request.
        self.stop = Arc::new(AtomicBool::new(false));
        self.state = Arc::new(Mutex::new(SessionState::Calibrating));
        self.queue.clear();

        let mut source = (self.make_source)();
        let shared = Arc::clone(&self.engine_factory);
        let factory: EngineFactory = Box::new(move |mode| shared(mode));

        let config = self.config.clone();
        let queue = self.queue.clone();
        let events = self.events.clone();
        let stop = Arc::clone(&self.stop);
        let state = Arc::clone(&self.state);

        let spawned = std::thread::Builder::new()
            .name("capture-session".into())
            .spawn(move || {
                run_session(config, &mut *source, factory, queue, &events, &stop, &state);
            });
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                let _ = self.events.send(ListenerEvent::ListeningChanged(true));
                true
            }
            Err(e) => {
                log::error!("failed to spawn capture worker: {e}");
                set_state(&self.state, SessionState::Error);
                let _ = self
                    .events
                    .send(ListenerEvent::Error(format!("worker spawn failed: {e}")));
                false
            }
        }
    }

    /// Request the session to stop.  The worker observes the flag within
    /// one poll interval; an in-flight transcription call is allowed to
    /// complete first.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stop the worker and wait up to [`JOIN_TIMEOUT`] for it to exit.  A
    /// worker stuck in a long engine call is detached with a warning rather
    /// than blocking the caller; it finishes the call, observes its stop
    /// flag and exits on its own.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.worker.take() {
            join_with_timeout(handle, JOIN_TIMEOUT, "capture");
        }
    }
}

/// Join `handle`, giving up after `timeout` and detaching the thread.
pub(crate) fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration, name: &str) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            log::warn!("{name} worker did not stop within {timeout:?}; detaching");
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        log::error!("{name} worker panicked during shutdown");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

fn set_state(state: &Mutex<SessionState>, value: SessionState) {
    *state.lock().unwrap_or_else(|e| e.into_inner()) = value;
}

/// Abort helper: error event, `Error` state, session over.
fn fail(events: &Sender<ListenerEvent>, state: &Mutex<SessionState>, message: String) {
    log::error!("capture session aborted: {message}");
    let _ = events.send(ListenerEvent::Error(message));
    set_state(state, SessionState::Error);
    let _ = events.send(ListenerEvent::ListeningChanged(false));
}

fn run_session(
    config: ListenerConfig,
    source: &mut dyn AudioSource,
    factory: EngineFactory,
    queue: FrameQueue,
    events: &Sender<ListenerEvent>,
    stop: &AtomicBool,
    state: &Mutex<SessionState>,
) {
    let mut client = match TranscriptionClient::new(factory, config.language.clone()) {
        Ok(client) => client,
        Err(e) => {
            fail(events, state, format!("voice engine failed: {e}"));
            return;
        }
    };

    let stream = match source.open(queue.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            fail(events, state, format!("microphone error: {e}"));
            return;
        }
    };

    let stream_rate = stream.sample_rate();
    if stream_rate != config.sample_rate {
        log::info!(
            "stream runs at device-native {stream_rate} Hz (configured {} Hz)",
            config.sample_rate
        );
    }

    let mut endpointer = Endpointer::new(&config, Instant::now());
    log::debug!("session started, calibrating over the first frames");

    loop {
        if stop.load(Ordering::SeqCst) {
            log::debug!("stop requested; ending session");
            set_state(state, SessionState::Stopped);
            break;
        }

        // A fault raised by the stream's error callback ends the session
        // through the error path, not by decaying into a silence timeout.
        if let Some(message) = stream.take_fault() {
            fail(events, state, message);
            return;
        }

        if let Some(frame) = queue.pop_timeout(POLL_INTERVAL) {
            let now = Instant::now();
            let level = rms(&frame.samples);
            let _ = events.send(ListenerEvent::MicLevel(mic_level(level)));

            match endpointer.feed(frame.samples, now) {
                FrameStep::CalibrationComplete => {
                    log::debug!(
                        "calibration complete: noise floor {:.4}, threshold {:.4}",
                        endpointer.noise_floor(),
                        endpointer.threshold()
                    );
                    set_state(state, SessionState::AwaitingSpeech);
                }
                FrameStep::SpeechStarted => {
                    log::debug!("speech started (frame rms {level:.4})");
                    set_state(state, SessionState::Capturing);
                }
                _ => {}
            }

            if endpointer.partial_due(now) {
                let window = endpointer.take_partial_window(now);
                let audio = resample(&window, stream_rate, RECOGNIZER_SAMPLE_RATE);
                let result = client.transcribe(&audio);
                forward_notice(&mut client, events);
                if !result.is_empty() {
                    endpointer.set_latest_partial(result.text.clone());
                    let _ = events.send(ListenerEvent::Partial {
                        text: result.text,
                        confidence: result.confidence,
                    });
                }
            }
        }

        // Deadlines are polled whether or not a frame arrived.
        match endpointer.check_deadline(Instant::now()) {
            Some(Deadline::NotHearing) => {
                log::debug!("no speech within the not-hearing window");
                let _ = events.send(ListenerEvent::SilenceTimeout);
                set_state(state, SessionState::Stopped);
                break;
            }
            Some(deadline) => {
                log::debug!("finalizing utterance ({deadline:?})");
                set_state(state, SessionState::Finalizing);
                finalize(&endpointer, &mut client, stream_rate, events);
                set_state(state, SessionState::Stopped);
                break;
            }
            None => {}
        }
    }

    let _ = events.send(ListenerEvent::ListeningChanged(false));
}

/// Transcribe the full utterance and emit the final transcript, falling
/// back to the last partial, and to a silence timeout when nothing at all
/// was recognised.
fn finalize(
    endpointer: &Endpointer,
    client: &mut TranscriptionClient,
    stream_rate: u32,
    events: &Sender<ListenerEvent>,
) {
    let audio = resample(
        &endpointer.speech_audio(),
        stream_rate,
        RECOGNIZER_SAMPLE_RATE,
    );
    let mut result = client.transcribe(&audio);
    forward_notice(client, events);

    if result.is_empty() {
        result.text = endpointer.latest_partial().trim().to_string();
    }

    if result.is_empty() {
        let _ = events.send(ListenerEvent::SilenceTimeout);
    } else {
        let _ = events.send(ListenerEvent::Final {
            text: result.text,
            confidence: result.confidence,
        });
    }
}

/// Surface a pending engine-fallback notice as a warning-grade error event.
fn forward_notice(client: &mut TranscriptionClient, events: &Sender<ListenerEvent>) {
    if let Some(notice) = client.take_notice() {
        let _ = events.send(ListenerEvent::Error(notice));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFrame, CaptureError, NoopGuard, SourceStream, StreamFault};
    use crate::stt::engine::{MockRecognizer, RecognizedSegment};
    use std::sync::mpsc::{channel, Receiver};

    const FRAME_LEN: usize = 1_024;
    const QUIET: f32 = 0.002;
    const LOUD: f32 = 0.05;

    /// Source whose stream is fed by the test through the session's own
    /// frame queue.
    struct TestSource;

    impl crate::audio::AudioSource for TestSource {
        fn open(&mut self, _queue: FrameQueue) -> Result<SourceStream, CaptureError> {
            Ok(SourceStream::new(
                RECOGNIZER_SAMPLE_RATE,
                Box::new(NoopGuard),
            ))
        }
    }

    /// Source that fails to open, for the device-error path.
    struct BrokenSource;

    impl crate::audio::AudioSource for BrokenSource {
        fn open(&mut self, _queue: FrameQueue) -> Result<SourceStream, CaptureError> {
            Err(CaptureError::NoDevice)
        }
    }

    /// Source whose stream shares a fault slot with the test, for the
    /// mid-session device-failure path.
    struct FaultySource {
        fault: StreamFault,
    }

    impl crate::audio::AudioSource for FaultySource {
        fn open(&mut self, _queue: FrameQueue) -> Result<SourceStream, CaptureError> {
            Ok(SourceStream::with_fault(
                RECOGNIZER_SAMPLE_RATE,
                Box::new(NoopGuard),
                self.fault.clone(),
            ))
        }
    }

    /// Recognizer whose calls outlast the shutdown join window.
    struct SlowRecognizer;

    impl SpeechRecognizer for SlowRecognizer {
        fn transcribe(
            &self,
            _audio: &[f32],
            _language: &str,
        ) -> Result<Vec<RecognizedSegment>, SttError> {
            std::thread::sleep(Duration::from_secs(3));
            Ok(vec![])
        }
    }

    fn fast_config() -> ListenerConfig {
        ListenerConfig {
            silence_timeout_secs: 0.3,
            not_hearing_timeout_secs: 10.0,
            partial_update_secs: 0.05,
            max_record_secs: 20.0,
            ..ListenerConfig::default()
        }
    }

    fn shared_factory(make: impl Fn() -> MockRecognizer + Send + Sync + 'static) -> SharedEngineFactory {
        Arc::new(move |_mode| Ok(Box::new(make()) as Box<dyn SpeechRecognizer>))
    }

    fn session_with(
        config: ListenerConfig,
        factory: SharedEngineFactory,
    ) -> (CaptureSession, Receiver<ListenerEvent>) {
        let (tx, rx) = channel();
        let session = CaptureSession::new(
            config,
            Box::new(|| Box::new(TestSource)),
            factory,
            tx,
        );
        (session, rx)
    }

    fn push_frames(queue: &FrameQueue, amplitude: f32, count: usize) {
        for _ in 0..count {
            queue.push(AudioFrame::new(vec![amplitude; FRAME_LEN]));
        }
    }

    /// Collect events until the worker signals `ListeningChanged(false)`.
    fn drain_until_closed(rx: &Receiver<ListenerEvent>) -> Vec<ListenerEvent> {
        let mut events = Vec::new();
        loop {
            match rx.recv_timeout(Duration::from_secs(5)) {
                Ok(ev) => {
                    let done = ev == ListenerEvent::ListeningChanged(false);
                    events.push(ev);
                    if done {
                        return events;
                    }
                }
                Err(_) => panic!("worker never closed; got so far: {events:?}"),
            }
        }
    }

    fn finals(events: &[ListenerEvent]) -> Vec<&ListenerEvent> {
        events
            .iter()
            .filter(|e| matches!(e, ListenerEvent::Final { .. }))
            .collect()
    }

    // ---- Lifecycle ---------------------------------------------------------

    #[test]
    fn start_twice_spawns_no_second_worker() {
        let (mut session, _rx) =
            session_with(fast_config(), shared_factory(|| MockRecognizer::ok("x", None)));

        assert!(session.start());
        assert!(!session.start(), "second start must be a no-op");
        assert!(session.is_running());

        session.shutdown();
        assert!(!session.is_running());
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn explicit_stop_ends_session_promptly() {
        let (mut session, rx) =
            session_with(fast_config(), shared_factory(|| MockRecognizer::ok("x", None)));

        session.start();
        session.stop();
        session.shutdown();

        let events = drain_until_closed(&rx);
        assert_eq!(events.first(), Some(&ListenerEvent::ListeningChanged(true)));
        assert!(finals(&events).is_empty());
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn session_can_restart_after_stopping() {
        let (mut session, rx) =
            session_with(fast_config(), shared_factory(|| MockRecognizer::ok("x", None)));

        session.start();
        session.stop();
        session.shutdown();
        let _ = drain_until_closed(&rx);

        assert!(session.start(), "a stopped session must be restartable");
        session.shutdown();
    }

    // ---- Endpointing flow --------------------------------------------------

    #[test]
    fn utterance_produces_partials_then_final() {
        let (mut session, rx) = session_with(
            fast_config(),
            shared_factory(|| MockRecognizer::ok("hello there", Some(-0.2))),
        );
        let queue = session.frame_queue();

        session.start();
        push_frames(&queue, QUIET, 10); // calibration
        push_frames(&queue, LOUD, 4); // trigger + speech
        // A second voiced batch after the partial interval so the worker
        // sees a frame with a partial update due.
        std::thread::sleep(Duration::from_millis(150));
        push_frames(&queue, LOUD, 4);
        // Then silence long enough to pass the 0.3 s trailing timeout.
        let events = drain_until_closed(&rx);
        session.shutdown();

        assert!(
            events
                .iter()
                .any(|e| matches!(e, ListenerEvent::Partial { text, .. } if text == "hello there")),
            "expected a partial transcript: {events:?}"
        );
        let finals = finals(&events);
        assert_eq!(finals.len(), 1);
        match finals[0] {
            ListenerEvent::Final { text, confidence } => {
                assert_eq!(text, "hello there");
                assert!((confidence - (-0.2_f32).exp()).abs() < 1e-4);
            }
            _ => unreachable!(),
        }
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ListenerEvent::MicLevel(_))),
            "mic level events expected"
        );
    }

    #[test]
    fn empty_final_falls_back_to_latest_partial() {
        // First transcription (the partial) succeeds; everything after
        // returns no segments.
        let factory: SharedEngineFactory = Arc::new(|_mode| {
            Ok(Box::new(MockRecognizer::scripted(vec![
                Ok(vec![RecognizedSegment {
                    text: "partial words".into(),
                    avg_log_prob: Some(-0.3),
                }]),
                Ok(vec![]),
            ])) as Box<dyn SpeechRecognizer>)
        });
        let (mut session, rx) = session_with(fast_config(), factory);
        let queue = session.frame_queue();

        session.start();
        push_frames(&queue, QUIET, 10);
        push_frames(&queue, LOUD, 4);
        std::thread::sleep(Duration::from_millis(150));
        push_frames(&queue, LOUD, 4); // drives the partial transcription
        let events = drain_until_closed(&rx);
        session.shutdown();

        let finals = finals(&events);
        assert_eq!(finals.len(), 1);
        assert!(matches!(
            finals[0],
            ListenerEvent::Final { text, .. } if text == "partial words"
        ));
    }

    #[test]
    fn nothing_recognised_emits_silence_timeout_not_final() {
        let (mut session, rx) = session_with(
            fast_config(),
            shared_factory(|| MockRecognizer::scripted(vec![Ok(vec![])])),
        );
        let queue = session.frame_queue();

        session.start();
        push_frames(&queue, QUIET, 10);
        push_frames(&queue, LOUD, 4);
        let events = drain_until_closed(&rx);
        session.shutdown();

        assert!(finals(&events).is_empty());
        assert!(events.contains(&ListenerEvent::SilenceTimeout));
    }

    #[test]
    fn no_trigger_emits_silence_timeout_without_final() {
        let config = ListenerConfig {
            not_hearing_timeout_secs: 0.3,
            ..fast_config()
        };
        let (mut session, rx) =
            session_with(config, shared_factory(|| MockRecognizer::ok("x", None)));
        let queue = session.frame_queue();

        session.start();
        push_frames(&queue, QUIET, 10); // calibration only, never a trigger
        let events = drain_until_closed(&rx);
        session.shutdown();

        assert!(events.contains(&ListenerEvent::SilenceTimeout));
        assert!(finals(&events).is_empty());
        assert!(!events
            .iter()
            .any(|e| matches!(e, ListenerEvent::Partial { .. })));
    }

    // ---- Fault paths -------------------------------------------------------

    #[test]
    fn engine_load_failure_aborts_with_error_event() {
        let factory: SharedEngineFactory =
            Arc::new(|_mode| Err(SttError::ModelNotFound("/missing.bin".into())));
        let (mut session, rx) = session_with(fast_config(), factory);

        session.start();
        let events = drain_until_closed(&rx);
        session.shutdown();

        assert!(events
            .iter()
            .any(|e| matches!(e, ListenerEvent::Error(msg) if msg.contains("/missing.bin"))));
        assert_eq!(session.state(), SessionState::Error);
    }

    #[test]
    fn device_failure_aborts_with_error_event() {
        let (tx, rx) = channel();
        let mut session = CaptureSession::new(
            fast_config(),
            Box::new(|| Box::new(BrokenSource)),
            shared_factory(|| MockRecognizer::ok("x", None)),
            tx,
        );

        session.start();
        let events = drain_until_closed(&rx);
        session.shutdown();

        assert!(events
            .iter()
            .any(|e| matches!(e, ListenerEvent::Error(msg) if msg.contains("microphone"))));
        assert_eq!(session.state(), SessionState::Error);
    }

    #[test]
    fn stream_fault_aborts_session_through_error_path() {
        let fault = StreamFault::new();
        let source_fault = fault.clone();
        let (tx, rx) = channel();
        let mut session = CaptureSession::new(
            fast_config(),
            Box::new(move || {
                Box::new(FaultySource {
                    fault: source_fault.clone(),
                })
            }),
            shared_factory(|| MockRecognizer::ok("x", None)),
            tx,
        );
        let queue = session.frame_queue();

        session.start();
        push_frames(&queue, QUIET, 10);
        fault.raise("microphone unplugged".into());
        let events = drain_until_closed(&rx);
        session.shutdown();

        assert!(events
            .iter()
            .any(|e| matches!(e, ListenerEvent::Error(msg) if msg.contains("unplugged"))));
        assert_eq!(session.state(), SessionState::Error);
        // The fault ended the session directly, not by decaying into a
        // silence timeout.
        assert!(!events.contains(&ListenerEvent::SilenceTimeout));
    }

    #[test]
    fn shutdown_detaches_worker_stuck_in_engine_call() {
        let factory: SharedEngineFactory =
            Arc::new(|_mode| Ok(Box::new(SlowRecognizer) as Box<dyn SpeechRecognizer>));
        let (mut session, _rx) = session_with(fast_config(), factory);
        let queue = session.frame_queue();

        session.start();
        push_frames(&queue, QUIET, 10);
        push_frames(&queue, LOUD, 4); // trigger → partial → slow engine call

        // Let the worker enter the transcription call, then time the join.
        std::thread::sleep(Duration::from_millis(300));
        let begin = Instant::now();
        session.shutdown();
        assert!(
            begin.elapsed() < Duration::from_secs(2),
            "shutdown must not wait out the engine call"
        );
    }

    #[test]
    fn gpu_fault_surfaces_fallback_notice_and_recovers() {
        // Primary engine always raises a GPU fault; the CPU fallback
        // transcribes normally.
        let factory: SharedEngineFactory = Arc::new(|mode| {
            Ok(match mode {
                EngineMode::Primary => Box::new(MockRecognizer::err(SttError::Transcription(
                    "CUDA error: out of memory".into(),
                ))) as Box<dyn SpeechRecognizer>,
                EngineMode::Fallback => {
                    Box::new(MockRecognizer::ok("recovered text", Some(-0.1)))
                }
            })
        });
        let (mut session, rx) = session_with(fast_config(), factory);
        let queue = session.frame_queue();

        session.start();
        push_frames(&queue, QUIET, 10);
        push_frames(&queue, LOUD, 4);
        let events = drain_until_closed(&rx);
        session.shutdown();

        assert!(events
            .iter()
            .any(|e| matches!(e, ListenerEvent::Error(msg) if msg.contains("CPU"))));
        assert!(matches!(
            finals(&events).first(),
            Some(ListenerEvent::Final { text, .. }) if text == "recovered text"
        ));
    }
}
