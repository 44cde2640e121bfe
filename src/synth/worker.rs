//! The synthesis worker: drains the request queue, chunks text and renders
//! it through a [`SpeechSynth`] engine.
//!
//! One worker per [`Synthesizer`]; it owns the engine handle for its whole
//! lifetime.  Submission never blocks, rendering is strictly sequential,
//! and shutdown is cooperative with a bounded join.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::session::capture::{join_with_timeout, JOIN_TIMEOUT};

use super::chunk::split_chunks;
use super::engine::{SpeechSynth, SynthError};
use super::queue::{SynthesisQueue, DEFAULT_SYNTH_QUEUE_CAPACITY};

/// How long a queue pop waits before the worker re-checks its stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Lifecycle events of the synthesis side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthEvent {
    /// Rendering of a request is about to begin.
    Started,
    /// A request finished, successfully or not.
    Finished,
    /// An engine fault; the current request is aborted.
    Error(String),
}

/// Engine constructor invoked on the worker thread, so the engine handle
/// never crosses threads.
pub type SynthFactory = Box<dyn FnOnce() -> Result<Box<dyn SpeechSynth>, SynthError> + Send>;

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

/// Public handle to the synthesis side of the pipeline.
pub struct Synthesizer {
    queue: SynthesisQueue,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Synthesizer {
    /// Spawn the worker.  Engine construction happens on the worker
    /// thread; a failure there emits [`SynthEvent::Error`] and the worker
    /// exits.
    pub fn spawn(make_engine: SynthFactory, events: Sender<SynthEvent>) -> Self {
        let queue = SynthesisQueue::new(DEFAULT_SYNTH_QUEUE_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));

        let worker_queue = queue.clone();
        let worker_stop = Arc::clone(&stop);
        let worker = std::thread::Builder::new()
            .name("synthesis".into())
            .spawn(move || run_worker(make_engine, worker_queue, &events, &worker_stop))
            .ok();
        if worker.is_none() {
            log::error!("failed to spawn synthesis worker");
        }

        Self {
            queue,
            stop,
            worker,
        }
    }

    /// Queue `text` for speech.  Returns `false` when the trimmed text is
    /// empty or the queue is full (the request is dropped either way).
    /// Never blocks.
    pub fn submit(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.queue.submit(trimmed.to_string())
    }

    /// Pending request count.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` while the worker thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the worker and wait up to [`JOIN_TIMEOUT`] for it.  Pending
    /// requests are discarded; a worker stuck rendering a chunk is detached
    /// with a warning and exits once the engine call returns.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.queue.clear();
        if let Some(handle) = self.worker.take() {
            join_with_timeout(handle, JOIN_TIMEOUT, "synthesis");
        }
    }
}

impl Drop for Synthesizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

fn run_worker(
    make_engine: SynthFactory,
    queue: SynthesisQueue,
    events: &Sender<SynthEvent>,
    stop: &AtomicBool,
) {
    let mut engine = match make_engine() {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("synthesis engine failed to initialise: {e}");
            let _ = events.send(SynthEvent::Error(format!("speech engine failed: {e}")));
            return;
        }
    };

    log::debug!("synthesis worker ready");
    while !stop.load(Ordering::SeqCst) {
        let Some(request) = queue.pop_timeout(POLL_INTERVAL) else {
            continue;
        };
        render_request(engine.as_mut(), &request, events, stop);
    }
    log::debug!("synthesis worker stopped");
}

/// Render one request chunk by chunk.  `Finished` is emitted whether the
/// request completed or aborted on an engine error.
fn render_request(
    engine: &mut dyn SpeechSynth,
    request: &str,
    events: &Sender<SynthEvent>,
    stop: &AtomicBool,
) {
    let _ = events.send(SynthEvent::Started);
    for chunk in split_chunks(request) {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        if let Err(e) = engine.speak(&chunk.text) {
            log::warn!("chunk synthesis failed: {e}");
            let _ = events.send(SynthEvent::Error(e.to_string()));
            break;
        }
        std::thread::sleep(chunk.pause());
    }
    let _ = events.send(SynthEvent::Finished);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::engine::MockSynth;
    use std::sync::mpsc::{channel, Receiver};

    fn spawn_with_mock(mock: MockSynth) -> (Synthesizer, Receiver<SynthEvent>) {
        let (tx, rx) = channel();
        let synth =
            Synthesizer::spawn(Box::new(move || Ok(Box::new(mock) as Box<dyn SpeechSynth>)), tx);
        (synth, rx)
    }

    fn collect_events(rx: &Receiver<SynthEvent>, count: usize) -> Vec<SynthEvent> {
        (0..count)
            .map(|_| {
                rx.recv_timeout(Duration::from_secs(5))
                    .expect("event within the deadline")
            })
            .collect()
    }

    #[test]
    fn renders_request_chunk_by_chunk() {
        let mock = MockSynth::new();
        let spoken = mock.spoken();
        let (mut synth, rx) = spawn_with_mock(mock);

        assert!(synth.submit("Hello there. How are you?"));
        let events = collect_events(&rx, 2);
        synth.shutdown();

        assert_eq!(events, vec![SynthEvent::Started, SynthEvent::Finished]);
        assert_eq!(
            *spoken.lock().unwrap(),
            vec!["Hello there.", "How are you?"]
        );
    }

    #[test]
    fn requests_are_rendered_fifo() {
        let mock = MockSynth::new();
        let spoken = mock.spoken();
        let (mut synth, rx) = spawn_with_mock(mock);

        assert!(synth.submit("First one."));
        assert!(synth.submit("Second one."));
        let events = collect_events(&rx, 4);
        synth.shutdown();

        assert_eq!(
            events,
            vec![
                SynthEvent::Started,
                SynthEvent::Finished,
                SynthEvent::Started,
                SynthEvent::Finished,
            ]
        );
        assert_eq!(*spoken.lock().unwrap(), vec!["First one.", "Second one."]);
    }

    #[test]
    fn engine_error_aborts_request_but_not_worker() {
        // The second chunk fails; the request aborts, the next request
        // still renders.
        let mock = MockSynth::failing_on(1);
        let spoken = mock.spoken();
        let (mut synth, rx) = spawn_with_mock(mock);

        assert!(synth.submit("Hello there. How are you?"));
        let events = collect_events(&rx, 3);
        assert_eq!(events[0], SynthEvent::Started);
        assert!(matches!(events[1], SynthEvent::Error(_)));
        assert_eq!(events[2], SynthEvent::Finished);

        assert!(synth.submit("Still alive."));
        let events = collect_events(&rx, 2);
        synth.shutdown();

        assert_eq!(events, vec![SynthEvent::Started, SynthEvent::Finished]);
        assert_eq!(*spoken.lock().unwrap(), vec!["Hello there.", "Still alive."]);
    }

    #[test]
    fn blank_submissions_are_rejected() {
        let (mut synth, _rx) = spawn_with_mock(MockSynth::new());
        assert!(!synth.submit(""));
        assert!(!synth.submit("   \n"));
        assert_eq!(synth.pending(), 0);
        synth.shutdown();
    }

    #[test]
    fn engine_load_failure_emits_error_and_exits() {
        let (tx, rx) = channel();
        let mut synth = Synthesizer::spawn(
            Box::new(|| Err(SynthError::Engine("no backend".into()))),
            tx,
        );

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, SynthEvent::Error(msg) if msg.contains("no backend")));

        // The worker has exited; shutdown joins immediately.
        synth.shutdown();
        assert!(!synth.is_running());
    }

    /// Engine whose render calls outlast the shutdown join window.
    struct SlowSynth;

    impl SpeechSynth for SlowSynth {
        fn speak(&mut self, _text: &str) -> Result<(), SynthError> {
            std::thread::sleep(Duration::from_secs(3));
            Ok(())
        }
    }

    #[test]
    fn shutdown_detaches_worker_stuck_in_engine_call() {
        let (tx, _rx) = channel();
        let mut synth =
            Synthesizer::spawn(Box::new(|| Ok(Box::new(SlowSynth) as Box<dyn SpeechSynth>)), tx);

        synth.submit("a long render");
        // Let the worker enter the render call, then time the join.
        std::thread::sleep(Duration::from_millis(300));
        let begin = std::time::Instant::now();
        synth.shutdown();
        assert!(
            begin.elapsed() < Duration::from_secs(2),
            "shutdown must not wait out the engine call"
        );
    }

    #[test]
    fn shutdown_discards_pending_requests() {
        let (mut synth, _rx) = spawn_with_mock(MockSynth::new());
        for i in 0..10 {
            synth.submit(&format!("request {i}"));
        }
        synth.shutdown();
        assert_eq!(synth.pending(), 0);
        assert!(!synth.is_running());
    }
}
