//! Demo binary: listen for one utterance, speak the transcript back.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`PipelineConfig`] from disk (returns default on first run) and
//!    validate it.
//! 3. Build the shared Whisper engine factory (GPU when configured, CPU
//!    fallback handled inside the session).
//! 4. Spawn the synthesis worker.
//! 5. Start a capture session and drain listener events until it ends.
//! 6. Echo the final transcript through the synthesizer, wait for
//!    playback, shut both workers down.

use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;

use voice_pipeline::{
    audio::MicSource,
    config::{AppPaths, PipelineConfig},
    session::{CaptureSession, ListenerEvent, SharedEngineFactory},
    stt::{EngineMode, SpeechRecognizer, WhisperRecognizer},
    synth::{HttpSynth, SpeechSynth, SynthEvent, Synthesizer},
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice pipeline starting up");

    // 2. Configuration
    let config = PipelineConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        PipelineConfig::default()
    });
    config.validate()?;

    // 3. Recognition engine factory.  The session builds the engine on its
    //    worker thread; GPU faults downgrade to CPU there.
    let model_path = AppPaths::new()
        .models_dir
        .join(format!("ggml-{}.bin", config.listener.model_size));
    let want_gpu = config.listener.device.eq_ignore_ascii_case("cuda");
    let engine_factory: SharedEngineFactory = {
        let model_path = model_path.clone();
        Arc::new(move |mode| {
            let use_gpu = want_gpu && mode == EngineMode::Primary;
            WhisperRecognizer::load(&model_path, use_gpu)
                .map(|engine| Box::new(engine) as Box<dyn SpeechRecognizer>)
        })
    };

    // 4. Synthesis worker
    let (synth_tx, synth_rx) = channel::<SynthEvent>();
    let synth_config = config.synthesis.clone();
    let mut synthesizer = Synthesizer::spawn(
        Box::new(move || {
            HttpSynth::new(&synth_config).map(|engine| Box::new(engine) as Box<dyn SpeechSynth>)
        }),
        synth_tx,
    );

    // 5. Capture session
    let (listener_tx, listener_rx) = channel::<ListenerEvent>();
    let device_index = config.listener.input_device_index;
    let chunk_size = config.listener.chunk_size;
    let mut session = CaptureSession::new(
        config.listener.clone(),
        Box::new(move || Box::new(MicSource::new(device_index, chunk_size))),
        engine_factory,
        listener_tx,
    );

    if !session.start() {
        anyhow::bail!("capture session failed to start");
    }
    log::info!("listening (model: {})", model_path.display());

    let mut final_text: Option<String> = None;
    for event in &listener_rx {
        match event {
            ListenerEvent::Partial { text, confidence } => {
                log::info!("partial [{confidence:.2}]: {text}");
            }
            ListenerEvent::Final { text, confidence } => {
                log::info!("final [{confidence:.2}]: {text}");
                final_text = Some(text);
            }
            ListenerEvent::SilenceTimeout => log::info!("no speech detected"),
            ListenerEvent::ListeningChanged(active) => {
                log::info!("listening: {active}");
                if !active {
                    break;
                }
            }
            ListenerEvent::MicLevel(level) => log::trace!("mic level {level:.2}"),
            ListenerEvent::Error(message) => log::warn!("{message}"),
        }
    }
    session.shutdown();

    // 6. Speak the transcript back and wait for playback to end.
    if let Some(text) = final_text {
        if synthesizer.submit(&text) {
            loop {
                match synth_rx.recv_timeout(Duration::from_secs(60)) {
                    Ok(SynthEvent::Finished) => break,
                    Ok(SynthEvent::Error(message)) => log::warn!("synthesis: {message}"),
                    Ok(SynthEvent::Started) => log::info!("speaking"),
                    Err(_) => {
                        log::warn!("synthesis did not finish in time");
                        break;
                    }
                }
            }
        }
    }
    synthesizer.shutdown();

    log::info!("voice pipeline shut down");
    Ok(())
}
