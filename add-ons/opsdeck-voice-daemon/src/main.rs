//! OpsDeck voice daemon.
//!
//! Wires the realtime voice pipeline to the default microphone and speakers,
//! listens for the global toggle and push-to-talk hotkeys, and logs session
//! events as JSON lines for the dashboard shell to pick up.
//!
//! The OS key hook cannot see which widget has focus. The shell reports it on
//! stdin, one line per change: `focus text` while a text input is focused and
//! `focus elsewhere` once it is not. Hotkey presses are suppressed while the
//! last report was `focus text`. Without reports, hotkeys are never suppressed.

use opsdeck_voice::{
    ChannelNavigator, CommandDispatcher, ControlCommand, CpalCapture, ControllerParts,
    FallbackSynthesizer, FocusContext, HotkeyMap, HttpOpsBackend, IntentRouter, IntentSource,
    KeyPhase, KeywordIntentRouter, NoIntents, RodioSink, SessionEvent, SharedFocus, VoiceConfig,
    VoiceSessionController, WsConnector,
};
use rdev::{listen, Event, EventType};
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// The capture stream is not Send, so the controller stays on this thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[opsdeck-voice] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if std::env::args().any(|arg| arg == "--list-devices") {
        for name in CpalCapture::list_input_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = VoiceConfig::load()?;
    tracing::info!(
        mode = ?config.session.mode,
        intents = ?config.session.intent_source,
        model = %config.realtime.model,
        "OpsDeck voice daemon starting"
    );

    let backend = Arc::new(HttpOpsBackend::new(&config.backend)?);
    let (navigator, navigation_rx) = ChannelNavigator::new();
    let dispatcher = CommandDispatcher::with_default_handlers(backend, Arc::new(navigator));
    let intents: Arc<dyn IntentRouter> = match config.session.intent_source {
        IntentSource::Local => Arc::new(KeywordIntentRouter::new()),
        IntentSource::Remote => Arc::new(NoIntents),
    };

    let parts = ControllerParts {
        connector: Arc::new(WsConnector),
        capture: Box::new(CpalCapture::new(config.audio.clone())),
        sink: Arc::new(RodioSink::new()?),
        synthesizer: Arc::new(FallbackSynthesizer::from_config(
            &config.synthesis,
            config.audio.sample_rate,
        )?),
        dispatcher: Arc::new(dispatcher),
        intents,
    };

    let (controls, controls_rx) = mpsc::unbounded_channel();
    let focus = SharedFocus::default();
    spawn_focus_reader(focus.clone());
    spawn_hotkey_listener(HotkeyMap::new(&config.hotkeys), focus, controls.clone());

    let shutdown = controls.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("CTRL-C received; shutting down voice daemon");
            let _ = shutdown.send(ControlCommand::Shutdown);
        }
    });

    let mut controller = VoiceSessionController::new(config, parts).with_navigation(navigation_rx);
    if let Some(events) = controller.take_events() {
        tokio::spawn(log_session_events(events));
    }

    controller.run(controls_rx).await?;
    Ok(())
}

/// Global key hook on a plain thread; `rdev::listen` blocks forever.
fn spawn_hotkey_listener(
    mut keys: HotkeyMap,
    focus: SharedFocus,
    controls: mpsc::UnboundedSender<ControlCommand>,
) {
    std::thread::spawn(move || {
        let callback = move |event: Event| {
            let (key, phase) = match event.event_type {
                EventType::KeyPress(key) => (key, KeyPhase::Pressed),
                EventType::KeyRelease(key) => (key, KeyPhase::Released),
                _ => return,
            };
            if let Some(command) = keys.resolve(&format!("{:?}", key), phase, focus.get()) {
                let _ = controls.send(command);
            }
        };

        if let Err(e) = listen(callback) {
            tracing::error!("Hotkey listener error: {:?}", e);
        }
    });
}

/// Focus reports from the shell on stdin; ends quietly when stdin closes.
fn spawn_focus_reader(focus: SharedFocus) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Focus reports unavailable: {}", e);
                    break;
                }
            };
            match FocusContext::parse_report(&line) {
                Some(context) => {
                    tracing::debug!(?context, "focus changed");
                    focus.set(context);
                }
                None if line.trim().is_empty() => {}
                None => tracing::warn!("Ignoring unknown shell input: {}", line.trim()),
            }
        }
    });
}

async fn log_session_events(mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "failed to encode session event"),
        }
    }
}
