//! `VoiceSessionController`: the state machine tying capture, VAD, the realtime
//! channel, playback, transcripts and command dispatch together.
//!
//! Everything runs on one task. The audio callback only pushes `AudioFrame`s into
//! a handoff channel; channel, playback and control events are multiplexed with
//! `tokio::select!` in [`VoiceSessionController::run`]. Each public operation can
//! also be driven directly, which is how the tests exercise it.

use crate::audio::{rms, AudioFrame, CaptureDevice};
use crate::backend::NavigationRequest;
use crate::channel::{ChannelEvent, RealtimeChannel, RealtimeConnector, NORMAL_CLOSE};
use crate::codec::{wrap_wav, PcmDecoder, PcmEncoder};
use crate::command::tool_definitions;
use crate::config::VoiceConfig;
use crate::dispatcher::{CommandContext, CommandDispatcher, CommandResult};
use crate::error::{VoiceError, VoiceResult};
use crate::events::{Notification, SessionEvent};
use crate::hotkeys::ControlCommand;
use crate::intent::IntentRouter;
use crate::playback::{AudioPlaybackQueue, AudioSink, PlaybackEvent};
use crate::protocol::{normalize_arguments, ConversationItem, InboundEvent, OutboundEvent};
use crate::session::{IntentSource, ListeningMode, SessionPhase, VoiceSession};
use crate::synthesis::SpeechSynthesizer;
use crate::transcript::{ConversationReader, Message, Role, TranscriptAggregator, TranscriptEvent};
use crate::vad::{VadTransition, VoiceActivityDetector};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Collaborators the controller drives. Built by the host (daemon, tests).
pub struct ControllerParts {
    pub connector: Arc<dyn RealtimeConnector>,
    pub capture: Box<dyn CaptureDevice>,
    pub sink: Arc<dyn AudioSink>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub intents: Arc<dyn IntentRouter>,
}

pub struct VoiceSessionController {
    config: VoiceConfig,
    frame_duration: Duration,
    connector: Arc<dyn RealtimeConnector>,
    capture: Box<dyn CaptureDevice>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    dispatcher: Arc<CommandDispatcher>,
    intents: Arc<dyn IntentRouter>,
    context: CommandContext,

    channel: Option<Box<dyn RealtimeChannel>>,
    channel_rx: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    frames_tx: mpsc::UnboundedSender<AudioFrame>,
    frames_rx: mpsc::UnboundedReceiver<AudioFrame>,
    faults_tx: mpsc::UnboundedSender<String>,
    faults_rx: mpsc::UnboundedReceiver<String>,
    playback: AudioPlaybackQueue,
    playback_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    navigation_rx: Option<mpsc::UnboundedReceiver<NavigationRequest>>,

    vad: VoiceActivityDetector,
    encoder: PcmEncoder,
    decoder: PcmDecoder,
    transcripts: TranscriptAggregator,

    phase: SessionPhase,
    session: VoiceSession,
    snapshot: watch::Sender<VoiceSession>,
    events: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,

    accepting_commands: bool,
    response_cancelled: bool,
    turn_audio_frames: usize,
    turns_started: u64,
    turns_ended: u64,
}

async fn recv_opt<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl VoiceSessionController {
    /// Must be called inside a tokio runtime (the playback worker is spawned here).
    pub fn new(config: VoiceConfig, parts: ControllerParts) -> Self {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        let (playback, playback_rx) = AudioPlaybackQueue::new(parts.sink);
        let (events, events_rx) = mpsc::unbounded_channel();
        let session = VoiceSession::new(config.session.mode);
        let (snapshot, _) = watch::channel(session.clone());

        Self {
            frame_duration: config.audio.frame_duration(),
            vad: VoiceActivityDetector::new(config.vad.clone()),
            encoder: PcmEncoder::new(config.audio.frame_size),
            decoder: PcmDecoder::new(),
            transcripts: TranscriptAggregator::new(config.session.conversation_window),
            context: CommandContext::new(config.session.operator_id.clone()),
            connector: parts.connector,
            capture: parts.capture,
            synthesizer: parts.synthesizer,
            dispatcher: parts.dispatcher,
            intents: parts.intents,
            channel: None,
            channel_rx: None,
            frames_tx,
            frames_rx,
            faults_tx,
            faults_rx,
            playback,
            playback_rx,
            navigation_rx: None,
            phase: SessionPhase::Idle,
            session,
            snapshot,
            events,
            events_rx: Some(events_rx),
            accepting_commands: false,
            response_cancelled: false,
            turn_audio_frames: 0,
            turns_started: 0,
            turns_ended: 0,
            config,
        }
    }

    /// Re-publish navigation requests (from a `ChannelNavigator`) on the session event stream.
    pub fn with_navigation(mut self, requests: mpsc::UnboundedReceiver<NavigationRequest>) -> Self {
        self.navigation_rx = Some(requests);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn snapshot(&self) -> VoiceSession {
        self.session.clone()
    }

    /// Snapshot stream; updated after every state change.
    pub fn subscribe(&self) -> watch::Receiver<VoiceSession> {
        self.snapshot.subscribe()
    }

    /// Session event stream. Yields `Some` once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    pub fn conversation(&self) -> ConversationReader {
        self.transcripts.reader()
    }

    /// (started, ended) turn counts since construction.
    pub fn turns(&self) -> (u64, u64) {
        (self.turns_started, self.turns_ended)
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_open()
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Event loop. Returns after `Shutdown` or when the control sender is dropped,
    /// leaving the session disabled.
    pub async fn run(&mut self, mut controls: mpsc::UnboundedReceiver<ControlCommand>) -> VoiceResult<()> {
        info!(
            "🎙️ Voice controller running (mode: {:?}, intents: {:?})",
            self.config.session.mode, self.config.session.intent_source
        );

        loop {
            enum Event {
                Control(ControlCommand),
                ControlsClosed,
                Frame(AudioFrame),
                CaptureFault(String),
                Channel(Option<ChannelEvent>),
                Playback(PlaybackEvent),
                Navigation(Option<NavigationRequest>),
            }

            let event = tokio::select! {
                control = controls.recv() => match control {
                    Some(c) => Event::Control(c),
                    None => Event::ControlsClosed,
                },
                Some(frame) = self.frames_rx.recv() => Event::Frame(frame),
                Some(fault) = self.faults_rx.recv() => Event::CaptureFault(fault),
                channel_event = recv_opt(&mut self.channel_rx) => Event::Channel(channel_event),
                Some(playback_event) = self.playback_rx.recv() => Event::Playback(playback_event),
                request = recv_opt(&mut self.navigation_rx) => Event::Navigation(request),
            };

            match event {
                Event::Control(ControlCommand::Shutdown) | Event::ControlsClosed => break,
                Event::Control(command) => self.handle_control(command).await,
                Event::Frame(frame) => self.handle_frame(frame).await,
                Event::CaptureFault(fault) => self.handle_capture_fault(fault).await,
                Event::Channel(Some(channel_event)) => self.handle_channel_event(channel_event).await,
                Event::Channel(None) => {
                    self.channel_rx = None;
                    if self.phase.is_live() {
                        self.fail(&VoiceError::transient("realtime channel ended unexpectedly"))
                            .await;
                    }
                }
                Event::Playback(playback_event) => self.handle_playback_event(playback_event),
                Event::Navigation(Some(request)) => self.emit(SessionEvent::Navigation(request)),
                Event::Navigation(None) => self.navigation_rx = None,
            }
        }

        self.disable().await;
        info!("Voice controller stopped");
        Ok(())
    }

    pub async fn handle_control(&mut self, command: ControlCommand) {
        let result = match command {
            ControlCommand::Toggle => {
                if self.phase.is_live() || self.phase == SessionPhase::Connecting {
                    self.disable().await;
                    Ok(())
                } else {
                    self.enable().await
                }
            }
            ControlCommand::PushToTalkPressed => self.start_turn().await,
            ControlCommand::PushToTalkReleased => {
                self.end_turn();
                Ok(())
            }
            ControlCommand::Reconnect => self.reconnect().await,
            ControlCommand::Shutdown => {
                self.disable().await;
                Ok(())
            }
        };
        if let Err(e) = result {
            debug!("{:?} not applied: {}", command, e);
        }
    }

    /// Idle/Disconnected -> Connecting -> Connected. No-op when already connected.
    pub async fn enable(&mut self) -> VoiceResult<()> {
        if self.phase.is_live() || self.phase == SessionPhase::Connecting {
            return Ok(());
        }
        info!("🔌 Enabling voice session");
        self.phase = SessionPhase::Connecting;
        self.publish();

        let connected = self.connector.connect(&self.config.realtime).await;
        let mut channel = match connected {
            Ok(channel) => channel,
            Err(e) => {
                self.fail(&e).await;
                return Err(e);
            }
        };
        self.channel_rx = channel.take_events();
        self.channel = Some(channel);
        self.accepting_commands = true;
        self.send(OutboundEvent::SessionUpdate {
            session: self.session_update(),
        });

        self.phase = SessionPhase::Connected;
        self.publish();

        if self.config.session.mode == ListeningMode::AlwaysOn {
            self.vad.reset();
            if let Err(e) = self.ensure_capture() {
                self.fail(&e).await;
                return Err(e);
            }
        }

        info!("✅ Voice session connected");
        self.notify(Notification::info("Voice assistant connected."));
        Ok(())
    }

    /// Any state -> Idle. Closes channel and capture and flushes playback. Idempotent.
    pub async fn disable(&mut self) {
        if self.phase == SessionPhase::Idle && self.channel.is_none() && !self.capture.is_open() {
            debug!("voice session already disabled");
            return;
        }
        self.teardown().await;
        self.phase = SessionPhase::Idle;
        self.publish();
        info!("🔇 Voice session disabled");
    }

    /// User-initiated only; nothing in the controller reconnects on its own.
    pub async fn reconnect(&mut self) -> VoiceResult<()> {
        match self.phase {
            SessionPhase::Idle | SessionPhase::Disconnected | SessionPhase::Errored => {
                info!("🔁 Reconnect requested");
                self.enable().await
            }
            _ => Ok(()),
        }
    }

    /// Connected/Speaking -> Listening. Opens capture if needed; barges in on
    /// assistant playback unless full duplex is enabled.
    pub async fn start_turn(&mut self) -> VoiceResult<()> {
        if !self.phase.is_live() {
            debug!(phase = ?self.phase, "turn ignored: session not connected");
            return Ok(());
        }
        if self.phase == SessionPhase::Listening {
            return Ok(());
        }
        if self.session.speaking && !self.config.session.full_duplex {
            self.barge_in();
        }
        if let Err(e) = self.ensure_capture() {
            self.fail(&e).await;
            return Err(e);
        }

        self.encoder.reset();
        self.turn_audio_frames = 0;
        self.turns_started += 1;
        self.phase = SessionPhase::Listening;
        self.session.listening = true;
        self.publish();
        info!("🎤 Listening (turn {})", self.turns_started);
        Ok(())
    }

    /// Listening -> Connected (or Speaking). Commits the turn's audio.
    pub fn end_turn(&mut self) {
        if self.phase != SessionPhase::Listening {
            return;
        }
        if let Some(rest) = self.encoder.flush() {
            self.send_audio(rest);
        }
        self.turns_ended += 1;

        if self.turn_audio_frames == 0 {
            debug!("empty turn, clearing input buffer");
            self.send(OutboundEvent::InputAudioClear);
        } else {
            self.send(OutboundEvent::InputAudioCommit);
            // Local intents ask for a reply only after routing the transcript
            if self.config.session.intent_source == IntentSource::Remote {
                self.request_response();
            }
        }

        self.session.listening = false;
        self.session.volume = 0.0;
        self.phase = if self.session.speaking {
            SessionPhase::Speaking
        } else {
            SessionPhase::Connected
        };
        if self.config.session.mode == ListeningMode::PushToTalk {
            self.capture.stop();
        }
        self.publish();
        info!(frames = self.turn_audio_frames, "⏹️ Turn {} ended", self.turns_ended);
    }

    /// Typed input from the dashboard, answered like a spoken turn.
    pub async fn send_text(&mut self, text: &str) -> VoiceResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::Validation("message is empty".to_string()));
        }
        let Some(channel) = self.channel.as_ref().filter(|_| self.phase.is_live()) else {
            return Err(VoiceError::ChannelSend(format!("session is {:?}", self.phase)));
        };
        channel.send(OutboundEvent::ConversationItemCreate {
            item: ConversationItem::user_text(text),
        })?;
        self.finalize(Role::User, text);

        match self.config.session.intent_source {
            IntentSource::Remote => self.request_response(),
            IntentSource::Local => self.route_utterance(text).await,
        }
        Ok(())
    }

    pub async fn handle_frame(&mut self, frame: AudioFrame) {
        if !self.phase.is_live() {
            return;
        }
        match self.config.session.mode {
            ListeningMode::PushToTalk => {
                if self.phase != SessionPhase::Listening {
                    return;
                }
                self.session.volume =
                    (rms(&frame.samples) * self.config.vad.meter_gain).clamp(0.0, 1.0);
                self.stream(&frame.samples);
                self.publish();
            }
            ListeningMode::AlwaysOn => {
                // Own playback would trip the detector
                if self.phase == SessionPhase::Speaking && !self.config.session.full_duplex {
                    return;
                }
                let decision = self.vad.process(&frame.samples, self.frame_duration);
                self.session.volume = decision.volume;
                match decision.transition {
                    Some(VadTransition::Activated) => {
                        if self.start_turn().await.is_err() {
                            return;
                        }
                    }
                    Some(VadTransition::Deactivated) => {
                        self.end_turn();
                        return;
                    }
                    None => {}
                }
                if self.phase == SessionPhase::Listening {
                    self.stream(&frame.samples);
                }
                self.publish();
            }
        }
    }

    pub async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Inbound(inbound) => self.handle_inbound(inbound).await,
            ChannelEvent::Closed { code, reason } => {
                if !self.phase.is_live() {
                    debug!(code = ?code, "close after teardown ignored");
                    return;
                }
                if code == Some(NORMAL_CLOSE) {
                    info!("Realtime session ended by remote: {}", reason);
                    self.teardown().await;
                    self.phase = SessionPhase::Disconnected;
                    self.publish();
                    self.notify(Notification::info("Voice session ended.").with_reconnect(true));
                } else {
                    let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
                    let err = VoiceError::transient(format!("closed with code {}: {}", code, reason));
                    self.fail(&err).await;
                }
            }
            ChannelEvent::Failed { kind, message } => {
                if self.phase.is_live() {
                    self.fail(&VoiceError::Connection { kind, message }).await;
                }
            }
        }
    }

    /// The open microphone stream failed. Ends a live session with `DeviceUnavailable`.
    pub async fn handle_capture_fault(&mut self, reason: String) {
        if !self.phase.is_live() || !self.capture.is_open() {
            debug!("capture fault ignored: {}", reason);
            return;
        }
        warn!("🎤 Microphone stream failed: {}", reason);
        self.fail(&VoiceError::DeviceUnavailable(reason)).await;
    }

    pub fn handle_playback_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Drained => {
                if self.session.speaking && !self.playback.is_active() {
                    self.session.speaking = false;
                    if self.phase == SessionPhase::Speaking {
                        self.phase = SessionPhase::Connected;
                    }
                    self.publish();
                    debug!("assistant finished speaking");
                }
            }
            PlaybackEvent::Failed { seq, error } => debug!(seq, "chunk failed: {}", error),
            PlaybackEvent::Started { seq } | PlaybackEvent::Finished { seq } => {
                debug!(seq, "playback progress")
            }
        }
    }

    async fn handle_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::SessionCreated { .. } => debug!("realtime session created"),
            InboundEvent::SessionUpdated { .. } => info!("✅ Realtime session configured"),
            InboundEvent::AudioDelta { delta, .. } => self.handle_audio_delta(&delta),
            InboundEvent::AudioDone { .. } => self.decoder.reset(),
            InboundEvent::AssistantTranscriptDelta { delta } => {
                let partial = self.transcripts.push_delta(Role::Assistant, &delta);
                self.emit(SessionEvent::Transcript(partial));
            }
            InboundEvent::AssistantTranscriptDone { transcript } => {
                self.finalize(Role::Assistant, &transcript);
            }
            InboundEvent::UserTranscriptDelta { delta } => {
                let partial = self.transcripts.push_delta(Role::User, &delta);
                self.emit(SessionEvent::Transcript(partial));
            }
            InboundEvent::UserTranscriptCompleted { transcript, .. } => {
                let message = self.finalize(Role::User, &transcript);
                if self.config.session.intent_source == IntentSource::Local {
                    match message {
                        Some(message) => self.route_utterance(&message.text).await,
                        None => self.request_response(),
                    }
                }
            }
            InboundEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => self.handle_function_call(call_id, name, arguments).await,
            InboundEvent::Error { error } => {
                warn!(code = ?error.code, "Realtime service error: {}", error.message);
                self.notify(Notification::warning(format!(
                    "Voice service error: {}",
                    error.message
                )));
            }
            InboundEvent::Other => {}
        }
    }

    fn handle_audio_delta(&mut self, delta: &str) {
        if self.response_cancelled {
            return;
        }
        if self.session.listening && !self.config.session.full_duplex {
            debug!("assistant audio dropped while the user is talking");
            return;
        }
        match self.decoder.push_base64(delta) {
            Ok(samples) if samples.is_empty() => {}
            Ok(samples) => {
                self.playback
                    .enqueue(wrap_wav(&samples, self.config.audio.sample_rate));
                self.mark_speaking();
            }
            Err(e) => warn!("Skipping audio delta: {}", e),
        }
    }

    async fn handle_function_call(&mut self, call_id: String, name: String, arguments: Value) {
        if self.config.session.intent_source != IntentSource::Remote {
            debug!("function call {} ignored: local intents active", name);
            return;
        }
        if !self.accepting_commands {
            warn!("Session disabled, not dispatching {}", name);
            return;
        }

        let result = match normalize_arguments(&arguments) {
            Ok(args) => self.dispatcher.execute(&name, &args, &self.context).await,
            Err(e) => {
                warn!("🚫 Rejected command '{}': {}", name, e);
                CommandResult::failure(e.to_string())
            }
        };
        let output = result.to_output();
        self.emit(SessionEvent::CommandOutcome { name, result });
        self.send(OutboundEvent::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput { call_id, output },
        });
        self.request_response();
    }

    async fn route_utterance(&mut self, text: &str) {
        if !self.accepting_commands {
            return;
        }
        let Some(intent) = self.intents.route(text) else {
            debug!("no command intent in utterance");
            self.request_response();
            return;
        };

        let result = self
            .dispatcher
            .execute(intent.name, &intent.arguments, &self.context)
            .await;
        let reply = result.message.clone();
        self.emit(SessionEvent::CommandOutcome {
            name: intent.name.to_string(),
            result,
        });
        if self.speak(&reply).await {
            self.mark_speaking();
        }
    }

    fn finalize(&mut self, role: Role, text: &str) -> Option<Message> {
        let message = self.transcripts.finalize(role, Some(text))?;
        self.emit(SessionEvent::Transcript(TranscriptEvent {
            role,
            text: message.text.clone(),
            is_final: true,
            timestamp: message.timestamp,
        }));
        Some(message)
    }

    fn mark_speaking(&mut self) {
        if self.session.speaking {
            return;
        }
        self.session.speaking = true;
        if self.phase == SessionPhase::Connected {
            self.phase = SessionPhase::Speaking;
        }
        self.publish();
        debug!("assistant speaking");
    }

    fn barge_in(&mut self) {
        info!("✋ Barge-in: stopping assistant playback");
        self.playback.flush();
        self.decoder.reset();
        self.send(OutboundEvent::ResponseCancel);
        self.response_cancelled = true;
        self.session.speaking = false;
    }

    fn request_response(&mut self) {
        self.response_cancelled = false;
        self.send(OutboundEvent::ResponseCreate);
    }

    /// Open the microphone, retrying once on `DeviceUnavailable`.
    fn ensure_capture(&mut self) -> VoiceResult<()> {
        if self.capture.is_open() {
            return Ok(());
        }
        match self.capture.start(self.frames_tx.clone(), self.faults_tx.clone()) {
            Err(VoiceError::DeviceUnavailable(reason)) => {
                warn!("Microphone unavailable ({}), retrying once", reason);
                self.capture
                    .start(self.frames_tx.clone(), self.faults_tx.clone())
            }
            other => other,
        }
    }

    fn stream(&mut self, samples: &[f32]) {
        for payload in self.encoder.push(samples) {
            self.send_audio(payload);
        }
    }

    fn send_audio(&mut self, payload: String) {
        if let Some(channel) = &self.channel {
            channel.send_audio(payload);
            self.turn_audio_frames += 1;
        }
    }

    fn send(&self, event: OutboundEvent) {
        if let Some(channel) = &self.channel {
            if let Err(e) = channel.send(event) {
                warn!("Realtime send failed: {}", e);
            }
        }
    }

    fn session_update(&self) -> Value {
        let realtime = &self.config.realtime;
        let remote = self.config.session.intent_source == IntentSource::Remote;
        let tools = if remote { tool_definitions() } else { Vec::new() };
        json!({
            "modalities": ["text", "audio"],
            "voice": realtime.voice,
            "instructions": realtime.instructions,
            "input_audio_format": "pcm16",
            "output_audio_format": "pcm16",
            "input_audio_transcription": { "model": realtime.transcription_model },
            "turn_detection": Value::Null,
            "tools": tools,
            "tool_choice": if remote { "auto" } else { "none" },
        })
    }

    /// Release channel and capture, flush playback, reset per-connection state.
    async fn teardown(&mut self) {
        self.accepting_commands = false;
        self.capture.stop();
        while self.faults_rx.try_recv().is_ok() {}
        self.channel_rx = None;
        if let Some(mut channel) = self.channel.take() {
            let dropped = channel.dropped_frames();
            channel.close().await;
            info!(dropped_frames = dropped, "Realtime channel released");
        }
        self.playback.flush();
        self.encoder.reset();
        self.decoder.reset();
        self.vad.reset();
        self.transcripts.clear_partials();
        self.response_cancelled = false;
        self.session.listening = false;
        self.session.speaking = false;
        self.session.volume = 0.0;
    }

    /// Errored (visible + spoken notification) -> Disconnected. Never reconnects.
    async fn fail(&mut self, error: &VoiceError) {
        error!("❌ Voice session error: {}", error);
        self.teardown().await;
        self.phase = SessionPhase::Errored;
        self.publish();

        let notification =
            Notification::error(error.user_message()).with_reconnect(error.allows_reconnect());
        let spoken = notification.message.clone();
        self.notify(notification);
        self.speak(&spoken).await;

        self.phase = SessionPhase::Disconnected;
        self.publish();
    }

    /// Synthesize and queue `text`. Returns whether audio was queued.
    async fn speak(&mut self, text: &str) -> bool {
        match self.synthesizer.synthesize(text).await {
            Ok(bytes) if !bytes.is_empty() => {
                self.playback.enqueue(bytes);
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!("Spoken output unavailable: {}", e);
                self.notify(Notification::warning(e.user_message()));
                false
            }
        }
    }

    fn notify(&self, notification: Notification) {
        info!(level = ?notification.level, "🔔 {}", notification.message);
        self.emit(SessionEvent::Notification(notification));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn publish(&mut self) {
        self.session.phase = self.phase;
        self.session.connection_status = self.phase.connection_status();
        self.snapshot.send_replace(self.session.clone());
    }
}
