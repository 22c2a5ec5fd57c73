//! In-process stand-ins for every controller seam.

#![allow(dead_code)]

use async_trait::async_trait;
use opsdeck_voice::channel::{DropCounter, StateCell};
use opsdeck_voice::{
    AudioFrame, AudioSink, CaptureDevice, ChannelEvent, ChannelState, CommandDispatcher,
    ConnectionErrorKind, ControllerParts, IntentRouter, NavigationRequest, Navigator,
    OpsBackend, OutboundEvent, PaymentReceipt, PlaybackChunk, RealtimeChannel, RealtimeConfig,
    RealtimeConnector, SpeechSynthesizer, TargetLang, TaskRecord, TaskStatus, TaskSummary,
    VoiceError, VoiceResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Test-side view of one mock channel.
#[derive(Clone)]
pub struct ChannelTap {
    pub sent: Arc<Mutex<Vec<OutboundEvent>>>,
    pub inbound: mpsc::UnboundedSender<ChannelEvent>,
    pub state: StateCell,
    pub dropped: DropCounter,
}

impl ChannelTap {
    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn audio_frames(&self) -> usize {
        self.sent().iter().filter(|e| e.is_audio()).count()
    }

    pub fn control_events(&self) -> Vec<OutboundEvent> {
        self.sent().into_iter().filter(|e| !e.is_audio()).collect()
    }

    pub fn count(&self, event: &OutboundEvent) -> usize {
        self.sent().iter().filter(|e| *e == event).count()
    }
}

pub struct MockChannel {
    tap: ChannelTap,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
}

#[async_trait]
impl RealtimeChannel for MockChannel {
    fn state(&self) -> ChannelState {
        self.tap.state.get()
    }

    fn send(&self, event: OutboundEvent) -> VoiceResult<()> {
        if self.tap.state.get() != ChannelState::Connected {
            return Err(VoiceError::ChannelSend("not connected".into()));
        }
        self.tap.sent.lock().unwrap().push(event);
        Ok(())
    }

    fn send_audio(&self, audio: String) {
        if self.send(OutboundEvent::InputAudioAppend { audio }).is_err() {
            self.tap.dropped.record();
        }
    }

    fn dropped_frames(&self) -> u64 {
        self.tap.dropped.get()
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events.take()
    }

    async fn close(&mut self) {
        self.tap.state.set(ChannelState::Closed);
    }
}

#[derive(Default)]
pub struct MockConnector {
    pub connects: AtomicUsize,
    pub fail_with: Mutex<Option<ConnectionErrorKind>>,
    taps: Mutex<Vec<ChannelTap>>,
}

impl MockConnector {
    pub fn last(&self) -> ChannelTap {
        self.taps
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no channel opened yet")
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeConnector for MockConnector {
    async fn connect(&self, _config: &RealtimeConfig) -> VoiceResult<Box<dyn RealtimeChannel>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = *self.fail_with.lock().unwrap() {
            return Err(VoiceError::Connection {
                kind,
                message: "handshake rejected".into(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let tap = ChannelTap {
            sent: Arc::new(Mutex::new(Vec::new())),
            inbound: tx,
            state: StateCell::new(ChannelState::Connected),
            dropped: DropCounter::default(),
        };
        self.taps.lock().unwrap().push(tap.clone());
        Ok(Box::new(MockChannel {
            tap,
            events: Some(rx),
        }))
    }
}

/// Shared handle on the mock microphone.
#[derive(Clone, Default)]
pub struct MicTap {
    pub frames: Arc<Mutex<Option<mpsc::UnboundedSender<AudioFrame>>>>,
    pub faults: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    /// Number of upcoming `start` calls that fail with `DeviceUnavailable`.
    pub failures_left: Arc<AtomicUsize>,
}

impl MicTap {
    pub fn is_open(&self) -> bool {
        self.frames.lock().unwrap().is_some()
    }

    pub fn push(&self, seq: u64, samples: Vec<f32>) -> bool {
        match self.frames.lock().unwrap().as_ref() {
            Some(tx) => tx.send(AudioFrame::new(seq, samples)).is_ok(),
            None => false,
        }
    }

    /// Report a stream failure the way the device callback would.
    pub fn fault(&self, reason: &str) -> bool {
        match self.faults.lock().unwrap().as_ref() {
            Some(tx) => tx.send(reason.to_string()).is_ok(),
            None => false,
        }
    }
}

pub struct MockCapture {
    tap: MicTap,
}

impl MockCapture {
    pub fn new(tap: MicTap) -> Self {
        Self { tap }
    }
}

impl CaptureDevice for MockCapture {
    fn start(
        &mut self,
        frames: mpsc::UnboundedSender<AudioFrame>,
        faults: mpsc::UnboundedSender<String>,
    ) -> VoiceResult<()> {
        self.tap.starts.fetch_add(1, Ordering::SeqCst);
        let failures = self.tap.failures_left.load(Ordering::SeqCst);
        if failures > 0 {
            self.tap.failures_left.store(failures - 1, Ordering::SeqCst);
            return Err(VoiceError::DeviceUnavailable("permission denied".into()));
        }
        *self.tap.frames.lock().unwrap() = Some(frames);
        *self.tap.faults.lock().unwrap() = Some(faults);
        Ok(())
    }

    fn stop(&mut self) {
        self.tap.faults.lock().unwrap().take();
        if self.tap.frames.lock().unwrap().take().is_some() {
            self.tap.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.tap.is_open()
    }
}

/// Plays instantly and remembers chunk sizes.
///
/// With `hold` set, each chunk plays until `stop` is called.
#[derive(Default)]
pub struct NullSink {
    pub played: Mutex<Vec<usize>>,
    pub hold: AtomicBool,
    release: Notify,
}

impl NullSink {
    pub fn played(&self) -> Vec<usize> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, chunk: &PlaybackChunk) -> VoiceResult<()> {
        self.played.lock().unwrap().push(chunk.bytes.len());
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        Ok(())
    }

    fn stop(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
pub struct CountingSynth {
    pub spoken: Mutex<Vec<String>>,
}

impl CountingSynth {
    pub fn calls(&self) -> usize {
        self.spoken.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechSynthesizer for CountingSynth {
    fn name(&self) -> &str {
        "counting"
    }

    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(vec![0u8; 64])
    }
}

#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl OpsBackend for RecordingBackend {
    async fn create_task_record(
        &self,
        title: &str,
        description: &str,
        created_by: &str,
    ) -> VoiceResult<TaskRecord> {
        self.record(format!("createTaskRecord({}, {}, {})", title, description, created_by));
        Ok(TaskRecord {
            id: "t100".into(),
            title: title.into(),
            description: description.into(),
            status: Some("pending".into()),
            created_by: Some(created_by.into()),
        })
    }

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> VoiceResult<()> {
        self.record(format!("updateTaskStatus({}, {})", task_id, status));
        Ok(())
    }

    async fn assign_user(&self, task_id: &str, user_id: &str) -> VoiceResult<()> {
        self.record(format!("assignUser({}, {})", task_id, user_id));
        Ok(())
    }

    async fn fetch_task_summary(&self, task_id: &str) -> VoiceResult<TaskSummary> {
        self.record(format!("fetchTaskSummary({})", task_id));
        Err(VoiceError::Handler("not found".into()))
    }

    async fn translate_text(&self, text: &str, target: TargetLang) -> VoiceResult<String> {
        self.record(format!("translateText({}, {})", text, target.as_str()));
        Ok(text.to_uppercase())
    }

    async fn initiate_bank_payment(
        &self,
        iban: &str,
        amount: f64,
        _comment: Option<&str>,
    ) -> VoiceResult<PaymentReceipt> {
        self.record(format!("initiateBankPayment({}, {})", iban, amount));
        Ok(PaymentReceipt {
            reference: "PAY-9".into(),
            status: "pending".into(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub requests: Mutex<Vec<NavigationRequest>>,
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, request: NavigationRequest) -> VoiceResult<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

/// Every mock wired into one controller.
pub struct Harness {
    pub connector: Arc<MockConnector>,
    pub mic: MicTap,
    pub sink: Arc<NullSink>,
    pub synth: Arc<CountingSynth>,
    pub backend: Arc<RecordingBackend>,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            connector: Arc::new(MockConnector::default()),
            mic: MicTap::default(),
            sink: Arc::new(NullSink::default()),
            synth: Arc::new(CountingSynth::default()),
            backend: Arc::new(RecordingBackend::default()),
            navigator: Arc::new(RecordingNavigator::default()),
        }
    }

    pub fn parts(&self, intents: Arc<dyn IntentRouter>) -> ControllerParts {
        let dispatcher =
            CommandDispatcher::with_default_handlers(self.backend.clone(), self.navigator.clone());
        ControllerParts {
            connector: self.connector.clone(),
            capture: Box::new(MockCapture::new(self.mic.clone())),
            sink: self.sink.clone(),
            synthesizer: self.synth.clone(),
            dispatcher: Arc::new(dispatcher),
            intents,
        }
    }
}

/// 20 ms of a constant-amplitude signal at 24 kHz.
pub fn frame(amplitude: f32) -> Vec<f32> {
    vec![amplitude; 480]
}
