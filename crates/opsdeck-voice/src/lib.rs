//! # OpsDeck Voice - Realtime Voice Assistant for the Operations Dashboard
//!
//! Captures microphone audio, streams it to a realtime voice service, plays the
//! spoken replies back in order, and turns recognized intents into validated
//! dashboard commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     VoiceSessionController                       │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │   Audio In   │→ │  Energy VAD  │→ │ PCM16 Encoder│→ ──┐     │
//! │  │    (cpal)    │  │ (always-on)  │  │   (base64)   │    │     │
//! │  └──────────────┘  └──────────────┘  └──────────────┘    ↓     │
//! │                                                 ┌──────────────┐│
//! │                                                 │   Realtime   ││
//! │                                                 │   Channel    ││
//! │                                                 │ (WebSocket)  ││
//! │                                                 └──────────────┘│
//! │         ┌──────────────────┬───────────────────────────┘       │
//! │         ↓                  ↓                  ↓                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │  Playback    │  │  Transcript  │  │   Command    │          │
//! │  │Queue (rodio) │  │  Aggregator  │  │  Dispatcher  │          │
//! │  └──────────────┘  └──────────────┘  └──────────────┘          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod backend;
pub mod channel;
pub mod codec;
pub mod command;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handlers;
pub mod hotkeys;
pub mod intent;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod synthesis;
pub mod transcript;
pub mod vad;

pub use audio::{rms, AudioFrame, CaptureDevice, CpalCapture};
pub use backend::{
    ChannelNavigator, HttpOpsBackend, NavigationRequest, Navigator, OpsBackend, PaymentReceipt,
    TaskRecord, TaskSummary,
};
pub use channel::{
    ChannelEvent, ChannelState, RealtimeChannel, RealtimeConnector, WsConnector,
    WsRealtimeChannel, NORMAL_CLOSE,
};
pub use codec::{decode_base64, encode_base64, wrap_wav, PcmDecoder, PcmEncoder};
pub use command::{tool_definitions, Command, CommandKind, TargetLang, TaskStatus};
pub use config::{
    AudioConfig, BackendConfig, HotkeyConfig, RealtimeConfig, SessionConfig, SynthesisConfig,
    VadConfig, VoiceConfig,
};
pub use controller::{ControllerParts, VoiceSessionController};
pub use dispatcher::{CommandContext, CommandDispatcher, CommandHandler, CommandResult};
pub use error::{ConnectionErrorKind, VoiceError, VoiceResult};
pub use events::{Notification, NotificationLevel, SessionEvent};
pub use hotkeys::{ControlCommand, FocusContext, HotkeyMap, KeyPhase, SharedFocus};
pub use intent::{IntentMatch, IntentRouter, KeywordIntentRouter, NoIntents};
pub use playback::{AudioPlaybackQueue, AudioSink, PlaybackChunk, PlaybackEvent, RodioSink};
pub use protocol::{ConversationItem, InboundEvent, OutboundEvent};
pub use session::{ConnectionStatus, IntentSource, ListeningMode, SessionPhase, VoiceSession};
pub use synthesis::{
    ElevenLabsTts, FallbackSynthesizer, OpenAiTts, PlatformTts, SpeechSynthesizer,
};
pub use transcript::{ConversationReader, Message, Role, TranscriptAggregator, TranscriptEvent};
pub use vad::{VadDecision, VadTransition, VoiceActivityDetector};
