//! Session data model: the observable `VoiceSession` snapshot and the controller phases.

use serde::{Deserialize, Serialize};

/// How a user turn is gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListeningMode {
    /// Explicit key/button hold opens the turn. VAD is bypassed.
    PushToTalk,
    /// VAD activation opens the turn; silence timeout closes it.
    AlwaysOn,
}

/// Where command intents come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    /// `response.function_call_arguments.done` events from the realtime model.
    Remote,
    /// Finalized user utterances matched by the local intent router.
    Local,
}

/// Connection status as shown to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

/// Controller state machine phase.
///
/// ```text
/// Idle -> Connecting -> Connected <-> {Listening, Speaking}
///                           |
///                           +-> Errored -> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Connecting,
    Connected,
    Listening,
    Speaking,
    Errored,
    Disconnected,
}

impl SessionPhase {
    /// Phases in which the channel is open.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SessionPhase::Connected | SessionPhase::Listening | SessionPhase::Speaking
        )
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        match self {
            SessionPhase::Idle | SessionPhase::Disconnected => ConnectionStatus::Disconnected,
            SessionPhase::Connecting => ConnectionStatus::Connecting,
            SessionPhase::Connected | SessionPhase::Listening | SessionPhase::Speaking => {
                ConnectionStatus::Connected
            }
            SessionPhase::Errored => ConnectionStatus::Errored,
        }
    }
}

/// Read-only snapshot published to the UI after every controller mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSession {
    pub mode: ListeningMode,
    pub phase: SessionPhase,
    pub connection_status: ConnectionStatus,
    pub listening: bool,
    pub speaking: bool,
    /// Input level in [0, 1] for metering.
    pub volume: f32,
}

impl VoiceSession {
    pub fn new(mode: ListeningMode) -> Self {
        Self {
            mode,
            phase: SessionPhase::Idle,
            connection_status: ConnectionStatus::Disconnected,
            listening: false,
            speaking: false,
            volume: 0.0,
        }
    }
}
