//! Error types for the OpsDeck voice pipeline

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Whether a connection failure may be retried by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Network blip, remote restart, timeout. A manual reconnect is offered.
    Transient,
    /// Bad credentials, bad endpoint. Reconnecting with the same config will not help.
    Fatal,
}

impl std::fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionErrorKind::Transient => write!(f, "transient"),
            ConnectionErrorKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Errors that can occur in the voice pipeline
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Connection error ({kind}): {message}")]
    Connection {
        kind: ConnectionErrorKind,
        message: String,
    },

    #[error("Command validation failed: {0}")]
    Validation(String),

    #[error("Command handler failed: {0}")]
    Handler(String),

    #[error("Audio decode error: {0}")]
    Decode(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    pub fn transient(message: impl Into<String>) -> Self {
        VoiceError::Connection {
            kind: ConnectionErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        VoiceError::Connection {
            kind: ConnectionErrorKind::Fatal,
            message: message.into(),
        }
    }

    /// True for conditions that end the current session attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VoiceError::DeviceUnavailable(_)
                | VoiceError::Connection {
                    kind: ConnectionErrorKind::Fatal,
                    ..
                }
        )
    }

    /// True when the user may press "reconnect" after this error.
    pub fn allows_reconnect(&self) -> bool {
        matches!(
            self,
            VoiceError::Connection {
                kind: ConnectionErrorKind::Transient,
                ..
            }
        )
    }

    /// Short sentence suitable for both a toast and a spoken notification.
    pub fn user_message(&self) -> String {
        match self {
            VoiceError::DeviceUnavailable(_) => {
                "Microphone is unavailable. Check the device and permissions.".to_string()
            }
            VoiceError::Connection {
                kind: ConnectionErrorKind::Transient,
                ..
            } => "Voice connection lost. You can reconnect when ready.".to_string(),
            VoiceError::Connection {
                kind: ConnectionErrorKind::Fatal,
                ..
            } => "Voice service rejected the connection.".to_string(),
            VoiceError::Synthesis(_) => "Voice output is unavailable.".to_string(),
            other => format!("Voice assistant error: {}", other),
        }
    }
}

impl From<cpal::DevicesError> for VoiceError {
    fn from(err: cpal::DevicesError) -> Self {
        VoiceError::DeviceUnavailable(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for VoiceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        VoiceError::DeviceUnavailable(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::DeviceUnavailable(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::DeviceUnavailable(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for VoiceError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Http(response) => {
                let status = response.status();
                let message = format!("handshake rejected with HTTP {}", status);
                if matches!(status.as_u16(), 400 | 401 | 403 | 404) {
                    VoiceError::fatal(message)
                } else {
                    VoiceError::transient(message)
                }
            }
            WsError::Url(e) => VoiceError::fatal(format!("invalid realtime URL: {}", e)),
            other => VoiceError::transient(other.to_string()),
        }
    }
}
