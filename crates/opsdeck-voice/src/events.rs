//! Events the controller publishes for the UI host.

use crate::backend::NavigationRequest;
use crate::dispatcher::CommandResult;
use crate::transcript::TranscriptEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Toast-style message. `Error` notifications are also spoken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// Whether the UI should offer a manual reconnect.
    pub reconnect_available: bool,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            reconnect_available: false,
            at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }

    pub fn with_reconnect(mut self, available: bool) -> Self {
        self.reconnect_available = available;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Running partial (`is_final: false`) or finalized utterance.
    Transcript(TranscriptEvent),
    Notification(Notification),
    CommandOutcome { name: String, result: CommandResult },
    Navigation(NavigationRequest),
}
