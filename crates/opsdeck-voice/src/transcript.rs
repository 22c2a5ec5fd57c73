//! Transcript aggregation and the bounded conversation log.
//!
//! The controller is the only writer. UI code holds a `ConversationReader`, which
//! can snapshot the log but has no way to mutate it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Running or final transcript text for one speaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEvent {
    pub role: Role,
    pub text: String,
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
}

/// Finalized utterance stored in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

type SharedLog = Arc<RwLock<VecDeque<Message>>>;

/// Insertion-ordered log capped at `capacity` messages (oldest dropped first).
#[derive(Debug)]
pub struct ConversationLog {
    messages: SharedLog,
    capacity: usize,
}

impl ConversationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn push(&self, message: Message) {
        let mut messages = self
            .messages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        messages.push_back(message);
        while messages.len() > self.capacity {
            messages.pop_front();
        }
    }

    pub fn reader(&self) -> ConversationReader {
        ConversationReader {
            messages: Arc::clone(&self.messages),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Read-only handle on the conversation log.
#[derive(Debug, Clone)]
pub struct ConversationReader {
    messages: SharedLog,
}

impl ConversationReader {
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<Message> {
        self.messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .back()
            .cloned()
    }
}

/// Accumulates streamed deltas per role into finalized messages.
#[derive(Debug)]
pub struct TranscriptAggregator {
    user: String,
    assistant: String,
    log: ConversationLog,
}

impl TranscriptAggregator {
    pub fn new(window: usize) -> Self {
        Self {
            user: String::new(),
            assistant: String::new(),
            log: ConversationLog::new(window),
        }
    }

    fn buffer(&mut self, role: Role) -> &mut String {
        match role {
            Role::User => &mut self.user,
            Role::Assistant => &mut self.assistant,
        }
    }

    /// Append a delta and return the running partial for display.
    pub fn push_delta(&mut self, role: Role, delta: &str) -> TranscriptEvent {
        let buffer = self.buffer(role);
        buffer.push_str(delta);
        TranscriptEvent {
            role,
            text: buffer.clone(),
            is_final: false,
            timestamp: Utc::now(),
        }
    }

    /// Close the current utterance. `final_text` wins over the buffered deltas when
    /// non-empty. Blank utterances produce no message.
    pub fn finalize(&mut self, role: Role, final_text: Option<&str>) -> Option<Message> {
        let buffered = std::mem::take(self.buffer(role));
        let text = match final_text.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => buffered.trim().to_string(),
        };
        if text.is_empty() {
            return None;
        }
        let message = Message {
            id: Uuid::new_v4(),
            role,
            text,
            timestamp: Utc::now(),
        };
        self.log.push(message.clone());
        Some(message)
    }

    pub fn partial(&self, role: Role) -> &str {
        match role {
            Role::User => &self.user,
            Role::Assistant => &self.assistant,
        }
    }

    /// Discard in-progress buffers (e.g. on disconnect). Finalized messages stay.
    pub fn clear_partials(&mut self) {
        self.user.clear();
        self.assistant.clear();
    }

    pub fn reader(&self) -> ConversationReader {
        self.log.reader()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate_then_finalize() {
        let mut agg = TranscriptAggregator::new(20);
        assert_eq!(agg.push_delta(Role::Assistant, "Task ").text, "Task ");
        let partial = agg.push_delta(Role::Assistant, "updated.");
        assert_eq!(partial.text, "Task updated.");
        assert!(!partial.is_final);

        let msg = agg.finalize(Role::Assistant, None).unwrap();
        assert_eq!(msg.text, "Task updated.");
        assert_eq!(agg.partial(Role::Assistant), "");
        assert_eq!(agg.reader().len(), 1);
    }

    #[test]
    fn roles_have_independent_buffers() {
        let mut agg = TranscriptAggregator::new(20);
        agg.push_delta(Role::User, "open ");
        agg.push_delta(Role::Assistant, "Sure");
        agg.push_delta(Role::User, "tasks");
        assert_eq!(agg.partial(Role::User), "open tasks");
        assert_eq!(agg.partial(Role::Assistant), "Sure");
    }

    #[test]
    fn final_text_overrides_buffer_and_blank_is_skipped() {
        let mut agg = TranscriptAggregator::new(20);
        agg.push_delta(Role::User, "opn tsks");
        let msg = agg.finalize(Role::User, Some("open tasks")).unwrap();
        assert_eq!(msg.text, "open tasks");
        assert!(agg.finalize(Role::User, Some("   ")).is_none());
        assert_eq!(agg.reader().len(), 1);
    }

    #[test]
    fn log_drops_oldest_beyond_window() {
        let mut agg = TranscriptAggregator::new(3);
        for i in 0..5 {
            agg.finalize(Role::User, Some(&format!("m{}", i)));
        }
        let texts: Vec<String> = agg.reader().snapshot().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
    }
}
