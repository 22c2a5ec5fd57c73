//! JSON wire events exchanged with the realtime voice service.

use crate::error::{VoiceError, VoiceResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content part of a user message item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
}

/// Conversation item created by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    Message {
        role: String,
        content: Vec<ContentPart>,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

impl ConversationItem {
    pub fn user_text(text: impl Into<String>) -> Self {
        ConversationItem::Message {
            role: "user".to_string(),
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }
}

/// Client -> server events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: Value },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend { audio: String },

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioCommit,

    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioClear,

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate,

    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl OutboundEvent {
    pub fn to_json(&self) -> VoiceResult<String> {
        serde_json::to_string(self).map_err(|e| VoiceError::Protocol(e.to_string()))
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, OutboundEvent::InputAudioAppend { .. })
    }
}

/// Error payload carried by the server `error` event.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ServerError {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Server -> client events. Unknown types parse to `Other`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: Value,
    },

    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: Value,
    },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        response_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.audio.done")]
    AudioDone {
        #[serde(default)]
        response_id: Option<String>,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    AssistantTranscriptDelta { delta: String },

    #[serde(rename = "response.audio_transcript.done")]
    AssistantTranscriptDone {
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    UserTranscriptDelta { delta: String },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    UserTranscriptCompleted {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        #[serde(default)]
        call_id: String,
        name: String,
        /// JSON text per the realtime API; an inline object is accepted too.
        #[serde(default)]
        arguments: Value,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: ServerError,
    },

    #[serde(other)]
    Other,
}

impl InboundEvent {
    pub fn parse(text: &str) -> VoiceResult<Self> {
        serde_json::from_str(text).map_err(|e| VoiceError::Protocol(e.to_string()))
    }

    /// Wire name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::SessionCreated { .. } => "session.created",
            InboundEvent::SessionUpdated { .. } => "session.updated",
            InboundEvent::AudioDelta { .. } => "response.audio.delta",
            InboundEvent::AudioDone { .. } => "response.audio.done",
            InboundEvent::AssistantTranscriptDelta { .. } => "response.audio_transcript.delta",
            InboundEvent::AssistantTranscriptDone { .. } => "response.audio_transcript.done",
            InboundEvent::UserTranscriptDelta { .. } => {
                "conversation.item.input_audio_transcription.delta"
            }
            InboundEvent::UserTranscriptCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            InboundEvent::FunctionCallArgumentsDone { .. } => {
                "response.function_call_arguments.done"
            }
            InboundEvent::Error { .. } => "error",
            InboundEvent::Other => "other",
        }
    }
}

/// Normalize function-call arguments: JSON text is parsed, objects pass through.
pub fn normalize_arguments(arguments: &Value) -> VoiceResult<Value> {
    match arguments {
        Value::String(text) if text.trim().is_empty() => Ok(Value::Object(Default::default())),
        Value::String(text) => serde_json::from_str(text)
            .map_err(|e| VoiceError::Validation(format!("arguments are not valid JSON: {}", e))),
        Value::Null => Ok(Value::Object(Default::default())),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_shapes_match_wire_contract() {
        let append = OutboundEvent::InputAudioAppend {
            audio: "AAA=".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&append).unwrap(),
            json!({"type": "input_audio_buffer.append", "audio": "AAA="})
        );

        let item = OutboundEvent::ConversationItemCreate {
            item: ConversationItem::user_text("status report"),
        };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "type": "conversation.item.create",
                "item": {
                    "type": "message",
                    "role": "user",
                    "content": [{"type": "input_text", "text": "status report"}]
                }
            })
        );

        assert_eq!(
            serde_json::to_value(OutboundEvent::ResponseCreate).unwrap(),
            json!({"type": "response.create"})
        );
    }

    #[test]
    fn function_call_output_item() {
        let ev = OutboundEvent::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: "call_1".into(),
                output: "{\"ok\":true}".into(),
            },
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["item"]["type"], "function_call_output");
        assert_eq!(v["item"]["call_id"], "call_1");
    }

    #[test]
    fn parses_inbound_events() {
        let ev = InboundEvent::parse(
            r#"{"type":"response.audio.delta","response_id":"r1","item_id":"i1","delta":"AAA="}"#,
        )
        .unwrap();
        assert!(matches!(ev, InboundEvent::AudioDelta { ref delta, .. } if delta == "AAA="));

        let ev = InboundEvent::parse(
            r#"{"type":"response.function_call_arguments.done","call_id":"c1","name":"updateTaskStatus","arguments":"{\"taskId\":\"t1\",\"status\":\"completed\"}"}"#,
        )
        .unwrap();
        match ev {
            InboundEvent::FunctionCallArgumentsDone { name, arguments, .. } => {
                assert_eq!(name, "updateTaskStatus");
                let args = normalize_arguments(&arguments).unwrap();
                assert_eq!(args, json!({"taskId": "t1", "status": "completed"}));
            }
            other => panic!("unexpected {:?}", other),
        }

        let ev = InboundEvent::parse(r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad"}}"#)
            .unwrap();
        assert!(matches!(ev, InboundEvent::Error { ref error } if error.message == "bad"));
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let ev = InboundEvent::parse(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert_eq!(ev, InboundEvent::Other);
        assert!(InboundEvent::parse("not json").is_err());
    }

    #[test]
    fn inline_argument_objects_pass_through() {
        let args = json!({"taskId": "t1"});
        assert_eq!(normalize_arguments(&args).unwrap(), args);
        assert!(normalize_arguments(&json!("{broken")).is_err());
    }
}
