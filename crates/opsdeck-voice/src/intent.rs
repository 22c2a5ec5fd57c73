//! Local intent routing for finalized user utterances.
//!
//! Used when the session's intent source is `local`. The router only proposes a
//! command name and raw arguments; the dispatcher still validates them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// A proposed command, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentMatch {
    pub name: &'static str,
    pub arguments: Value,
}

pub trait IntentRouter: Send + Sync {
    /// `None` when the utterance carries no command.
    fn route(&self, utterance: &str) -> Option<IntentMatch>;
}

/// Never matches. Handy for sessions that only converse.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIntents;

impl IntentRouter for NoIntents {
    fn route(&self, _utterance: &str) -> Option<IntentMatch> {
        None
    }
}

static OPEN_PAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?(?:open|go to|show|navigate to)\s+(?:the\s+)?([a-z][a-z\- ]*?)(?:\s+page)?$")
        .expect("invalid open page regex")
});

static SEARCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?(?:search|find|look up)\s+(?:for\s+)?(.+)$")
        .expect("invalid search regex")
});

static STATUS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:please\s+)?(?:mark|set|move)\s+task\s+([\w\-]+)\s+(?:as\s+|to\s+)?(pending|in progress|completed|complete|done|cancelled|canceled|on hold)$",
    )
    .expect("invalid status regex")
});

static SUMMARIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?(?:summari[sz]e|recap)\s+task\s+([\w\-]+)$")
        .expect("invalid summarize regex")
});

static ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?assign\s+([\w\-\.@]+)\s+to\s+task\s+([\w\-]+)$")
        .expect("invalid assign regex")
});

static TRANSLATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?translate\s+(.+?)\s+(?:in)?to\s+(russian|bulgarian|english|ukrainian)$")
        .expect("invalid translate regex")
});

/// Regex router for the common spoken dashboard commands.
///
/// Payments and task creation are not routed locally.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordIntentRouter;

impl KeywordIntentRouter {
    pub fn new() -> Self {
        Self
    }
}

fn clean(utterance: &str) -> String {
    utterance
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ','))
        .trim()
        .to_string()
}

fn status_value(spoken: &str) -> &'static str {
    match spoken.to_lowercase().as_str() {
        "pending" => "pending",
        "in progress" => "in_progress",
        "cancelled" | "canceled" => "cancelled",
        "on hold" => "on_hold",
        _ => "completed",
    }
}

fn language_code(spoken: &str) -> &'static str {
    match spoken.to_lowercase().as_str() {
        "russian" => "ru",
        "bulgarian" => "bg",
        "ukrainian" => "uk",
        _ => "en",
    }
}

impl IntentRouter for KeywordIntentRouter {
    fn route(&self, utterance: &str) -> Option<IntentMatch> {
        let text = clean(utterance);
        if text.is_empty() {
            return None;
        }

        if let Some(c) = STATUS_RE.captures(&text) {
            return Some(IntentMatch {
                name: "updateTaskStatus",
                arguments: json!({ "taskId": &c[1], "status": status_value(&c[2]) }),
            });
        }
        if let Some(c) = SUMMARIZE_RE.captures(&text) {
            return Some(IntentMatch {
                name: "summarizeTask",
                arguments: json!({ "taskId": &c[1] }),
            });
        }
        if let Some(c) = ASSIGN_RE.captures(&text) {
            return Some(IntentMatch {
                name: "assignUser",
                arguments: json!({ "taskId": &c[2], "userId": &c[1] }),
            });
        }
        if let Some(c) = TRANSLATE_RE.captures(&text) {
            return Some(IntentMatch {
                name: "translate",
                arguments: json!({ "text": &c[1], "targetLang": language_code(&c[2]) }),
            });
        }
        if let Some(c) = SEARCH_RE.captures(&text) {
            return Some(IntentMatch {
                name: "search",
                arguments: json!({ "query": c[1].trim() }),
            });
        }
        if let Some(c) = OPEN_PAGE_RE.captures(&text) {
            let route = format!("/{}", c[1].trim().to_lowercase().replace(' ', "-"));
            return Some(IntentMatch {
                name: "openPage",
                arguments: json!({ "route": route }),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(text: &str) -> Option<IntentMatch> {
        KeywordIntentRouter::new().route(text)
    }

    #[test]
    fn status_phrases_map_to_schema_values() {
        let m = route("Mark task t1 as done.").unwrap();
        assert_eq!(m.name, "updateTaskStatus");
        assert_eq!(m.arguments, json!({"taskId": "t1", "status": "completed"}));

        let m = route("set task T-17 on hold").unwrap();
        assert_eq!(m.arguments["status"], "on_hold");
    }

    #[test]
    fn navigation_and_search() {
        assert_eq!(
            route("Open the missions page").unwrap().arguments,
            json!({"route": "/missions"})
        );
        let m = route("search for drone D-4").unwrap();
        assert_eq!(m.name, "search");
        assert_eq!(m.arguments, json!({"query": "drone D-4"}));
    }

    #[test]
    fn assign_and_translate() {
        let m = route("assign maria to task t9").unwrap();
        assert_eq!(m.arguments, json!({"taskId": "t9", "userId": "maria"}));

        let m = route("Translate good morning into Bulgarian").unwrap();
        assert_eq!(m.arguments, json!({"text": "good morning", "targetLang": "bg"}));
    }

    #[test]
    fn small_talk_matches_nothing() {
        assert!(route("how is the weather over the field today").is_none());
        assert!(route("   ").is_none());
        assert!(NoIntents.route("open tasks").is_none());
    }
}
