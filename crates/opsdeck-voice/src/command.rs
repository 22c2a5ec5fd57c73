//! Closed command schema for voice-initiated actions.
//!
//! `Command::parse` is the only way to build a `Command` from untrusted input. It
//! checks the exact argument shape (unknown fields rejected, enums closed, strings
//! non-empty) and fails closed: a value that comes back `Ok` is fully valid.

use crate::error::{VoiceError, VoiceResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    OnHold,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
        TaskStatus::OnHold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::OnHold => "on_hold",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLang {
    Ru,
    Bg,
    En,
    Uk,
}

impl TargetLang {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetLang::Ru => "ru",
            TargetLang::Bg => "bg",
            TargetLang::En => "en",
            TargetLang::Uk => "uk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OpenPageArgs {
    pub route: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchArgs {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTaskArgs {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub assignees: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTaskStatusArgs {
    pub task_id: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssignUserArgs {
    pub task_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SummarizeTaskArgs {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TranslateArgs {
    pub text: String,
    pub target_lang: TargetLang,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PayByBankArgs {
    pub iban: String,
    pub amount: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Variant tag, used as the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    OpenPage,
    Search,
    CreateTask,
    UpdateTaskStatus,
    AssignUser,
    SummarizeTask,
    Translate,
    PayByBank,
}

impl CommandKind {
    pub const ALL: [CommandKind; 8] = [
        CommandKind::OpenPage,
        CommandKind::Search,
        CommandKind::CreateTask,
        CommandKind::UpdateTaskStatus,
        CommandKind::AssignUser,
        CommandKind::SummarizeTask,
        CommandKind::Translate,
        CommandKind::PayByBank,
    ];

    /// Function name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::OpenPage => "openPage",
            CommandKind::Search => "search",
            CommandKind::CreateTask => "createTask",
            CommandKind::UpdateTaskStatus => "updateTaskStatus",
            CommandKind::AssignUser => "assignUser",
            CommandKind::SummarizeTask => "summarizeTask",
            CommandKind::Translate => "translate",
            CommandKind::PayByBank => "payByBank",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    fn description(&self) -> &'static str {
        match self {
            CommandKind::OpenPage => "Navigate the dashboard to a route such as /tasks or /missions.",
            CommandKind::Search => "Search tasks, missions and drones.",
            CommandKind::CreateTask => "Create a new task, optionally assigning users.",
            CommandKind::UpdateTaskStatus => "Change the status of an existing task.",
            CommandKind::AssignUser => "Assign a user to an existing task.",
            CommandKind::SummarizeTask => "Read back a short summary of a task.",
            CommandKind::Translate => "Translate text into another language.",
            CommandKind::PayByBank => "Prepare a bank transfer to an IBAN.",
        }
    }

    fn parameters(&self) -> Value {
        let statuses: Vec<&str> = TaskStatus::ALL.iter().map(|s| s.as_str()).collect();
        match self {
            CommandKind::OpenPage => object_schema(json!({"route": {"type": "string"}}), &["route"]),
            CommandKind::Search => object_schema(json!({"query": {"type": "string"}}), &["query"]),
            CommandKind::CreateTask => object_schema(
                json!({
                    "title": {"type": "string"},
                    "description": {"type": "string"},
                    "assignees": {"type": "array", "items": {"type": "string"}}
                }),
                &["title", "description"],
            ),
            CommandKind::UpdateTaskStatus => object_schema(
                json!({
                    "taskId": {"type": "string"},
                    "status": {"type": "string", "enum": statuses}
                }),
                &["taskId", "status"],
            ),
            CommandKind::AssignUser => object_schema(
                json!({"taskId": {"type": "string"}, "userId": {"type": "string"}}),
                &["taskId", "userId"],
            ),
            CommandKind::SummarizeTask => {
                object_schema(json!({"taskId": {"type": "string"}}), &["taskId"])
            }
            CommandKind::Translate => object_schema(
                json!({
                    "text": {"type": "string"},
                    "targetLang": {"type": "string", "enum": ["ru", "bg", "en", "uk"]}
                }),
                &["text", "targetLang"],
            ),
            CommandKind::PayByBank => object_schema(
                json!({
                    "iban": {"type": "string"},
                    "amount": {"type": "number", "exclusiveMinimum": 0},
                    "comment": {"type": "string"}
                }),
                &["iban", "amount"],
            ),
        }
    }

    /// Realtime session function-tool definition.
    pub fn tool_definition(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name(),
            "description": self.description(),
            "parameters": self.parameters(),
        })
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Tool definitions for every command, in routing-table order.
pub fn tool_definitions() -> Vec<Value> {
    CommandKind::ALL.iter().map(|k| k.tool_definition()).collect()
}

/// A fully validated command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    OpenPage(OpenPageArgs),
    Search(SearchArgs),
    CreateTask(CreateTaskArgs),
    UpdateTaskStatus(UpdateTaskStatusArgs),
    AssignUser(AssignUserArgs),
    SummarizeTask(SummarizeTaskArgs),
    Translate(TranslateArgs),
    PayByBank(PayByBankArgs),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::OpenPage(_) => CommandKind::OpenPage,
            Command::Search(_) => CommandKind::Search,
            Command::CreateTask(_) => CommandKind::CreateTask,
            Command::UpdateTaskStatus(_) => CommandKind::UpdateTaskStatus,
            Command::AssignUser(_) => CommandKind::AssignUser,
            Command::SummarizeTask(_) => CommandKind::SummarizeTask,
            Command::Translate(_) => CommandKind::Translate,
            Command::PayByBank(_) => CommandKind::PayByBank,
        }
    }

    /// Validate `arguments` against the shape named by `name`.
    pub fn parse(name: &str, arguments: &Value) -> VoiceResult<Self> {
        let kind = CommandKind::from_name(name)
            .ok_or_else(|| VoiceError::Validation(format!("unknown command '{}'", name)))?;
        if !arguments.is_object() {
            return Err(VoiceError::Validation(format!(
                "{}: arguments must be an object",
                name
            )));
        }

        let command = match kind {
            CommandKind::OpenPage => {
                let mut a: OpenPageArgs = shape(name, arguments)?;
                a.route = required(name, "route", &a.route)?;
                if !a.route.starts_with('/') {
                    return Err(VoiceError::Validation(format!(
                        "{}: route must start with '/'",
                        name
                    )));
                }
                Command::OpenPage(a)
            }
            CommandKind::Search => {
                let mut a: SearchArgs = shape(name, arguments)?;
                a.query = required(name, "query", &a.query)?;
                Command::Search(a)
            }
            CommandKind::CreateTask => {
                let mut a: CreateTaskArgs = shape(name, arguments)?;
                a.title = required(name, "title", &a.title)?;
                a.description = required(name, "description", &a.description)?;
                a.assignees = a
                    .assignees
                    .iter()
                    .map(|u| identifier(name, "assignees[]", u))
                    .collect::<VoiceResult<Vec<_>>>()?;
                Command::CreateTask(a)
            }
            CommandKind::UpdateTaskStatus => {
                let mut a: UpdateTaskStatusArgs = shape(name, arguments)?;
                a.task_id = identifier(name, "taskId", &a.task_id)?;
                Command::UpdateTaskStatus(a)
            }
            CommandKind::AssignUser => {
                let mut a: AssignUserArgs = shape(name, arguments)?;
                a.task_id = identifier(name, "taskId", &a.task_id)?;
                a.user_id = identifier(name, "userId", &a.user_id)?;
                Command::AssignUser(a)
            }
            CommandKind::SummarizeTask => {
                let mut a: SummarizeTaskArgs = shape(name, arguments)?;
                a.task_id = identifier(name, "taskId", &a.task_id)?;
                Command::SummarizeTask(a)
            }
            CommandKind::Translate => {
                let mut a: TranslateArgs = shape(name, arguments)?;
                a.text = required(name, "text", &a.text)?;
                Command::Translate(a)
            }
            CommandKind::PayByBank => {
                let mut a: PayByBankArgs = shape(name, arguments)?;
                a.iban = normalize_iban(&a.iban).ok_or_else(|| {
                    VoiceError::Validation(format!("{}: iban is not a valid IBAN", name))
                })?;
                if !(a.amount.is_finite() && a.amount > 0.0) {
                    return Err(VoiceError::Validation(format!(
                        "{}: amount must be a positive number",
                        name
                    )));
                }
                a.comment = a
                    .comment
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty());
                Command::PayByBank(a)
            }
        };
        Ok(command)
    }
}

fn shape<T: for<'de> Deserialize<'de>>(name: &str, arguments: &Value) -> VoiceResult<T> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| VoiceError::Validation(format!("{}: {}", name, e)))
}

fn required(name: &str, field: &str, value: &str) -> VoiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(VoiceError::Validation(format!(
            "{}: {} must not be empty",
            name, field
        )));
    }
    Ok(trimmed.to_string())
}

/// Task and user ids end up as URL path segments; only `[A-Za-z0-9_-]` is accepted.
fn identifier(name: &str, field: &str, value: &str) -> VoiceResult<String> {
    let id = required(name, field, value)?;
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(VoiceError::Validation(format!(
            "{}: {} may only contain letters, digits, '_' and '-'",
            name, field
        )));
    }
    Ok(id)
}

/// Strip spaces, uppercase, and verify the ISO 13616 mod-97 checksum.
pub fn normalize_iban(raw: &str) -> Option<String> {
    let iban: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if !(15..=34).contains(&iban.len()) || !iban.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let (head, tail) = iban.split_at(4);
    if !head[..2].chars().all(|c| c.is_ascii_alphabetic())
        || !head[2..].chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let mut remainder: u32 = 0;
    for c in tail.chars().chain(head.chars()) {
        let value = c.to_digit(36)?;
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    (remainder == 1).then_some(iban)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_update_status() {
        let cmd = Command::parse(
            "updateTaskStatus",
            &json!({"taskId": "t1", "status": "completed"}),
        )
        .unwrap();
        assert_eq!(
            cmd,
            Command::UpdateTaskStatus(UpdateTaskStatusArgs {
                task_id: "t1".into(),
                status: TaskStatus::Completed
            })
        );
        assert_eq!(cmd.kind().name(), "updateTaskStatus");
    }

    #[test]
    fn rejects_out_of_enum_values() {
        assert!(matches!(
            Command::parse("updateTaskStatus", &json!({"taskId": "t1", "status": "done"})),
            Err(VoiceError::Validation(_))
        ));
        assert!(matches!(
            Command::parse("translate", &json!({"text": "hi", "targetLang": "de"})),
            Err(VoiceError::Validation(_))
        ));
    }

    #[test]
    fn rejects_missing_unknown_and_blank_fields() {
        let cases = vec![
            ("createTask", json!({"title": "Inspect drone"})),
            ("createTask", json!({"title": "  ", "description": "x"})),
            ("createTask", json!({"title": "Inspect drone", "description": " "})),
            ("assignUser", json!({"taskId": "t1"})),
            ("search", json!({"query": "x", "limit": 5})),
            ("openPage", json!({"route": "tasks"})),
            ("summarizeTask", json!("t1")),
            ("launchMissiles", json!({})),
        ];
        for (name, args) in cases {
            assert!(
                matches!(Command::parse(name, &args), Err(VoiceError::Validation(_))),
                "{} {:?} should fail",
                name,
                args
            );
        }
    }

    #[test]
    fn ids_outside_the_safe_alphabet_are_rejected() {
        let cases = vec![
            ("updateTaskStatus", json!({"taskId": "../payments/bank", "status": "completed"})),
            ("summarizeTask", json!({"taskId": "t1?admin=1#"})),
            ("assignUser", json!({"taskId": "t1", "userId": "ana/../root"})),
            ("assignUser", json!({"taskId": "t 1", "userId": "ana"})),
            (
                "createTask",
                json!({"title": "x", "description": "y", "assignees": ["ana", "bo%2F"]}),
            ),
        ];
        for (name, args) in cases {
            assert!(
                matches!(Command::parse(name, &args), Err(VoiceError::Validation(_))),
                "{} {:?} should fail",
                name,
                args
            );
        }

        let ok = Command::parse("assignUser", &json!({"taskId": " task_42-b ", "userId": "ana-1"}))
            .unwrap();
        assert_eq!(
            ok,
            Command::AssignUser(AssignUserArgs {
                task_id: "task_42-b".into(),
                user_id: "ana-1".into()
            })
        );
    }

    #[test]
    fn create_task_trims_and_defaults_assignees() {
        let cmd = Command::parse(
            "createTask",
            &json!({"title": " Recharge D-4 ", "description": "battery low "}),
        )
        .unwrap();
        match cmd {
            Command::CreateTask(a) => {
                assert_eq!(a.title, "Recharge D-4");
                assert_eq!(a.description, "battery low");
                assert!(a.assignees.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn payment_checks_iban_and_amount() {
        let ok = Command::parse(
            "payByBank",
            &json!({"iban": "gb82 west 1234 5698 7654 32", "amount": 12.5}),
        )
        .unwrap();
        match ok {
            Command::PayByBank(a) => assert_eq!(a.iban, "GB82WEST12345698765432"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(Command::parse(
            "payByBank",
            &json!({"iban": "GB83WEST12345698765432", "amount": 12.5})
        )
        .is_err());
        assert!(Command::parse(
            "payByBank",
            &json!({"iban": "GB82WEST12345698765432", "amount": -1})
        )
        .is_err());
    }

    #[test]
    fn tool_definitions_cover_every_command() {
        let tools = tool_definitions();
        assert_eq!(tools.len(), 8);
        assert!(tools.iter().all(|t| t["type"] == "function"));
        let update = CommandKind::UpdateTaskStatus.tool_definition();
        assert_eq!(update["parameters"]["properties"]["status"]["enum"][4], "on_hold");
    }
}
