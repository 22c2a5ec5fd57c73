//! Routing table from command kind to handler.
//!
//! `execute` validates first and never hands an invalid command to a handler.
//! Every failure (validation, handler error, handler panic) comes back as a
//! `CommandResult` with `ok: false`; nothing escapes the dispatcher boundary.

use crate::backend::{Navigator, OpsBackend};
use crate::command::{Command, CommandKind};
use crate::error::VoiceResult;
use crate::handlers;
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one command, reported back to the assistant and the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// JSON text for a `function_call_output` item.
    pub fn to_output(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"ok\":{},\"message\":\"\"}}", self.ok)
        })
    }
}

/// Per-dispatch context.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Recorded as the creator of anything voice creates.
    pub operator_id: String,
}

impl CommandContext {
    pub fn new(operator_id: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
        }
    }
}

/// Side-effecting implementation for one command kind.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn kind(&self) -> CommandKind;

    async fn handle(&self, command: Command, ctx: &CommandContext) -> VoiceResult<CommandResult>;
}

/// Read-only after construction; share it behind an `Arc`.
#[derive(Default)]
pub struct CommandDispatcher {
    handlers: HashMap<CommandKind, Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for its kind.
    pub fn register(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    /// Table with a handler for every command kind.
    pub fn with_default_handlers(
        backend: Arc<dyn OpsBackend>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        handlers::default_handlers(backend, navigator)
            .into_iter()
            .fold(Self::new(), |dispatcher, handler| dispatcher.register(handler))
    }

    pub fn has_handler(&self, kind: CommandKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Validate `arguments` for `name`, then dispatch.
    pub async fn execute(&self, name: &str, arguments: &Value, ctx: &CommandContext) -> CommandResult {
        match Command::parse(name, arguments) {
            Ok(command) => self.dispatch(command, ctx).await,
            Err(e) => {
                warn!("🚫 Rejected command '{}': {}", name, e);
                CommandResult::failure(e.to_string())
            }
        }
    }

    /// Run an already validated command.
    pub async fn dispatch(&self, command: Command, ctx: &CommandContext) -> CommandResult {
        let kind = command.kind();
        let Some(handler) = self.handlers.get(&kind) else {
            warn!("No handler registered for '{}'", kind.name());
            return CommandResult::failure(format!("{} is not available", kind.name()));
        };

        info!("⚙️ Dispatching {}", kind.name());
        match AssertUnwindSafe(handler.handle(command, ctx))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => {
                info!(ok = result.ok, "{} -> {}", kind.name(), result.message);
                result
            }
            Ok(Err(e)) => {
                warn!("{} failed: {}", kind.name(), e);
                CommandResult::failure(format!("{} failed: {}", kind.name(), e))
            }
            Err(_) => {
                warn!("{} handler panicked", kind.name());
                CommandResult::failure(format!("{} failed unexpectedly", kind.name()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoiceError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        kind: CommandKind,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandHandler for CountingHandler {
        fn kind(&self) -> CommandKind {
            self.kind
        }

        async fn handle(&self, _command: Command, _ctx: &CommandContext) -> VoiceResult<CommandResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CommandResult::success("done"))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl CommandHandler for FailingHandler {
        fn kind(&self) -> CommandKind {
            CommandKind::Search
        }

        async fn handle(&self, _command: Command, _ctx: &CommandContext) -> VoiceResult<CommandResult> {
            Err(VoiceError::Handler("index offline".into()))
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl CommandHandler for PanickingHandler {
        fn kind(&self) -> CommandKind {
            CommandKind::Translate
        }

        async fn handle(&self, _command: Command, _ctx: &CommandContext) -> VoiceResult<CommandResult> {
            panic!("boom")
        }
    }

    fn ctx() -> CommandContext {
        CommandContext::new("tester")
    }

    #[tokio::test]
    async fn invalid_commands_never_reach_handlers() {
        let handler = Arc::new(CountingHandler {
            kind: CommandKind::UpdateTaskStatus,
            calls: AtomicUsize::new(0),
        });
        let dispatcher = CommandDispatcher::new().register(handler.clone());

        for args in [
            json!({"taskId": "t1"}),
            json!({"taskId": "t1", "status": "finished"}),
            json!({"status": "completed"}),
            json!("t1 completed"),
        ] {
            let result = dispatcher.execute("updateTaskStatus", &args, &ctx()).await;
            assert!(!result.ok);
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);

        let ok = dispatcher
            .execute(
                "updateTaskStatus",
                &json!({"taskId": "t1", "status": "completed"}),
                &ctx(),
            )
            .await;
        assert!(ok.ok);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_errors_and_panics_are_normalized() {
        let dispatcher = CommandDispatcher::new()
            .register(Arc::new(FailingHandler))
            .register(Arc::new(PanickingHandler));

        let failed = dispatcher
            .execute("search", &json!({"query": "drones"}), &ctx())
            .await;
        assert!(!failed.ok);
        assert!(failed.message.contains("index offline"));

        let panicked = dispatcher
            .execute("translate", &json!({"text": "hi", "targetLang": "bg"}), &ctx())
            .await;
        assert!(!panicked.ok);

        let missing = dispatcher
            .execute("summarizeTask", &json!({"taskId": "t9"}), &ctx())
            .await;
        assert!(!missing.ok);
    }

    #[test]
    fn result_serializes_without_empty_data() {
        let result = CommandResult::success("Opened /tasks");
        assert_eq!(result.to_output(), r#"{"ok":true,"message":"Opened /tasks"}"#);
        let with_data = CommandResult::success("x").with_data(json!({"id": "t1"}));
        assert!(with_data.to_output().contains("\"data\""));
    }
}
