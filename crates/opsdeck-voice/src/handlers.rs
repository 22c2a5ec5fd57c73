//! Default command handlers backed by `OpsBackend` and `Navigator`.

use crate::backend::{NavigationRequest, Navigator, OpsBackend};
use crate::command::{Command, CommandKind};
use crate::dispatcher::{CommandContext, CommandHandler, CommandResult};
use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub fn default_handlers(
    backend: Arc<dyn OpsBackend>,
    navigator: Arc<dyn Navigator>,
) -> Vec<Arc<dyn CommandHandler>> {
    vec![
        Arc::new(NavigateHandler {
            kind: CommandKind::OpenPage,
            navigator: Arc::clone(&navigator),
        }),
        Arc::new(NavigateHandler {
            kind: CommandKind::Search,
            navigator,
        }),
        Arc::new(TaskHandler {
            kind: CommandKind::CreateTask,
            backend: Arc::clone(&backend),
        }),
        Arc::new(TaskHandler {
            kind: CommandKind::UpdateTaskStatus,
            backend: Arc::clone(&backend),
        }),
        Arc::new(TaskHandler {
            kind: CommandKind::AssignUser,
            backend: Arc::clone(&backend),
        }),
        Arc::new(TaskHandler {
            kind: CommandKind::SummarizeTask,
            backend: Arc::clone(&backend),
        }),
        Arc::new(TranslateHandler {
            backend: Arc::clone(&backend),
        }),
        Arc::new(PaymentHandler { backend }),
    ]
}

fn mismatch(kind: CommandKind, command: &Command) -> VoiceError {
    VoiceError::Handler(format!(
        "{} handler received {}",
        kind.name(),
        command.kind().name()
    ))
}

/// `openPage` and `search`.
struct NavigateHandler {
    kind: CommandKind,
    navigator: Arc<dyn Navigator>,
}

#[async_trait]
impl CommandHandler for NavigateHandler {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    async fn handle(&self, command: Command, _ctx: &CommandContext) -> VoiceResult<CommandResult> {
        let (request, message) = match command {
            Command::OpenPage(args) => {
                let message = format!("Opening {}", args.route);
                (NavigationRequest::OpenPage { route: args.route }, message)
            }
            Command::Search(args) => {
                let message = format!("Searching for {}", args.query);
                (NavigationRequest::Search { query: args.query }, message)
            }
            other => return Err(mismatch(self.kind, &other)),
        };
        self.navigator.navigate(request).await?;
        Ok(CommandResult::success(message))
    }
}

/// Task mutations and summaries.
struct TaskHandler {
    kind: CommandKind,
    backend: Arc<dyn OpsBackend>,
}

#[async_trait]
impl CommandHandler for TaskHandler {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    async fn handle(&self, command: Command, ctx: &CommandContext) -> VoiceResult<CommandResult> {
        match command {
            Command::CreateTask(args) => {
                let task = self
                    .backend
                    .create_task_record(&args.title, &args.description, &ctx.operator_id)
                    .await?;
                let mut unassigned = Vec::new();
                for user in &args.assignees {
                    if self.backend.assign_user(&task.id, user).await.is_err() {
                        unassigned.push(user.as_str());
                    }
                }
                let message = if unassigned.is_empty() {
                    format!("Created task {}", task.title)
                } else {
                    format!(
                        "Created task {}, but could not assign {}",
                        task.title,
                        unassigned.join(", ")
                    )
                };
                let data = json!({ "taskId": task.id, "unassigned": unassigned });
                Ok(CommandResult::success(message).with_data(data))
            }
            Command::UpdateTaskStatus(args) => {
                self.backend
                    .update_task_status(&args.task_id, args.status)
                    .await?;
                Ok(CommandResult::success(format!(
                    "Task {} is now {}",
                    args.task_id,
                    args.status.as_str().replace('_', " ")
                )))
            }
            Command::AssignUser(args) => {
                self.backend.assign_user(&args.task_id, &args.user_id).await?;
                Ok(CommandResult::success(format!(
                    "Assigned {} to task {}",
                    args.user_id, args.task_id
                )))
            }
            Command::SummarizeTask(args) => {
                let summary = self.backend.fetch_task_summary(&args.task_id).await?;
                let data = serde_json::to_value(&summary)
                    .map_err(|e| VoiceError::Handler(e.to_string()))?;
                Ok(CommandResult::success(summary.spoken()).with_data(data))
            }
            other => Err(mismatch(self.kind, &other)),
        }
    }
}

struct TranslateHandler {
    backend: Arc<dyn OpsBackend>,
}

#[async_trait]
impl CommandHandler for TranslateHandler {
    fn kind(&self) -> CommandKind {
        CommandKind::Translate
    }

    async fn handle(&self, command: Command, _ctx: &CommandContext) -> VoiceResult<CommandResult> {
        let args = match command {
            Command::Translate(args) => args,
            other => return Err(mismatch(CommandKind::Translate, &other)),
        };
        let translated = self
            .backend
            .translate_text(&args.text, args.target_lang)
            .await?;
        if translated.trim().is_empty() {
            return Ok(CommandResult::failure("Translation came back empty"));
        }
        Ok(CommandResult::success(translated.clone())
            .with_data(json!({ "targetLang": args.target_lang, "text": translated })))
    }
}

struct PaymentHandler {
    backend: Arc<dyn OpsBackend>,
}

#[async_trait]
impl CommandHandler for PaymentHandler {
    fn kind(&self) -> CommandKind {
        CommandKind::PayByBank
    }

    async fn handle(&self, command: Command, _ctx: &CommandContext) -> VoiceResult<CommandResult> {
        let args = match command {
            Command::PayByBank(args) => args,
            other => return Err(mismatch(CommandKind::PayByBank, &other)),
        };
        let receipt = self
            .backend
            .initiate_bank_payment(&args.iban, args.amount, args.comment.as_deref())
            .await?;
        Ok(CommandResult::success(format!(
            "Bank transfer of {:.2} to account ending {} prepared",
            args.amount,
            iban_suffix(&args.iban)
        ))
        .with_data(json!({ "reference": receipt.reference, "status": receipt.status })))
    }
}

/// Last four characters, which is all that gets read aloud.
fn iban_suffix(iban: &str) -> &str {
    let start = iban.len().saturating_sub(4);
    &iban[start..]
}
