//! Narrow capability interfaces the command handlers call into.
//!
//! `OpsBackend` is the only way voice input reaches the dashboard's task/payment
//! store; `Navigator` is the only way it moves the UI.

use crate::command::{TargetLang, TaskStatus};
use crate::config::BackendConfig;
use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Task as returned by the dashboard after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TaskSummary {
    /// One or two sentences suitable for reading aloud.
    pub fn spoken(&self) -> String {
        let mut text = format!(
            "{} is {}, created {}.",
            self.title,
            self.status.replace('_', " "),
            self.created_at.format("%B %-d")
        );
        let description = self.description.trim();
        if !description.is_empty() {
            text.push(' ');
            text.push_str(description);
        }
        text
    }
}

/// Reference returned when a bank transfer has been prepared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub reference: String,
    #[serde(default)]
    pub status: String,
}

/// Dashboard capabilities consumed by the command handlers.
#[async_trait]
pub trait OpsBackend: Send + Sync {
    async fn create_task_record(
        &self,
        title: &str,
        description: &str,
        created_by: &str,
    ) -> VoiceResult<TaskRecord>;

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> VoiceResult<()>;

    async fn assign_user(&self, task_id: &str, user_id: &str) -> VoiceResult<()>;

    async fn fetch_task_summary(&self, task_id: &str) -> VoiceResult<TaskSummary>;

    async fn translate_text(&self, text: &str, target: TargetLang) -> VoiceResult<String>;

    async fn initiate_bank_payment(
        &self,
        iban: &str,
        amount: f64,
        comment: Option<&str>,
    ) -> VoiceResult<PaymentReceipt>;
}

/// UI navigation requested by voice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationRequest {
    OpenPage { route: String },
    Search { query: String },
}

#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, request: NavigationRequest) -> VoiceResult<()>;
}

/// Forwards navigation to whoever hosts the UI.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<NavigationRequest>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NavigationRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Navigator for ChannelNavigator {
    async fn navigate(&self, request: NavigationRequest) -> VoiceResult<()> {
        debug!(?request, "navigation requested");
        self.tx
            .send(request)
            .map_err(|_| VoiceError::Handler("no UI is listening for navigation".to_string()))
    }
}

/// REST client for the dashboard API.
pub struct HttpOpsBackend {
    client: Client,
    base_url: Url,
    api_token: String,
}

impl HttpOpsBackend {
    pub fn new(config: &BackendConfig) -> VoiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| VoiceError::Config(format!("HTTP client: {}", e)))?;
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|e| VoiceError::Config(format!("backend base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(VoiceError::Config(format!(
                "backend base URL cannot carry a path: {}",
                base_url
            )));
        }
        info!("🗂️ Dashboard backend: {}", base_url);
        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    /// Append `segments` to the base path, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> VoiceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| VoiceError::Config("backend base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_token)
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> VoiceResult<reqwest::Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| VoiceError::Handler(format!("dashboard request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Handler(format!(
                "dashboard returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response)
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> VoiceResult<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| VoiceError::Handler(format!("unexpected dashboard response: {}", e)))
    }
}

#[derive(Deserialize)]
struct TranslationResponse {
    text: String,
}

#[async_trait]
impl OpsBackend for HttpOpsBackend {
    async fn create_task_record(
        &self,
        title: &str,
        description: &str,
        created_by: &str,
    ) -> VoiceResult<TaskRecord> {
        let body = json!({
            "title": title,
            "description": description,
            "createdBy": created_by,
            "status": TaskStatus::Pending,
        });
        self.send_json(self.client.post(self.url(&["tasks"])?).json(&body))
            .await
    }

    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> VoiceResult<()> {
        let url = self.url(&["tasks", task_id, "status"])?;
        self.send(self.client.patch(url).json(&json!({ "status": status })))
            .await?;
        Ok(())
    }

    async fn assign_user(&self, task_id: &str, user_id: &str) -> VoiceResult<()> {
        let url = self.url(&["tasks", task_id, "assignees"])?;
        self.send(self.client.post(url).json(&json!({ "userId": user_id })))
            .await?;
        Ok(())
    }

    async fn fetch_task_summary(&self, task_id: &str) -> VoiceResult<TaskSummary> {
        let url = self.url(&["tasks", task_id])?;
        self.send_json(self.client.get(url)).await
    }

    async fn translate_text(&self, text: &str, target: TargetLang) -> VoiceResult<String> {
        let body = json!({ "text": text, "targetLang": target });
        let response: TranslationResponse = self
            .send_json(self.client.post(self.url(&["translate"])?).json(&body))
            .await?;
        Ok(response.text)
    }

    async fn initiate_bank_payment(
        &self,
        iban: &str,
        amount: f64,
        comment: Option<&str>,
    ) -> VoiceResult<PaymentReceipt> {
        let body = json!({ "iban": iban, "amount": amount, "comment": comment });
        self.send_json(self.client.post(self.url(&["payments", "bank"])?).json(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn summary_reads_naturally() {
        let summary = TaskSummary {
            title: "Inspect drone D-4".into(),
            description: "Rotor noise reported.".into(),
            status: "in_progress".into(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
        };
        assert_eq!(
            summary.spoken(),
            "Inspect drone D-4 is in progress, created March 5. Rotor noise reported."
        );
    }

    fn backend(base_url: &str) -> HttpOpsBackend {
        HttpOpsBackend::new(&BackendConfig {
            base_url: base_url.into(),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn urls_are_joined_once() {
        let url = backend("http://localhost:8080/api/").url(&["tasks", "t1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/tasks/t1");
        let url = backend("http://localhost:8080").url(&["translate"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/translate");
    }

    #[test]
    fn ids_stay_inside_their_path_segment() {
        let url = backend("http://localhost:8080/api")
            .url(&["tasks", "a/b?c#d", "status"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/tasks/a%2Fb%3Fc%23d/status"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn unusable_base_url_is_a_config_error() {
        for base_url in ["not a url", "mailto:ops@example.com"] {
            let result = HttpOpsBackend::new(&BackendConfig {
                base_url: base_url.into(),
                ..BackendConfig::default()
            });
            assert!(matches!(result, Err(VoiceError::Config(_))), "{}", base_url);
        }
    }

    #[tokio::test]
    async fn channel_navigator_forwards_requests() {
        let (nav, mut rx) = ChannelNavigator::new();
        nav.navigate(NavigationRequest::OpenPage {
            route: "/tasks".into(),
        })
        .await
        .unwrap();
        assert_eq!(
            rx.recv().await,
            Some(NavigationRequest::OpenPage {
                route: "/tasks".into()
            })
        );
        drop(rx);
        assert!(nav
            .navigate(NavigationRequest::Search { query: "x".into() })
            .await
            .is_err());
    }
}
