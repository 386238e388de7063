//! HTTP client for the OpenAI Assistants (threads) API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::assistant::{AssistantError, AssistantService, Run, RunStatus};
use crate::config::AppConfig;

const BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    thread_id: String,
    status: RunStatus,
    #[serde(default)]
    last_error: Option<RunError>,
    #[serde(default)]
    incomplete_details: Option<IncompleteDetails>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IncompleteDetails {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct OpenAiAssistant {
    client: Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
    poll_interval: Duration,
}

impl OpenAiAssistant {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        assistant_id: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            assistant_id: assistant_id.into(),
            poll_interval,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AssistantError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.assistant_id.clone(),
            config.poll_interval,
        )
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER.0, BETA_HEADER.1)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER.0, BETA_HEADER.1)
    }

    async fn fetch_run(&self, thread_id: &str, run_id: &str) -> Result<RunObject, AssistantError> {
        let response = self
            .get(&format!("/threads/{thread_id}/runs/{run_id}"))
            .send()
            .await?;
        parse(response).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) {
        let result = self
            .post(&format!("/threads/{thread_id}/runs/{run_id}/cancel"))
            .send()
            .await
            .map_err(AssistantError::from);
        let result = match result {
            Ok(response) => parse::<RunObject>(response).await.map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => debug!(thread_id, run_id, "cancelled assistant run"),
            Err(e) => warn!(thread_id, run_id, error = %e, "failed to cancel assistant run"),
        }
    }
}

#[async_trait]
impl AssistantService for OpenAiAssistant {
    async fn create_thread(&self) -> Result<String, AssistantError> {
        let response = self.post("/threads").json(&json!({})).send().await?;
        let thread: ThreadObject = parse(response).await?;
        Ok(thread.id)
    }

    async fn append_user_message(
        &self,
        thread_id: &str,
        text: &str,
    ) -> Result<(), AssistantError> {
        let response = self
            .post(&format!("/threads/{thread_id}/messages"))
            .json(&json!({ "role": "user", "content": text }))
            .send()
            .await?;
        parse::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn run_to_completion(
        &self,
        thread_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Run, AssistantError> {
        let response = self
            .post(&format!("/threads/{thread_id}/runs"))
            .json(&json!({ "assistant_id": self.assistant_id }))
            .send()
            .await?;
        let mut run: RunObject = parse(response).await?;
        debug!(thread_id, run_id = %run.id, "started assistant run");

        while !run.status.is_terminal() {
            let polled = tokio::select! {
                _ = cancel.cancelled() => None,
                polled = async {
                    tokio::time::sleep(self.poll_interval).await;
                    self.fetch_run(thread_id, &run.id).await
                } => Some(polled),
            };
            match polled {
                Some(polled) => run = polled?,
                None => {
                    self.cancel_run(thread_id, &run.id).await;
                    return Err(AssistantError::Cancelled);
                }
            }
        }

        match run.status {
            RunStatus::Completed => Ok(Run {
                id: run.id,
                thread_id: run.thread_id,
                status: run.status,
            }),
            status => Err(AssistantError::RunFailed {
                last_error: run
                    .last_error
                    .map(|e| e.message)
                    .or_else(|| run.incomplete_details.and_then(|d| d.reason)),
                run_id: run.id,
                status,
            }),
        }
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<String, AssistantError> {
        let response = self
            .get(&format!("/threads/{thread_id}/messages"))
            .query(&[("order", "desc"), ("limit", "1")])
            .send()
            .await?;
        let list: MessageList = parse(response).await?;

        let newest = list
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AssistantError::Malformed("thread has no messages".into()))?;

        match newest.content.into_iter().next() {
            Some(MessageContent::Text { text }) => Ok(text.value),
            Some(MessageContent::Other) => Err(AssistantError::Malformed(
                "newest message has no text content".into(),
            )),
            None => Err(AssistantError::Malformed("newest message is empty".into())),
        }
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, AssistantError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        return Err(AssistantError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| AssistantError::Malformed(e.to_string()))
}
