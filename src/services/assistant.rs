// src/services/assistant.rs
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("request to assistant service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("assistant service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("run {run_id} ended with status {status}{}", suffix(.last_error))]
    RunFailed {
        run_id: String,
        status: RunStatus,
        last_error: Option<String>,
    },

    #[error("unexpected response from assistant service: {0}")]
    Malformed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("relay task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

fn suffix(last_error: &Option<String>) -> String {
    last_error
        .as_deref()
        .map(|e| format!(": {e}"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A finished assistant run.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
}

/// Remote conversational-assistant provider. Owns all conversation state.
#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn create_thread(&self) -> Result<String, AssistantError>;

    async fn append_user_message(&self, thread_id: &str, text: &str)
    -> Result<(), AssistantError>;

    /// Starts a run on the thread and waits until it completes.
    ///
    /// When `cancel` fires the run is cancelled remotely (best effort) and
    /// [`AssistantError::Cancelled`] is returned.
    async fn run_to_completion(
        &self,
        thread_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Run, AssistantError>;

    /// Text of the newest message in the thread.
    async fn latest_reply(&self, thread_id: &str) -> Result<String, AssistantError>;
}
