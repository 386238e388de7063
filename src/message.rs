// src/message.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    pub thread_id: Option<String>,
    pub message: Option<String>,
}

impl ChatRequest {
    /// Returns `(thread_id, message)` when both are present and non-empty.
    pub fn fields(&self) -> Option<(&str, &str)> {
        let thread_id = self.thread_id.as_deref().filter(|s| !s.is_empty())?;
        let message = self.message.as_deref().filter(|s| !s.is_empty())?;
        Some((thread_id, message))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub thread_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
