use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::AppError,
    message::{ChatRequest, ChatResponse, StartResponse},
    services::relay::RelayOutcome,
    state::SharedState,
};

pub const MISSING_FIELDS: &str = "Missing thread_id or message";

pub async fn start_handler(
    State(state): State<SharedState>,
) -> Result<Json<StartResponse>, AppError> {
    match state.assistant.create_thread().await {
        Ok(thread_id) => {
            info!(%thread_id, "created thread");
            Ok(Json(StartResponse { thread_id }))
        }
        Err(e) => {
            error!(error = %e, "error creating thread");
            Err(AppError::ThreadCreation(e.to_string()))
        }
    }
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    // An unreadable body is indistinguishable from an empty one.
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let Some((thread_id, message)) = payload.fields() else {
        return Err(AppError::BadRequest(MISSING_FIELDS.to_string()));
    };

    let request_id = Uuid::new_v4();
    info!(%request_id, thread_id, message_len = message.len(), "received chat message");

    match state.relay.relay(thread_id, message).await {
        Ok(outcome) => {
            if outcome == RelayOutcome::StillProcessing {
                info!(%request_id, thread_id, "answered with still-processing placeholder");
            }
            Ok(Json(ChatResponse {
                response: outcome.into_text(),
            }))
        }
        Err(e) => {
            error!(%request_id, thread_id, error = %e, "error in /chat endpoint");
            Err(AppError::ChatFailed(e.to_string()))
        }
    }
}
