use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::services::agent;
use crate::state::AppState;

/// Shown when the turn itself failed (model down, runaway tool loop). The
/// session is left consistent, so trying again is safe.
const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble right now. Please try again in a moment.";

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    let message = payload.message.trim().to_string();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "message must not be empty"})),
        )
            .into_response();
    }

    let session_id = payload
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::info!(session = %session_id, message = %message, "incoming chat message");

    match agent::handle_user_message(&state, &session_id, &message).await {
        Ok(reply) => Json(ChatResponse { session_id, reply }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, session = %session_id, "conversation turn failed");
            Json(ChatResponse {
                session_id,
                reply: FALLBACK_REPLY.to_string(),
            })
            .into_response()
        }
    }
}
