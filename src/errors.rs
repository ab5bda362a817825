use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Failures inside a tool handler. Never surfaced to the HTTP caller:
/// the orchestrator serializes them into a tool-result turn so the model
/// can recover conversationally.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown business info category: {0}")]
    NotFound(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("time slot {time} on {date} is not available")]
    SlotUnavailable { date: String, time: String },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "not_found",
            ToolError::InvalidDate(_) => "invalid_date",
            ToolError::UnknownService(_) => "unknown_service",
            ToolError::SlotUnavailable { .. } => "slot_unavailable",
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::InvalidArguments(_) => "invalid_arguments",
            ToolError::Internal(_) => "internal",
        }
    }

    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        })
    }
}

/// Failures that abort the current turn or request.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("tool loop exceeded {0} iterations without a final reply")]
    ToolLoopExceeded(usize),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::ModelUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::ToolLoopExceeded(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
