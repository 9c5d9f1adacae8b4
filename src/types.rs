// Shared type definitions: error taxonomy and chat history items.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A single prior turn of a conversation, as seen by an agent.
///
/// Inbound history arrives as loosely shaped `{prompt, response}` pairs;
/// they are normalized into this sum type before reaching any agent, and
/// malformed entries are skipped deterministically.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Human,
    Assistant,
}

impl ChatTurn {
    pub fn human(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Human, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: TurnRole::Assistant, content: content.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::InvalidRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            // Retryable: the agent loop exceeded its request budget.
            AppError::Timeout(m) => (StatusCode::GATEWAY_TIMEOUT, m.clone()),
            AppError::Config(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            // Ingestion and file management are an admin surface; the
            // underlying error string is acceptable there.
            AppError::Ingest(m) | AppError::Storage(m) => {
                (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
            }
            // Never leak internals from the agent/persistence path.
            AppError::Database(_) | AppError::LlmApi(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, message).into_response()
    }
}
