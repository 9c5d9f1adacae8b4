use std::sync::Arc;

use crate::auth::Identity;
use crate::config::Config;
use crate::db::ConversationStore;
use crate::embeddings::VectorStore;
use crate::records::RecordStore;
use crate::storage::BlobStorage;
use crate::types::{ChatTurn, TurnRole};

/// Shared per-process state injected into every handler.
///
/// Every external collaborator sits behind a trait object so handlers and
/// tests can swap implementations; nothing here is a hidden singleton.
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: Config,
    pub store: Arc<dyn ConversationStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub records: Option<Arc<dyn RecordStore>>,
    pub storage: Arc<dyn BlobStorage>,
    pub identity: Arc<Identity>,
}

// Row models. FromRow is needed for runtime query_as (the crate builds
// without DATABASE_URL at compile time).

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: uuid::Uuid,
    pub user_id: String,
    pub first_question: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct QueryRecord {
    pub id: uuid::Uuid,
    pub convo_id: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub response_time: Option<f64>,
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct FileRecord {
    pub file_name: String,
    pub url: String,
    pub user_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub active: bool,
}

/// Prompt configuration, singleton-per-deployment; the latest row wins.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct PromptConfig {
    pub llm_model: Option<String>,
    pub persona: Option<String>,
    pub glossary: Option<String>,
    pub tone: Option<String>,
    pub response_length: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: uuid::Uuid,
    pub name: Option<String>,
    pub email: String,
    pub role: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// API request/response types.

/// One `{prompt, response}` pair from the client's inline history.
/// Entries missing both fields are skipped rather than rejected.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct HistoryItem {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct GenerateRequest {
    pub input: String,
    #[serde(default)]
    pub chat_history: Option<Vec<HistoryItem>>,
    #[serde(default)]
    pub convo_id: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct GenerateResponse {
    pub response: String,
    pub query_id: String,
    pub convo_id: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct RatingRequest {
    pub query_id: Option<String>,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub review: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ConversationRequest {
    pub conversation_id: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct DeleteFileRequest {
    pub file_name: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct ActiveFileRequest {
    pub file_name: String,
    pub active: bool,
}

#[derive(Debug, serde::Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, serde::Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub role: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct ChangeRoleRequest {
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct DeleteUserRequest {
    pub user_id: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct TreatmentPlanRequest {
    pub patient_id: String,
    pub doctor_name: String,
    pub doctor_id: String,
    pub organization_id: String,
    pub reference_number: String,
    pub language: Option<String>,
}

/// Convert inbound `{prompt, response}` pairs into ordered chat turns,
/// skipping malformed entries.
pub fn history_to_turns(history: &[HistoryItem]) -> Vec<ChatTurn> {
    let mut turns = Vec::new();
    for item in history {
        if let Some(prompt) = item.prompt.as_deref().filter(|p| !p.is_empty()) {
            turns.push(ChatTurn { role: TurnRole::Human, content: prompt.to_string() });
        }
        if let Some(response) = &item.response {
            turns.push(ChatTurn { role: TurnRole::Assistant, content: response.clone() });
        }
    }
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_conversion_alternates_roles() {
        let items = vec![
            HistoryItem { prompt: Some("q1".into()), response: Some("a1".into()) },
            HistoryItem { prompt: Some("q2".into()), response: None },
        ];
        let turns = history_to_turns(&items);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0], ChatTurn::human("q1"));
        assert_eq!(turns[1], ChatTurn::assistant("a1"));
        assert_eq!(turns[2], ChatTurn::human("q2"));
    }

    #[test]
    fn malformed_history_entries_are_skipped() {
        let items = vec![
            HistoryItem::default(),
            HistoryItem { prompt: Some(String::new()), response: None },
            HistoryItem { prompt: Some("q".into()), response: None },
        ];
        let turns = history_to_turns(&items);
        assert_eq!(turns, vec![ChatTurn::human("q")]);
    }
}
