// Conversation history readback.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::auth::AuthUser;
use crate::models::{AppState, ConversationRequest};
use crate::types::AppResult;

#[derive(serde::Serialize)]
struct TurnOut {
    prompt: Option<String>,
    response: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/conversation", post(conversation))
        .with_state(state)
}

async fn conversation(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<ConversationRequest>,
) -> AppResult<Json<Vec<TurnOut>>> {
    let turns = state
        .store
        .get_conversation(&request.conversation_id)
        .await?
        .into_iter()
        .map(|t| TurnOut {
            prompt: t.question,
            response: t.answer,
            created_at: t.created_at,
        })
        .collect();
    Ok(Json(turns))
}
