// Prompt configuration: the latest stored row drives agent construction.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::auth::AuthUser;
use crate::models::{AppState, PromptConfig};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/prompts", post(set_prompt).get(get_prompt))
        .with_state(state)
}

async fn set_prompt(
    State(state): State<AppState>,
    user: AuthUser,
    Json(prompt): Json<PromptConfig>,
) -> AppResult<Json<String>> {
    user.require_admin()?;
    let id = state.store.insert_prompt(&prompt).await?;
    Ok(Json(id))
}

async fn get_prompt(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<Option<PromptConfig>>> {
    Ok(Json(state.store.latest_prompt().await?))
}
