use axum::extract::State;
use axum::routing::get;
use axum::Router;

use crate::models::AppState;

pub fn router(state: AppState) -> Router {
    Router::new().route("/", get(home)).with_state(state)
}

async fn home(State(state): State<AppState>) -> String {
    format!("{} backend is running", state.config.server.project_name)
}
