use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::db;
use crate::models::AppState;

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    timestamp: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match db::pool::health_check(&state.pool).await {
        Ok(_) => "connected",
        Err(_) => "unreachable",
    };
    Json(HealthResponse {
        status: "ok",
        database,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
