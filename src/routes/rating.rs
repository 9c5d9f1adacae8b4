// Rating and review updates for answered queries.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::auth::AuthUser;
use crate::models::{AppState, RatingRequest};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rating", post(rate))
        .with_state(state)
}

async fn rate(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<RatingRequest>,
) -> AppResult<Json<&'static str>> {
    let query_id = request
        .query_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("query_id is required".to_string()))?;

    state
        .store
        .insert_review_and_rating(query_id, request.rating, request.review.as_deref())
        .await?;
    Ok(Json("Rating recorded"))
}
