// Document record management: listing, deletion, active toggling.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::auth::AuthUser;
use crate::models::{ActiveFileRequest, AppState, DeleteFileRequest, FileRecord};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/list-files", get(list_files))
        .route("/delete-file", post(delete_file))
        .route("/file-active-toggle", post(toggle_active))
        .with_state(state)
}

async fn list_files(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<Vec<FileRecord>>> {
    Ok(Json(state.store.get_files().await?))
}

/// Deleting a file removes its record, its blob, and its embeddings, so it
/// can never surface in retrieval again.
async fn delete_file(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<DeleteFileRequest>,
) -> AppResult<Json<&'static str>> {
    state.store.delete_file(&request.file_name).await?;
    state.storage.delete(&request.file_name).await?;
    state.vectors.delete_by_source(&request.file_name).await?;
    info!(file_name = %request.file_name, user = %user.user_id, "deleted file");
    Ok(Json("File deleted"))
}

async fn toggle_active(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<ActiveFileRequest>,
) -> AppResult<Json<&'static str>> {
    state
        .store
        .toggle_file_active(&request.file_name, request.active)
        .await?;
    Ok(Json("File updated"))
}
