//! Knowledge-base creation from uploaded documents.
//!
//! Each uploaded file is pushed to blob storage first, recorded in the file
//! registry, then ingested into the vector store. A failed ingestion aborts
//! that file's remaining batches but keeps what was already committed.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use crate::auth::AuthUser;
use crate::db::NewFile;
use crate::ingest::{Ingestor, LopdfConverter};
use crate::models::AppState;
use crate::types::{AppError, AppResult};

#[derive(serde::Serialize)]
struct IngestedFile {
    filename: String,
    url: String,
    chunks: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/create_knowledge_base", post(create_knowledge_base))
        .with_state(state)
}

async fn create_knowledge_base(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<Json<Vec<IngestedFile>>> {
    let ingestor = Ingestor::new(
        state.vectors.clone(),
        state.storage.clone(),
        Arc::new(LopdfConverter),
        state.config.vectorstore.clone(),
        &state.config.ingest,
    );

    let mut results = Vec::new();
    let mut collection: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("bad multipart body: {e}")))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            // A bare "collection" text field overrides routing for the
            // files that follow it.
            if field.name() == Some("collection") {
                let value = field.text().await.map_err(|e| {
                    AppError::InvalidRequest(format!("bad collection field: {e}"))
                })?;
                if !value.trim().is_empty() {
                    collection = Some(value.trim().to_string());
                }
            }
            continue;
        };
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("failed reading {file_name}: {e}")))?;

        let url = state.storage.upload(&file_name, &bytes, &content_type).await?;
        state
            .store
            .add_files(
                &[NewFile { file_name: file_name.clone(), url: url.clone() }],
                &user.user_id,
            )
            .await?;

        let chunks = ingestor
            .ingest_file(&file_name, &bytes, &url, collection.as_deref())
            .await?;
        info!(file_name, chunks, "file ingested");
        results.push(IngestedFile { filename: file_name, url, chunks });
    }

    if results.is_empty() {
        return Err(AppError::InvalidRequest("no files in upload".to_string()));
    }
    Ok(Json(results))
}
