// LISA backend - retrieval-augmented question answering for clinical teams

pub mod agents;
pub mod auth;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod records;
pub mod routes;
pub mod storage;
pub mod tools;
pub mod treatment;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
