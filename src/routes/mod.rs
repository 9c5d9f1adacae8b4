//! HTTP surface.
//!
//! Endpoints:
//! - `/` banner, `/health` liveness
//! - `/generate`, `/rating`, `/conversation` - question answering
//! - `/create_knowledge_base`, `/list-files`, `/delete-file`,
//!   `/file-active-toggle` - document management
//! - `/prompts` - prompt configuration
//! - `/signup`, `/login`, `/change_role`, `/delete_user` - accounts
//! - `/treatment-plan` - plan document generation

pub mod auth;
pub mod conversation;
pub mod files;
pub mod generate;
pub mod health;
pub mod home;
pub mod knowledge_base;
pub mod prompts;
pub mod rating;
pub mod treatment_plan;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer.allow_origin(parsed)
    }
}

pub fn create_router(state: AppState) -> Router {
    info!("creating application router");
    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(home::router(state.clone()))
        .merge(health::router(state.clone()))
        .merge(generate::router(state.clone()))
        .merge(rating::router(state.clone()))
        .merge(conversation::router(state.clone()))
        .merge(knowledge_base::router(state.clone()))
        .merge(files::router(state.clone()))
        .merge(prompts::router(state.clone()))
        .merge(auth::router(state.clone()))
        .merge(treatment_plan::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
