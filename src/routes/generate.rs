//! The question-answering orchestrator.
//!
//! One request is one turn: resolve history, make sure a conversation row
//! exists, run the agent under the request timeout, persist the turn, and
//! hand the ids back to the client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use crate::agents::{self, Agent};
use crate::auth::AuthUser;
use crate::models::{history_to_turns, AppState, GenerateRequest, GenerateResponse};
use crate::tools::{PatientRecordsTool, Tool};
use crate::types::{AppError, AppResult, ChatTurn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .with_state(state)
}

/// Request-scoped tools bound on top of knowledge-base search. Record
/// extraction is only offered when a records database is configured, and is
/// pinned to the caller's identity.
fn request_tools(state: &AppState, user: &AuthUser) -> Vec<Arc<dyn Tool>> {
    match &state.records {
        Some(records) => {
            vec![Arc::new(PatientRecordsTool::new(records.clone(), &user.user_id))]
        }
        None => Vec::new(),
    }
}

async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let agent = agents::build_agent(&state, request_tools(&state, &user)).await?;
    let response = run_generate(&state, &user.user_id, request, agent.as_ref()).await?;
    Ok(Json(response))
}

/// Resolve the history for this turn: inline history wins, otherwise the
/// stored conversation is replayed in chronological order.
async fn resolve_history(
    state: &AppState,
    request: &GenerateRequest,
) -> AppResult<Vec<ChatTurn>> {
    if let Some(items) = &request.chat_history {
        return Ok(history_to_turns(items));
    }
    let Some(convo_id) = &request.convo_id else {
        return Ok(Vec::new());
    };
    let mut turns = Vec::new();
    for stored in state.store.get_conversation(convo_id).await? {
        if let Some(question) = stored.question.filter(|q| !q.is_empty()) {
            turns.push(ChatTurn::human(question));
        }
        if let Some(answer) = stored.answer {
            turns.push(ChatTurn::assistant(answer));
        }
    }
    Ok(turns)
}

pub async fn run_generate(
    state: &AppState,
    user_id: &str,
    request: GenerateRequest,
    agent: &dyn Agent,
) -> AppResult<GenerateResponse> {
    let started = Instant::now();

    let history = resolve_history(state, &request).await?;
    let convo_id = match &request.convo_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => state.store.insert_conversation(user_id, &request.input).await?,
    };

    let budget = Duration::from_secs(state.config.agent.request_timeout_secs);
    let (answer, context) = tokio::time::timeout(budget, agent.answer(&request.input, &history))
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "generation exceeded {}s, please retry",
                state.config.agent.request_timeout_secs
            ))
        })?;

    let response_time = started.elapsed().as_secs_f64();
    let query_id = state
        .store
        .insert_query(&convo_id, &request.input, &answer, &context, response_time, user_id)
        .await?;

    info!(convo_id, query_id, response_time, "generated answer");
    Ok(GenerateResponse { response: answer, query_id, convo_id })
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use crate::auth::Identity;
    use crate::config::{
        AgentConfig, AuthConfig, Config, DatabaseConfig, IngestConfig, LlmConfig, ServerConfig,
        StorageConfig, VectorStoreConfig,
    };
    use crate::db::store::memory::MemoryStore;
    use crate::embeddings::vector_store::memory::MemoryVectorStore;
    use crate::storage::s3::memory::MemoryStorage;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    pub fn test_config() -> Config {
        Config {
            server: ServerConfig {
                port: 9000,
                host: "127.0.0.1".to_string(),
                project_name: "lisa".to_string(),
                cors_allowed_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: "postgres://unused".to_string(),
                max_connections: 1,
                min_connections: 0,
                records_url: None,
            },
            llm: LlmConfig {
                model: Some("gpt-4o-mini".to_string()),
                openai_api_key: String::new(),
                bedrock_api_key: String::new(),
                bedrock_region: "us-west-2".to_string(),
                temperature: 0.3,
            },
            vectorstore: VectorStoreConfig {
                collection: "default".to_string(),
                drug_collection: "drugs".to_string(),
                embeddings_model: "text-embedding-3-large".to_string(),
            },
            storage: StorageConfig {
                bucket: "test".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
                access_key_id: None,
                secret_access_key: None,
            },
            auth: AuthConfig { secret: "test-secret".to_string(), token_ttl_secs: 3600 },
            agent: AgentConfig {
                tool_models: vec!["gpt-4o-mini".to_string()],
                pipeline_models: vec!["meta.llama3-1-70b-instruct-v1:0".to_string()],
                max_tool_rounds: 10,
                request_timeout_secs: 60,
            },
            ingest: IngestConfig { batch_size: 50, batch_timeout_secs: 30 },
        }
    }

    /// AppState over in-memory doubles; the pool is lazy and never touched.
    pub fn test_state(store: Arc<MemoryStore>, vectors: Arc<MemoryVectorStore>) -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .expect("lazy pool");
        let config = test_config();
        let identity = Arc::new(Identity::new(
            pool.clone(),
            &config.auth.secret,
            config.auth.token_ttl_secs,
        ));
        AppState {
            pool,
            config,
            store,
            vectors,
            records: None,
            storage: Arc::new(MemoryStorage::default()),
            identity,
        }
    }
}
