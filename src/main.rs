use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lisa_backend::auth::Identity;
use lisa_backend::config::Config;
use lisa_backend::db::{create_pool, PgConversationStore};
use lisa_backend::embeddings::{OpenAiEmbedder, PgVectorStore};
use lisa_backend::records::{PgRecordStore, RecordStore};
use lisa_backend::routes::create_router;
use lisa_backend::storage::S3Store;
use lisa_backend::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lisa_backend=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    let pool = create_pool(&config.database).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    // Optional second database holding clinical records.
    let records: Option<Arc<dyn RecordStore>> = match &config.database.records_url {
        Some(url) => {
            let records_pool = create_pool(&lisa_backend::config::DatabaseConfig {
                url: url.clone(),
                max_connections: config.database.max_connections,
                min_connections: config.database.min_connections,
                records_url: None,
            })
            .await?;
            Some(Arc::new(PgRecordStore::new(records_pool)))
        }
        None => {
            warn!("RECORDS_DATABASE_URL not set; record extraction and treatment plans disabled");
            None
        }
    };

    let embedder = Arc::new(OpenAiEmbedder::new(
        &config.llm.openai_api_key,
        &config.vectorstore.embeddings_model,
    ));
    let identity = Arc::new(Identity::new(
        pool.clone(),
        &config.auth.secret,
        config.auth.token_ttl_secs,
    ));

    let state = AppState {
        pool: pool.clone(),
        store: Arc::new(PgConversationStore::new(pool.clone())),
        vectors: Arc::new(PgVectorStore::new(pool, embedder)),
        records,
        storage: Arc::new(S3Store::new(&config.storage)?),
        identity,
        config: config.clone(),
    };

    let app = create_router(state);

    let addr = config.server.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
