use anyhow::Result;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub vectorstore: VectorStoreConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub agent: AgentConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub project_name: String,
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Bind address from the configured host and port.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr> {
        let ip: std::net::IpAddr = self
            .host
            .parse()
            .map_err(|_| anyhow::anyhow!("HOST is not an IP address: {}", self.host))?;
        Ok(std::net::SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Separate clinical records database; optional because not every
    /// deployment runs the record-extraction tool or treatment plans.
    pub records_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Active model identifier, matched against the agent allow-lists.
    pub model: Option<String>,
    pub openai_api_key: String,
    pub bedrock_api_key: String,
    pub bedrock_region: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    pub collection: String,
    pub drug_collection: String,
    pub embeddings_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Model identifiers answered by the tool-calling agent.
    pub tool_models: Vec<String>,
    /// Model identifiers answered by the fixed retrieval pipeline.
    pub pipeline_models: Vec<String>,
    pub max_tool_rounds: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub batch_timeout_secs: u64,
}

// Defaults mirror the deployment's historical allow-lists.
const DEFAULT_TOOL_MODELS: &str = "gpt-3.5-turbo-0125,gpt-4o,gpt-4o-mini";
const DEFAULT_PIPELINE_MODELS: &str = "meta.llama3-1-70b-instruct-v1:0";

fn env_list(key: &str, default: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "9000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "lisa".to_string()),
                cors_allowed_origins: env_list("ALLOWED_ORIGINS", "*"),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                min_connections: env::var("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
                records_url: env::var("RECORDS_DATABASE_URL").ok(),
            },
            llm: LlmConfig {
                model: env::var("OPENAI_MODEL").ok().filter(|m| !m.is_empty()),
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                bedrock_api_key: env::var("BEDROCK_API_KEY").unwrap_or_default(),
                bedrock_region: env::var("BEDROCK_REGION")
                    .unwrap_or_else(|_| "us-west-2".to_string()),
                temperature: env::var("LLM_TEMPERATURE")
                    .unwrap_or_else(|_| "0.3".to_string())
                    .parse()?,
            },
            vectorstore: VectorStoreConfig {
                collection: env::var("VECTORSTORE_COLLECTION_NAME")
                    .unwrap_or_else(|_| "default".to_string()),
                drug_collection: env::var("VECTORSTORE_DRUG_COLLECTION_NAME")
                    .unwrap_or_else(|_| "drugs".to_string()),
                embeddings_model: env::var("EMBEDDINGS_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-large".to_string()),
            },
            storage: StorageConfig {
                bucket: env::var("AWS_BUCKET_NAME").unwrap_or_default(),
                region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: env::var("S3_ENDPOINT").ok(),
                access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            },
            auth: AuthConfig {
                secret: env::var("AUTH_SECRET")
                    .map_err(|_| anyhow::anyhow!("AUTH_SECRET must be set"))?,
                token_ttl_secs: env::var("TOKEN_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()?,
            },
            agent: AgentConfig {
                tool_models: env_list("TOOL_CALLING_MODELS", DEFAULT_TOOL_MODELS),
                pipeline_models: env_list("PIPELINE_MODELS", DEFAULT_PIPELINE_MODELS),
                max_tool_rounds: env::var("MAX_TOOL_ROUNDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
            },
            ingest: IngestConfig {
                batch_size: env::var("INGEST_BATCH_SIZE")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()?,
                batch_timeout_secs: env::var("INGEST_BATCH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            },
        })
    }
}
