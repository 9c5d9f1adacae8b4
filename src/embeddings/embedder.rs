// OpenAI embeddings adapter.
// API reference: https://platform.openai.com/docs/api-reference/embeddings

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::types::{AppError, AppResult};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; output order matches input order.
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;
}

pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct WireResponse {
    data: Vec<WireEmbedding>,
}

#[derive(Deserialize)]
struct WireEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&WireRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| AppError::LlmApi(format!("embeddings request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LlmApi(format!("embeddings returned {status}: {text}")));
        }

        let mut parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| AppError::LlmApi(format!("embeddings decode failed: {e}")))?;
        parsed.data.sort_by_key(|d| d.index);
        if parsed.data.len() != texts.len() {
            return Err(AppError::LlmApi(format!(
                "embeddings count mismatch: sent {}, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embeddings_preserve_input_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":[
                    {"index":1,"embedding":[0.2]},
                    {"index":0,"embedding":[0.1]}
                ]}"#,
            )
            .create_async()
            .await;

        let embedder = OpenAiEmbedder::new("key", "text-embedding-3-large")
            .with_base_url(&server.url());
        let out = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(out, vec![vec![0.1], vec![0.2]]);
    }
}
