//! Knowledge-base retrieval tool.
//!
//! Search is scoped to currently active files; deactivated documents keep
//! their embeddings but never surface here.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::db::ConversationStore;
use crate::embeddings::VectorStore;
use crate::tools::Tool;
use crate::types::{AppError, AppResult};

const TOP_K: i64 = 5;

pub struct SemanticSearchTool {
    store: Arc<dyn ConversationStore>,
    vectors: Arc<dyn VectorStore>,
    collection: String,
}

#[derive(Deserialize)]
struct Arguments {
    term: String,
}

impl SemanticSearchTool {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        vectors: Arc<dyn VectorStore>,
        collection: &str,
    ) -> Self {
        Self { store, vectors, collection: collection.to_string() }
    }

    pub async fn search(&self, term: &str) -> AppResult<String> {
        let active = self.store.get_active_files().await?;
        let chunks = self
            .vectors
            .similarity_search(&self.collection, term, TOP_K, Some(&active))
            .await?;
        info!(term, hits = chunks.len(), "semantic search");
        if chunks.is_empty() {
            return Ok("No relevant documents were found.".to_string());
        }
        Ok(chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[async_trait]
impl Tool for SemanticSearchTool {
    fn name(&self) -> &str {
        "semantic_search"
    }

    fn description(&self) -> &str {
        "Searches the medical knowledge base and returns the most relevant document passages for a query."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "term": {
                    "type": "string",
                    "description": "Search query to look up in the knowledge base"
                }
            },
            "required": ["term"]
        })
    }

    async fn call(&self, arguments: &str) -> AppResult<String> {
        let args: Arguments = serde_json::from_str(arguments)
            .map_err(|e| AppError::InvalidRequest(format!("bad semantic_search arguments: {e}")))?;
        self.search(&args.term).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::memory::MemoryStore;
    use crate::db::NewFile;
    use crate::embeddings::vector_store::memory::MemoryVectorStore;
    use crate::embeddings::{Chunk, ChunkMetadata};

    fn chunk(source: &str, content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                page: 1,
                collection_name: "default".to_string(),
                url: String::new(),
            },
        }
    }

    #[tokio::test]
    async fn inactive_files_never_surface() {
        let store = Arc::new(MemoryStore::default());
        store
            .add_files(
                &[
                    NewFile { file_name: "a.pdf".into(), url: String::new() },
                    NewFile { file_name: "b.pdf".into(), url: String::new() },
                    NewFile { file_name: "c.pdf".into(), url: String::new() },
                ],
                "u1",
            )
            .await
            .unwrap();
        store.toggle_file_active("c.pdf", false).await.unwrap();

        let vectors = Arc::new(MemoryVectorStore::with_chunks(
            "default",
            vec![
                chunk("a.pdf", "warfarin dosing guidance"),
                chunk("b.pdf", "warfarin interactions"),
                chunk("c.pdf", "warfarin contraindications"),
            ],
        ));

        let tool = SemanticSearchTool::new(store, vectors, "default");
        let result = tool.call(r#"{"term":"warfarin"}"#).await.unwrap();
        assert!(result.contains("dosing guidance"));
        assert!(result.contains("interactions"));
        assert!(!result.contains("contraindications"));
    }

    #[tokio::test]
    async fn empty_result_reports_no_documents() {
        let store = Arc::new(MemoryStore::default());
        let vectors = Arc::new(MemoryVectorStore::default());
        let tool = SemanticSearchTool::new(store, vectors, "default");
        let result = tool.search("anything").await.unwrap();
        assert_eq!(result, "No relevant documents were found.");
    }

    #[tokio::test]
    async fn malformed_arguments_are_rejected() {
        let store = Arc::new(MemoryStore::default());
        let vectors = Arc::new(MemoryVectorStore::default());
        let tool = SemanticSearchTool::new(store, vectors, "default");
        let err = tool.call("not json").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
