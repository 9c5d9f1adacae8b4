//! pgvector-backed similarity search.
//!
//! Chunks are the unit of retrieval: page content plus source/page/url
//! metadata. Search can be restricted to an allow-list of source file names,
//! which is how inactive documents are excluded without deleting their
//! embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::embeddings::Embedder;
use crate::types::AppResult;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: i64,
    #[serde(default)]
    pub collection_name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and insert one batch of chunks into a collection.
    async fn add_documents(&self, collection: &str, chunks: &[Chunk]) -> AppResult<()>;

    /// Top-k chunks by cosine similarity, optionally restricted to sources
    /// in `source_filter`.
    async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        k: i64,
        source_filter: Option<&[String]>,
    ) -> AppResult<Vec<Chunk>>;

    /// Remove every chunk whose source metadata matches the file name.
    async fn delete_by_source(&self, source: &str) -> AppResult<()>;
}

pub struct PgVectorStore {
    pool: PgPool,
    embedder: Arc<dyn Embedder>,
}

impl PgVectorStore {
    pub fn new(pool: PgPool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }
}

/// pgvector input literal: `[v1,v2,...]`.
fn vector_literal(values: &[f32]) -> String {
    let mut out = String::with_capacity(values.len() * 10 + 2);
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

#[derive(sqlx::FromRow)]
struct ChunkRow {
    content: String,
    metadata: serde_json::Value,
}

impl ChunkRow {
    fn into_chunk(self) -> Chunk {
        let metadata = serde_json::from_value(self.metadata).unwrap_or(ChunkMetadata {
            source: String::new(),
            page: 0,
            collection_name: String::new(),
            url: String::new(),
        });
        Chunk { content: self.content, metadata }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn add_documents(&self, collection: &str, chunks: &[Chunk]) -> AppResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let mut tx = self.pool.begin().await?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            sqlx::query(
                r#"
                INSERT INTO embedding_chunks (collection, content, metadata, embedding)
                VALUES ($1, $2, $3, $4::vector)
                "#,
            )
            .bind(collection)
            .bind(&chunk.content)
            .bind(serde_json::to_value(&chunk.metadata).unwrap_or_default())
            .bind(vector_literal(&embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!(collection, count = chunks.len(), "inserted embedding batch");
        Ok(())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        k: i64,
        source_filter: Option<&[String]>,
    ) -> AppResult<Vec<Chunk>> {
        let embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = vector_literal(&embeddings[0]);
        let filter: Option<Vec<String>> = source_filter.map(|s| s.to_vec());

        let rows = sqlx::query_as::<_, ChunkRow>(
            r#"
            SELECT content, metadata
            FROM embedding_chunks
            WHERE collection = $1
              AND ($2::text[] IS NULL OR metadata ->> 'source' = ANY($2))
            ORDER BY embedding <=> $3::vector
            LIMIT $4
            "#,
        )
        .bind(collection)
        .bind(filter)
        .bind(query_vector)
        .bind(k)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChunkRow::into_chunk).collect())
    }

    async fn delete_by_source(&self, source: &str) -> AppResult<()> {
        let done = sqlx::query("DELETE FROM embedding_chunks WHERE metadata ->> 'source' = $1")
            .bind(source)
            .execute(&self.pool)
            .await?;
        info!(source, removed = done.rows_affected(), "deleted embeddings by source");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_literal_format() {
        assert_eq!(vector_literal(&[0.5, -1.0, 2.0]), "[0.5,-1,2]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let chunk = Chunk {
            content: "text".into(),
            metadata: ChunkMetadata {
                source: "a.pdf".into(),
                page: 3,
                collection_name: "default".into(),
                url: "https://bucket/a.pdf#page=3".into(),
            },
        };
        let value = serde_json::to_value(&chunk.metadata).unwrap();
        assert_eq!(value["source"], "a.pdf");
        let row = ChunkRow { content: chunk.content.clone(), metadata: value };
        assert_eq!(row.into_chunk(), chunk);
    }
}

/// Deterministic in-memory vector store for agent/tool/pipeline tests.
#[cfg(test)]
pub mod memory {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryVectorStore {
        pub chunks: Mutex<Vec<(String, Chunk)>>,
        /// When set, add_documents fails after this many successful batches.
        pub fail_after_batches: Option<usize>,
        /// Number of add_documents attempts, failed ones included.
        pub batches_seen: Mutex<usize>,
    }

    impl MemoryVectorStore {
        pub fn with_chunks(collection: &str, chunks: Vec<Chunk>) -> Self {
            Self {
                chunks: Mutex::new(
                    chunks.into_iter().map(|c| (collection.to_string(), c)).collect(),
                ),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl VectorStore for MemoryVectorStore {
        async fn add_documents(&self, collection: &str, chunks: &[Chunk]) -> AppResult<()> {
            let mut seen = self.batches_seen.lock().unwrap();
            *seen += 1;
            if let Some(limit) = self.fail_after_batches {
                if *seen > limit {
                    return Err(crate::types::AppError::Ingest(
                        "simulated batch failure".to_string(),
                    ));
                }
            }
            let mut stored = self.chunks.lock().unwrap();
            for chunk in chunks {
                stored.push((collection.to_string(), chunk.clone()));
            }
            Ok(())
        }

        async fn similarity_search(
            &self,
            collection: &str,
            query: &str,
            k: i64,
            source_filter: Option<&[String]>,
        ) -> AppResult<Vec<Chunk>> {
            // Rank by naive term overlap so tests are deterministic.
            let query_lower = query.to_lowercase();
            let mut matches: Vec<(usize, Chunk)> = self
                .chunks
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| c == collection)
                .filter(|(_, chunk)| match source_filter {
                    Some(allowed) => allowed.contains(&chunk.metadata.source),
                    None => true,
                })
                .map(|(_, chunk)| {
                    let score = query_lower
                        .split_whitespace()
                        .filter(|term| chunk.content.to_lowercase().contains(*term))
                        .count();
                    (score, chunk.clone())
                })
                .collect();
            matches.sort_by(|a, b| b.0.cmp(&a.0));
            Ok(matches.into_iter().take(k as usize).map(|(_, c)| c).collect())
        }

        async fn delete_by_source(&self, source: &str) -> AppResult<()> {
            self.chunks
                .lock()
                .unwrap()
                .retain(|(_, chunk)| chunk.metadata.source != source);
            Ok(())
        }
    }
}
