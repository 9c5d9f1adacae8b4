//! Document ingestion pipeline.
//!
//! Turns an uploaded file into chunks in a named vector-store collection.
//! Plain text is split into question/answer units; PDFs are converted to
//! page-chunked markdown with extracted images pushed to blob storage and
//! their in-text references rewritten to the uploaded URLs.

pub mod pdf;

pub use pdf::{LopdfConverter, MarkdownConverter};

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tracing::{info, warn};

use crate::config::{IngestConfig, VectorStoreConfig};
use crate::embeddings::{Chunk, ChunkMetadata, VectorStore};
use crate::storage::BlobStorage;
use crate::types::{AppError, AppResult};

const QUESTION_MARKER: &str = "Question:";

/// Filename keywords that route a document to the drug collection.
const DRUG_KEYWORDS: &[&str] = &["drug", "medicine", "medication", "pharma"];

fn control_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x00-\x1F\x7F-\x9F]").unwrap())
}

fn image_refs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[.*?\]\(([^)]+\.png)\)").unwrap())
}

/// Strip control characters that break downstream encoders.
pub fn sanitize(text: &str) -> String {
    control_chars().replace_all(text, "").into_owned()
}

/// Split plain text into one unit per question/answer block. Text without
/// the marker stays a single whole-file unit.
pub fn split_question_blocks(text: &str) -> Vec<String> {
    if !text.contains(QUESTION_MARKER) {
        return vec![text.to_string()];
    }
    let mut blocks = Vec::new();
    for (index, part) in text.split(QUESTION_MARKER).enumerate() {
        if part.trim().is_empty() {
            continue;
        }
        if index == 0 {
            // Preamble before the first marker is not a Q/A unit.
            continue;
        }
        blocks.push(format!("{QUESTION_MARKER}{}", part.trim_end()));
    }
    if blocks.is_empty() {
        vec![text.to_string()]
    } else {
        blocks
    }
}

/// Replace markdown image references with the uploaded URLs.
pub fn rewrite_image_refs(text: &str, urls: &HashMap<String, String>) -> String {
    let mut rewritten = text.to_string();
    for capture in image_refs().captures_iter(text) {
        let name = &capture[1];
        if let Some(url) = urls.get(name) {
            rewritten = rewritten.replace(name, url);
        }
    }
    rewritten
}

/// Pick the target collection for a file, explicit target first, filename
/// keyword heuristic second.
pub fn route_collection<'a>(
    file_name: &str,
    explicit: Option<&'a str>,
    config: &'a VectorStoreConfig,
) -> &'a str {
    if let Some(target) = explicit {
        return target;
    }
    let lowered = file_name.to_lowercase();
    if DRUG_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        &config.drug_collection
    } else {
        &config.collection
    }
}

pub struct Ingestor {
    vectors: Arc<dyn VectorStore>,
    storage: Arc<dyn BlobStorage>,
    converter: Arc<dyn MarkdownConverter>,
    vectorstore: VectorStoreConfig,
    batch_size: usize,
    batch_timeout: Duration,
}

impl Ingestor {
    pub fn new(
        vectors: Arc<dyn VectorStore>,
        storage: Arc<dyn BlobStorage>,
        converter: Arc<dyn MarkdownConverter>,
        vectorstore: VectorStoreConfig,
        ingest: &IngestConfig,
    ) -> Self {
        Self {
            vectors,
            storage,
            converter,
            vectorstore,
            batch_size: ingest.batch_size.max(1),
            batch_timeout: Duration::from_secs(ingest.batch_timeout_secs),
        }
    }

    /// Ingest one uploaded file already present in blob storage at `url`,
    /// optionally into an explicit collection. Returns the number of chunks
    /// written.
    pub async fn ingest_file(
        &self,
        file_name: &str,
        bytes: &[u8],
        url: &str,
        collection: Option<&str>,
    ) -> AppResult<usize> {
        let pages = self.pages_for(file_name, bytes).await?;
        let collection =
            route_collection(file_name, collection, &self.vectorstore).to_string();

        let chunks: Vec<Chunk> = pages
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let page = (index + 1) as i64;
                Chunk {
                    content: sanitize(&text),
                    metadata: ChunkMetadata {
                        source: file_name.to_string(),
                        page,
                        collection_name: collection.clone(),
                        url: format!("{url}#page={page}"),
                    },
                }
            })
            .collect();

        for (batch_index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let insert = self.vectors.add_documents(&collection, batch);
            match tokio::time::timeout(self.batch_timeout, insert).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(file_name, batch_index, error = %e, "batch insert failed");
                    return Err(AppError::Ingest(format!(
                        "batch {batch_index} of {file_name} failed: {e}"
                    )));
                }
                Err(_) => {
                    warn!(file_name, batch_index, "batch insert timed out");
                    return Err(AppError::Ingest(format!(
                        "batch {batch_index} of {file_name} timed out"
                    )));
                }
            }
        }

        info!(file_name, collection, chunks = chunks.len(), "ingested file");
        Ok(chunks.len())
    }

    async fn pages_for(&self, file_name: &str, bytes: &[u8]) -> AppResult<Vec<String>> {
        if file_name.to_lowercase().ends_with(".pdf") {
            let mut pages = Vec::new();
            for page in self.converter.convert(bytes)? {
                let mut urls = HashMap::new();
                for image in &page.images {
                    let key = format!("images/{}", image.name);
                    let url = self
                        .storage
                        .upload(&key, &image.bytes, &image.content_type)
                        .await?;
                    urls.insert(image.name.clone(), url);
                }
                pages.push(rewrite_image_refs(&page.text, &urls));
            }
            Ok(pages)
        } else {
            let text = String::from_utf8_lossy(bytes);
            Ok(split_question_blocks(&text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::vector_store::memory::MemoryVectorStore;
    use crate::ingest::pdf::{ExtractedImage, PageMarkdown};
    use crate::storage::s3::memory::MemoryStorage;

    fn vectorstore_config() -> VectorStoreConfig {
        VectorStoreConfig {
            collection: "default".to_string(),
            drug_collection: "drugs".to_string(),
            embeddings_model: "text-embedding-3-large".to_string(),
        }
    }

    fn ingestor(vectors: Arc<MemoryVectorStore>, batch_size: usize) -> Ingestor {
        Ingestor::new(
            vectors,
            Arc::new(MemoryStorage::default()),
            Arc::new(FixedConverter { pages: Vec::new() }),
            vectorstore_config(),
            &IngestConfig { batch_size, batch_timeout_secs: 30 },
        )
    }

    struct FixedConverter {
        pages: Vec<PageMarkdown>,
    }

    impl MarkdownConverter for FixedConverter {
        fn convert(&self, _bytes: &[u8]) -> AppResult<Vec<PageMarkdown>> {
            Ok(self.pages.clone())
        }
    }

    #[tokio::test]
    async fn question_blocks_become_numbered_chunks() {
        let vectors = Arc::new(MemoryVectorStore::default());
        let ingestor = ingestor(vectors.clone(), 50);
        let text = "Question: What is warfarin?\nAnswer: An anticoagulant.\n\
                    Question: What is INR?\nAnswer: A clotting measure.\n\
                    Question: Who monitors it?\nAnswer: The care team.";
        let count = ingestor
            .ingest_file("faq.txt", text.as_bytes(), "https://blobs.test/faq.txt", None)
            .await
            .unwrap();
        assert_eq!(count, 3);

        let stored = vectors.chunks.lock().unwrap();
        assert_eq!(stored.len(), 3);
        for (i, (collection, chunk)) in stored.iter().enumerate() {
            assert_eq!(collection, "default");
            assert_eq!(chunk.metadata.page, (i + 1) as i64);
            assert_eq!(chunk.metadata.source, "faq.txt");
            assert!(chunk.content.contains("Question:"));
            assert!(chunk.content.contains("Answer:"));
            assert_eq!(
                chunk.metadata.url,
                format!("https://blobs.test/faq.txt#page={}", i + 1)
            );
        }
    }

    #[tokio::test]
    async fn text_without_markers_is_one_chunk() {
        let vectors = Arc::new(MemoryVectorStore::default());
        let ingestor = ingestor(vectors.clone(), 50);
        let count = ingestor
            .ingest_file("notes.txt", b"no markers here at all", "https://blobs.test/notes.txt", None)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn batch_failure_aborts_remaining_batches() {
        let vectors = Arc::new(MemoryVectorStore {
            fail_after_batches: Some(1),
            ..Default::default()
        });
        // Three Q/A blocks with batch size 1 means three batches.
        let ingestor = ingestor(vectors.clone(), 1);
        let text = "Question: a?\nAnswer: a.\nQuestion: b?\nAnswer: b.\nQuestion: c?\nAnswer: c.";
        let err = ingestor
            .ingest_file("faq.txt", text.as_bytes(), "https://blobs.test/faq.txt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Ingest(_)));

        // Batch 1 committed, batch 2 failed, batch 3 never attempted.
        assert_eq!(vectors.chunks.lock().unwrap().len(), 1);
        assert_eq!(*vectors.batches_seen.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn pdf_image_refs_point_at_uploaded_urls() {
        let vectors = Arc::new(MemoryVectorStore::default());
        let storage = Arc::new(MemoryStorage::default());
        let ingestor = Ingestor::new(
            vectors.clone(),
            storage.clone(),
            Arc::new(FixedConverter {
                pages: vec![PageMarkdown {
                    text: "See ![figure](fig-1.png) for dosing.".to_string(),
                    images: vec![ExtractedImage {
                        name: "fig-1.png".to_string(),
                        bytes: vec![1, 2, 3],
                        content_type: "image/png".to_string(),
                    }],
                }],
            }),
            vectorstore_config(),
            &IngestConfig { batch_size: 50, batch_timeout_secs: 30 },
        );

        ingestor
            .ingest_file("guide.pdf", b"%PDF", "https://blobs.test/guide.pdf", None)
            .await
            .unwrap();

        let stored = vectors.chunks.lock().unwrap();
        assert!(stored[0].1.content.contains("https://blobs.test/images/fig-1.png"));
        assert!(!stored[0].1.content.contains("(fig-1.png)"));
        assert!(storage.objects.lock().unwrap().contains_key("images/fig-1.png"));
    }

    #[test]
    fn control_characters_are_stripped() {
        assert_eq!(sanitize("a\x00b\x1fc\x7fd"), "abcd");
        assert_eq!(sanitize("plain text\nwith newline"), "plain textwith newline");
    }

    #[test]
    fn drug_keywords_route_to_the_drug_collection() {
        let config = vectorstore_config();
        assert_eq!(route_collection("Drug-Handbook.pdf", None, &config), "drugs");
        assert_eq!(route_collection("intake-form.pdf", None, &config), "default");
        assert_eq!(route_collection("Drug-Handbook.pdf", Some("override"), &config), "override");
    }
}
