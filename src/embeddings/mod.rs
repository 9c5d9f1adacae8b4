pub mod embedder;
pub mod vector_store;

pub use embedder::{Embedder, OpenAiEmbedder};
pub use vector_store::{Chunk, ChunkMetadata, PgVectorStore, VectorStore};
