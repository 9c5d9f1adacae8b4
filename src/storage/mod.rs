// Blob storage for uploaded knowledge-base documents and extracted images.

pub mod s3;

pub use s3::S3Store;

use async_trait::async_trait;

use crate::types::AppResult;

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Upload bytes under `name` and return a public URL for them.
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> AppResult<String>;

    /// Remove the object; deleting a missing object is not an error.
    async fn delete(&self, name: &str) -> AppResult<()>;
}
