// S3-backed blob storage.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tracing::info;

use crate::config::StorageConfig;
use crate::storage::BlobStorage;
use crate::types::{AppError, AppResult};

pub struct S3Store {
    bucket: Box<Bucket>,
    public_base: String,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> AppResult<Self> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| AppError::Storage(format!("invalid S3 region: {e}")))?,
        };
        let credentials = Credentials::new(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Storage(format!("invalid S3 credentials: {e}")))?;
        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| AppError::Storage(format!("bucket setup failed: {e}")))?;

        let public_base = match &config.endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), config.bucket),
            None => format!(
                "https://{}.s3.{}.amazonaws.com",
                config.bucket, config.region
            ),
        };
        Ok(Self {
            bucket: Box::new(bucket),
            public_base,
        })
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/{}", self.public_base, percent_encode(name))
    }
}

/// Percent-encode an object key for use in a URL path. Slashes are kept so
/// prefixed keys stay readable.
pub fn percent_encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[async_trait]
impl BlobStorage for S3Store {
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> AppResult<String> {
        let response = self
            .bucket
            .put_object_with_content_type(name, bytes, content_type)
            .await
            .map_err(|e| AppError::Storage(format!("upload of {name} failed: {e}")))?;
        if response.status_code() != 200 {
            return Err(AppError::Storage(format!(
                "upload of {name} returned status {}",
                response.status_code()
            )));
        }
        let url = self.object_url(name);
        info!(name, url, "uploaded object");
        Ok(url)
    }

    async fn delete(&self, name: &str) -> AppResult<()> {
        self.bucket
            .delete_object(name)
            .await
            .map_err(|e| AppError::Storage(format!("delete of {name} failed: {e}")))?;
        info!(name, "deleted object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_spaces_are_encoded() {
        assert_eq!(percent_encode("care plan v2.pdf"), "care%20plan%20v2.pdf");
        assert_eq!(percent_encode("images/fig-1.png"), "images/fig-1.png");
    }
}
