//! Object storage uploads.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::auth::TokenSource;
use crate::backend::{status_error, transport_error};
use crate::error::Result;

pub const STORAGE_API: &str = "https://storage.googleapis.com";

/// Sink for artifacts. Returns the URI of the stored object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Strip an optional `gs://` scheme and trailing slash from a bucket reference.
pub fn bucket_name(bucket: &str) -> &str {
    bucket
        .strip_prefix("gs://")
        .unwrap_or(bucket)
        .trim_end_matches('/')
}

/// Cloud Storage JSON API media uploads.
pub struct CloudStorage {
    http_client: Client,
    base_url: String,
    tokens: TokenSource,
}

impl CloudStorage {
    pub fn new(tokens: TokenSource) -> Self {
        Self::with_base_url(STORAGE_API, tokens)
    }

    pub fn with_base_url(base_url: &str, tokens: TokenSource) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

#[async_trait]
impl ObjectStore for CloudStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let bucket = bucket_name(bucket);
        let token = self.tokens.token().await?;
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, bucket);

        let response = self
            .http_client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", path)])
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let uri = format!("gs://{}/{}", bucket, path);
        tracing::info!("Uploaded {}", uri);
        Ok(uri)
    }
}
