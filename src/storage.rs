//! Upload intake: resolve a previously stored image key to a publicly
//! fetchable URL, verifying the object exists before the pipeline spends
//! an inference call on it.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Fixed namespace all uploads live under at the storage provider.
const UPLOAD_PREFIX: &str = "uploads";

#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Resolve a storage key to a public URL, or `NotFound` when no such
    /// object exists.
    async fn resolve_upload(&self, key: &str) -> Result<String>;
}

/// Object-storage backend reached over HTTP. The public URL is
/// `{base_url}/uploads/{key}`; existence is checked with a HEAD request.
pub struct HttpUploadStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUploadStore {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("moodlist/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            UPLOAD_PREFIX,
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl UploadStore for HttpUploadStore {
    async fn resolve_upload(&self, key: &str) -> Result<String> {
        let url = self.public_url(key);
        tracing::debug!("Checking upload exists: {}", url);

        let response = self.client.head(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!("Upload not found: {}/{}", UPLOAD_PREFIX, key);
            return Err(AppError::NotFound(format!("{}/{}", UPLOAD_PREFIX, key)));
        }
        if !response.status().is_success() {
            return Err(AppError::ProviderApi(format!(
                "storage returned {} for {}",
                response.status(),
                url
            )));
        }

        Ok(url)
    }
}
