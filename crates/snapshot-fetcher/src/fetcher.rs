//! Blob fetching from the remote snapshot store

use crate::error::{FetchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Remote fetch collaborator: resolves a locator to the blob's bytes
#[async_trait]
pub trait BlobFetcher: Send + Sync {
    async fn fetch_blob(&self, locator: &str) -> Result<Vec<u8>>;
}

/// HTTP client for fetching snapshot blobs
pub struct HttpBlobFetcher {
    client: Client,
    base_url: String,
}

impl HttpBlobFetcher {
    /// Create a fetcher that resolves blob ids against `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snapshot-fetcher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URLs pass through; anything else is a blob id under the base URL
    fn blob_url(&self, locator: &str) -> Result<String> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(FetchError::InvalidLocator(locator.to_string()));
        }

        if locator.starts_with("http://") || locator.starts_with("https://") {
            return Ok(locator.to_string());
        }

        Ok(format!("{}/{}", self.base_url, urlencoding::encode(locator)))
    }
}

#[async_trait]
impl BlobFetcher for HttpBlobFetcher {
    async fn fetch_blob(&self, locator: &str) -> Result<Vec<u8>> {
        let url = self.blob_url(locator)?;
        debug!(url = %url, "Fetching blob");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Failed to fetch blob");
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let data = response.bytes().await?.to_vec();
        debug!(url = %url, size = data.len(), "Fetched blob");

        Ok(data)
    }
}
