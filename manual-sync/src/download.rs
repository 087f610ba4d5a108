//! Fetching file content from manifest download locators.

use crate::utils::errors::{Result, SyncError};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

/// Source of file bytes for a download locator.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// Plain HTTP GET downloader with a hard per-request timeout.
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpDownloader {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::from_response(response).await);
        }

        let bytes = response.bytes().await?;
        debug!(url, bytes = bytes.len(), "Downloaded file content");
        Ok(bytes)
    }
}
