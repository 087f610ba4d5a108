//! Client-credentials token handling for Microsoft Graph.
//!
//! The session owns its cached token. A token is fetched lazily, reused until
//! Graph rejects it, then fetched again.

use crate::config::SharePointConfig;
use crate::utils::errors::{Result, SyncError};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GraphSession {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<String>>,
}

impl GraphSession {
    pub fn new(client: reqwest::Client, config: &SharePointConfig) -> Self {
        Self {
            client,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                config.authority_url.trim_end_matches('/'),
                config.tenant_id
            ),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: Mutex::new(None),
        }
    }

    /// Current access token, acquiring one if none is cached.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token = self.acquire().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop `stale` from the cache. A token refreshed by someone else in the
    /// meantime is kept.
    pub async fn invalidate(&self, stale: &str) {
        let mut cached = self.token.lock().await;
        if cached.as_deref() == Some(stale) {
            debug!("Invalidating cached Graph token");
            *cached = None;
        }
    }

    async fn acquire(&self) -> Result<String> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Authentication(format!(
                "token request failed with {}: {}",
                status, body
            )));
        }

        let body = response.bytes().await?;
        let token: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| SyncError::Authentication(format!("invalid token response: {}", e)))?;

        info!("Acquired Graph access token");
        Ok(token.access_token)
    }
}
