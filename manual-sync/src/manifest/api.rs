//! HTTP client for the manuals backend.

use super::{Manifest, ManifestSource};
use crate::config::{ApiKeyStyle, ManualsConfig};
use crate::utils::errors::{Result, SyncError};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tracing::info;

/// Fetches and validates the manifest from the manuals backend.
pub struct ManualsApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    key_style: ApiKeyStyle,
}

impl ManualsApi {
    pub fn new(config: &ManualsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: Some(config.api_key.clone()).filter(|k| !k.is_empty()),
            key_style: config.api_key_style,
        })
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(&self.base_url)
            .header(ACCEPT, "application/json");

        match (&self.api_key, self.key_style) {
            (Some(key), ApiKeyStyle::Header) => request.header("X-API-KEY", key),
            (Some(key), ApiKeyStyle::Bearer) => request.bearer_auth(key),
            (None, _) => request,
        }
    }
}

#[async_trait]
impl ManifestSource for ManualsApi {
    async fn fetch_manifest(&self) -> Result<Manifest> {
        info!(url = %self.base_url, "Fetching manuals manifest");

        let response = self.request().send().await?;
        if !response.status().is_success() {
            return Err(SyncError::from_response(response).await);
        }

        let body = response.bytes().await?;
        let manifest: Manifest = serde_json::from_slice(&body)?;

        info!(
            documents = manifest.documents.len(),
            files = manifest.file_count(),
            generated_at = %manifest.last_generated_at.to_rfc3339(),
            "Manifest fetched"
        );

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;

    const BODY: &str = r#"{
        "documents": [{"type": "printer", "serials": [], "files": [
            {"filename": "manual.pdf", "mime": "application/pdf", "language": "en",
             "type": "user", "size": "3", "hash": "abc123", "link": "https://host/manual.pdf"}
        ]}],
        "lastGeneratedAt": "2025-03-01T12:30:00Z",
        "timeToGenerate": "0.4s"
    }"#;

    fn config(base_url: String, api_key: &str, style: ApiKeyStyle) -> ManualsConfig {
        ManualsConfig {
            base_url,
            api_key: api_key.to_string(),
            api_key_style: style,
            timeout_secs: 5,
        }
    }

    async fn require_key(headers: HeaderMap) -> (StatusCode, &'static str) {
        match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
            Some("secret") => (StatusCode::OK, BODY),
            _ => (StatusCode::UNAUTHORIZED, "missing key"),
        }
    }

    async fn require_bearer(headers: HeaderMap) -> (StatusCode, &'static str) {
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer secret") => (StatusCode::OK, BODY),
            _ => (StatusCode::UNAUTHORIZED, "missing bearer"),
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_api_key_header() {
        let base = serve(Router::new().route("/manuals", get(require_key))).await;
        let api = ManualsApi::new(&config(format!("{base}/manuals"), "secret", ApiKeyStyle::Header)).unwrap();

        let manifest = api.fetch_manifest().await.unwrap();
        assert_eq!(manifest.file_count(), 1);
        assert_eq!(manifest.documents[0].files[0].hash, "abc123");
    }

    #[tokio::test]
    async fn test_fetch_with_bearer_style() {
        let base = serve(Router::new().route("/manuals", get(require_bearer))).await;
        let api = ManualsApi::new(&config(format!("{base}/manuals"), "secret", ApiKeyStyle::Bearer)).unwrap();

        assert!(api.fetch_manifest().await.is_ok());
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let base = serve(Router::new().route("/manuals", get(require_key))).await;
        let api = ManualsApi::new(&config(format!("{base}/manuals"), "", ApiKeyStyle::Header)).unwrap();

        let err = api.fetch_manifest().await.unwrap_err();
        assert!(matches!(err, SyncError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_schema_mismatch_fails() {
        let app = Router::new().route("/manuals", get(|| async { r#"{"documents": "nope"}"# }));
        let base = serve(app).await;
        let api = ManualsApi::new(&config(format!("{base}/manuals"), "", ApiKeyStyle::Header)).unwrap();

        let err = api.fetch_manifest().await.unwrap_err();
        assert!(matches!(err, SyncError::Serialization(_)));
    }
}
