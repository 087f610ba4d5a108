//! One synchronization pass: fetch the manifest, hand it to the engine.

use crate::engine::{RunSummary, SyncEngine};
use crate::manifest::ManifestSource;
use crate::utils::errors::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct SyncService {
    source: Arc<dyn ManifestSource>,
    engine: SyncEngine,
}

impl SyncService {
    pub fn new(source: Arc<dyn ManifestSource>, engine: SyncEngine) -> Self {
        Self { source, engine }
    }

    /// Run one pass. A manifest that cannot be fetched or parsed fails the
    /// whole pass before anything is uploaded; per-file problems only show
    /// up in the summary.
    pub async fn run(&self, max_files: Option<usize>) -> Result<RunSummary> {
        let manifest = self.source.fetch_manifest().await.map_err(|e| {
            error!(error = %e, "Failed to fetch manuals manifest");
            e
        })?;

        info!(
            generated_at = %manifest.last_generated_at,
            documents = manifest.documents.len(),
            "Fetched manuals manifest"
        );

        let summary = self.engine.run(&manifest, max_files).await;

        for report in summary.failures() {
            warn!(
                document_type = %report.document_type,
                file_name = %report.filename,
                outcome = ?report.outcome,
                "File not synchronized"
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ContentFetcher;
    use crate::engine::EngineOptions;
    use crate::manifest::{Document, ManualFile, Manifest};
    use crate::remote::{InMemoryStore, RemoteStore};
    use crate::resilience::RetryConfig;
    use crate::utils::errors::SyncError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Utc;

    struct StaticSource(Option<Manifest>);

    #[async_trait]
    impl ManifestSource for StaticSource {
        async fn fetch_manifest(&self) -> Result<Manifest> {
            self.0.clone().ok_or_else(|| SyncError::Status {
                status: 500,
                url: "https://manuals/api".into(),
                body: "boom".into(),
            })
        }
    }

    struct EchoFetcher;

    #[async_trait]
    impl ContentFetcher for EchoFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes> {
            Ok(Bytes::from(url.to_string()))
        }
    }

    fn manifest() -> Manifest {
        Manifest {
            documents: vec![Document {
                doc_type: "printer".into(),
                serials: vec![],
                files: vec![ManualFile {
                    filename: "manual.pdf".into(),
                    mime: "application/pdf".into(),
                    language: "en".into(),
                    content_type: "user".into(),
                    size: "4".into(),
                    hash: "abc123".into(),
                    download_url: "https://host/manual.pdf".into(),
                }],
            }],
            last_generated_at: Utc::now(),
            time_to_generate: "1s".into(),
        }
    }

    fn service(source: Option<Manifest>, store: Arc<InMemoryStore>) -> SyncService {
        let options = EngineOptions {
            retry: RetryConfig::none(),
            ..EngineOptions::default()
        };
        let store: Arc<dyn RemoteStore> = store;
        let engine = SyncEngine::new(store, Arc::new(EchoFetcher), options);
        SyncService::new(Arc::new(StaticSource(source)), engine)
    }

    #[tokio::test]
    async fn test_run_syncs_manifest() {
        let store = Arc::new(InMemoryStore::new());
        let summary = service(Some(manifest()), store.clone()).run(None).await.unwrap();

        assert_eq!(summary.uploaded, 1);
        assert_eq!(store.upload_count(), 1);
    }

    #[tokio::test]
    async fn test_manifest_failure_uploads_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let err = service(None, store.clone()).run(None).await.unwrap_err();

        assert!(matches!(err, SyncError::Status { status: 500, .. }));
        assert_eq!(store.upload_count(), 0);
        assert!(store.is_empty());
    }
}
