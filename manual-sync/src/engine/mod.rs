//! Synchronization engine - decides per file whether to skip or upload.
//!
//! Files are processed one at a time in manifest order:
//! - Build the destination folder `<root>/<document type>/<file type>/<language>`
//! - Compare the stored hash with the manifest hash; equal means skip
//! - Otherwise download, ensure the folder exists, upload with metadata
//!
//! A failing file is recorded and the run moves on. Every processed file,
//! failed ones included, counts towards the optional cap.

pub mod outcome;

use crate::download::ContentFetcher;
use crate::manifest::{Document, ManualFile, Manifest};
use crate::remote::{validate_segment, LogicalPath, RemoteStore, UploadMetadata};
use crate::resilience::retry::{retry_transient, RetryConfig};
use crate::utils::errors::SyncError;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use outcome::{FileReport, RunSummary, Stage, SyncOutcome};

/// Doubled scheme prefixes the backend is known to emit, and their fix.
const DOUBLED_SCHEMES: [(&str, &str); 2] = [
    ("https://https://", "https://"),
    ("http://http://", "http://"),
];

/// Collapse a doubled scheme prefix (`https://https://host` -> `https://host`).
/// Any other locator is returned untouched.
pub fn normalize_download_url(url: &str) -> Cow<'_, str> {
    for (doubled, single) in DOUBLED_SCHEMES {
        if let Some(rest) = url.strip_prefix(doubled) {
            return Cow::Owned(format!("{}{}", single, rest));
        }
    }
    Cow::Borrowed(url)
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Top-level folder every destination path starts with
    pub root_folder: String,
    /// Value of the `source` metadata field
    pub source_label: String,
    pub retry: RetryConfig,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            root_folder: "Manuals".to_string(),
            source_label: "ManifestSource".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

type StageResult<T> = Result<T, (Stage, SyncError)>;

/// Stateless between runs: the remote store's metadata is the only record of
/// what was uploaded before.
pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    fetcher: Arc<dyn ContentFetcher>,
    options: EngineOptions,
    cancel_token: CancellationToken,
}

impl SyncEngine {
    /// Create a new engine (no cancellation support)
    pub fn new(
        store: Arc<dyn RemoteStore>,
        fetcher: Arc<dyn ContentFetcher>,
        options: EngineOptions,
    ) -> Self {
        Self::with_cancel(store, fetcher, options, CancellationToken::new())
    }

    /// Create a new engine that stops between files once `cancel_token` fires
    pub fn with_cancel(
        store: Arc<dyn RemoteStore>,
        fetcher: Arc<dyn ContentFetcher>,
        options: EngineOptions,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            fetcher,
            options,
            cancel_token,
        }
    }

    /// Mirror `manifest` into the store, processing at most `max_files` files
    /// (`None` or `Some(0)` means no limit).
    pub async fn run(&self, manifest: &Manifest, max_files: Option<usize>) -> RunSummary {
        let start_time = Instant::now();
        let total_files = manifest.file_count();
        let cap = max_files.filter(|n| *n > 0);
        let mut summary = RunSummary::default();

        info!(documents = manifest.documents.len(), files = total_files, max_files = ?cap, "Starting manuals synchronization");

        'documents: for doc in &manifest.documents {
            info!(document_type = %doc.doc_type, files = doc.files.len(), "Processing document");

            for file in &doc.files {
                if self.cancel_token.is_cancelled() {
                    info!(processed = summary.processed(), "Synchronization cancelled");
                    summary.cancelled = true;
                    break 'documents;
                }

                let report = self.process_file(doc, file).await;
                summary.record(report);

                if let Some(cap) = cap {
                    if summary.processed() >= cap {
                        summary.truncated = summary.processed() < total_files;
                        info!(max_files = cap, "File cap reached, stopping");
                        break 'documents;
                    }
                }
            }
        }

        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            truncated = summary.truncated,
            cancelled = summary.cancelled,
            duration_ms = summary.duration_ms,
            "Manuals synchronization completed"
        );
        summary
    }

    async fn process_file(&self, doc: &Document, file: &ManualFile) -> FileReport {
        let path = LogicalPath::for_file(
            &self.options.root_folder,
            &doc.doc_type,
            &file.content_type,
            &file.language,
        );

        let (path, outcome) = match path {
            Ok(path) => {
                let outcome = match self.sync_file(&path, file).await {
                    Ok(outcome) => outcome,
                    Err((stage, err)) => failed(doc, file, Some(&path), stage, err),
                };
                (Some(path.to_string()), outcome)
            }
            Err(err) => (None, failed(doc, file, None, Stage::Validate, err)),
        };

        FileReport {
            document_type: doc.doc_type.clone(),
            filename: file.filename.clone(),
            path,
            outcome,
        }
    }

    async fn sync_file(&self, path: &LogicalPath, file: &ManualFile) -> StageResult<SyncOutcome> {
        let filename = file.filename.as_str();
        let retry = &self.options.retry;

        validate_segment(filename).map_err(|e| (Stage::Validate, e))?;
        let metadata = UploadMetadata::new(&file.hash, &self.options.source_label);

        debug!(path = %path, file_name = filename, language = %file.language, "Processing file");

        let lookup = retry_transient("hash_lookup", retry, || self.store.hash_at(path, filename))
            .await
            .map_err(|e| (Stage::Lookup, e))?;

        if lookup.matches(&file.hash) {
            info!(path = %path, file_name = filename, "File unchanged, skipping");
            return Ok(SyncOutcome::Skipped);
        }

        let url = normalize_download_url(&file.download_url);
        debug!(download_url = %url, file_name = filename, "Downloading file");
        let content = retry_transient("download", retry, || self.fetcher.fetch(&url))
            .await
            .map_err(|e| (Stage::Download, e))?;

        retry_transient("ensure_path", retry, || self.store.ensure_path(path))
            .await
            .map_err(|e| (Stage::EnsurePath, e))?;

        retry_transient("upload", retry, || {
            self.store.upload(path, filename, content.clone(), &metadata)
        })
        .await
        .map_err(|e| (Stage::Upload, e))?;

        info!(path = %path, file_name = filename, bytes = content.len(), "File uploaded");
        Ok(SyncOutcome::Uploaded)
    }
}

fn failed(
    doc: &Document,
    file: &ManualFile,
    path: Option<&LogicalPath>,
    stage: Stage,
    err: SyncError,
) -> SyncOutcome {
    error!(
        document_type = %doc.doc_type,
        file_name = %file.filename,
        path = ?path.map(ToString::to_string),
        stage = %stage,
        error = %err,
        "Failed to process manual file"
    );
    SyncOutcome::Failed {
        stage,
        reason: err.to_string(),
    }
}
