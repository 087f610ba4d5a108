//! Remote file store abstraction.
//!
//! The engine only talks to [`RemoteStore`]. Backends:
//! - [`SharePointClient`](crate::sharepoint::SharePointClient) - Microsoft Graph document library
//! - [`LocalDirStore`] - a directory tree with metadata sidecars
//! - [`InMemoryStore`] - process-local, for dry runs and tests

pub mod local;
pub mod memory;

use crate::utils::errors::{Result, SyncError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::fmt;

pub use local::LocalDirStore;
pub use memory::InMemoryStore;

/// Name of the metadata field carrying the upload source.
pub const SOURCE_FIELD: &str = "source";

/// What the store knows about a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLookup {
    /// Nothing stored at this location.
    Missing,
    /// An object exists; `hash` is the stored content hash, if any was recorded.
    Present { hash: Option<String> },
}

impl RemoteLookup {
    /// Exact, case-sensitive comparison with the expected hash.
    /// An object without a stored hash never matches.
    pub fn matches(&self, expected: &str) -> bool {
        matches!(self, RemoteLookup::Present { hash: Some(stored) } if stored == expected)
    }
}

/// Custom metadata attached to every uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetadata {
    content_hash: String,
    source: String,
}

impl UploadMetadata {
    pub fn new(content_hash: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            source: source.into(),
        }
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render as remote fields, storing the hash under `hash_field`.
    pub fn to_fields(&self, hash_field: &str) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(hash_field.to_string(), Value::String(self.content_hash.clone()));
        fields.insert(SOURCE_FIELD.to_string(), Value::String(self.source.clone()));
        fields
    }
}

/// Slash-delimited destination folder, validated segment by segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalPath {
    segments: Vec<String>,
}

impl LogicalPath {
    /// `<root>/<document type>/<file type>/<language>`
    pub fn for_file(root: &str, doc_type: &str, file_type: &str, language: &str) -> Result<Self> {
        let mut path = Self::parse(root)?;
        for segment in [doc_type, file_type, language] {
            validate_segment(segment)?;
            path.segments.push(segment.to_string());
        }
        Ok(path)
    }

    /// Parse a slash-delimited path; leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(SyncError::InvalidPath(format!("empty path '{}'", raw)));
        }
        let segments = trimmed
            .split('/')
            .map(|s| validate_segment(s).map(|_| s.to_string()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Every prefix from the first segment down to the full path.
    pub fn ancestors(&self) -> Vec<LogicalPath> {
        (1..=self.segments.len())
            .map(|n| LogicalPath {
                segments: self.segments[..n].to_vec(),
            })
            .collect()
    }

    /// Parent folder, or `None` for a single-segment path.
    pub fn parent(&self) -> Option<LogicalPath> {
        (self.segments.len() > 1).then(|| LogicalPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Key for an object stored under this path.
    pub fn object_key(&self, filename: &str) -> String {
        format!("{}/{}", self, filename)
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A path segment or filename must be non-empty, free of separators and not `.`/`..`.
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(SyncError::InvalidPath("empty segment".into()));
    }
    if segment == "." || segment == ".." {
        return Err(SyncError::InvalidPath(format!("relative segment '{}'", segment)));
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err(SyncError::InvalidPath(format!("separator in '{}'", segment)));
    }
    Ok(())
}

/// Capability surface of a destination store.
///
/// Authentication and sessions are internal to each implementation; callers
/// only ever see success or a [`SyncError`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Look up the object at `path/filename` and its stored content hash.
    async fn hash_at(&self, path: &LogicalPath, filename: &str) -> Result<RemoteLookup>;

    /// Create every missing folder along `path`. Existing folders are fine.
    async fn ensure_path(&self, path: &LogicalPath) -> Result<()>;

    /// Write `content` to `path/filename`, replacing any previous object, and
    /// attach `metadata` to it.
    async fn upload(
        &self,
        path: &LogicalPath,
        filename: &str,
        content: Bytes,
        metadata: &UploadMetadata,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_for_file() {
        let path = LogicalPath::for_file("Manuals", "printer", "user", "en").unwrap();
        assert_eq!(path.to_string(), "Manuals/printer/user/en");
        assert_eq!(path.segments().len(), 4);
        assert_eq!(path.name(), "en");
        assert_eq!(path.object_key("manual.pdf"), "Manuals/printer/user/en/manual.pdf");
    }

    #[test]
    fn test_nested_root() {
        let path = LogicalPath::for_file("/Shared/Manuals/", "printer", "user", "en").unwrap();
        assert_eq!(path.to_string(), "Shared/Manuals/printer/user/en");
    }

    #[test]
    fn test_rejects_unsafe_segments() {
        assert!(LogicalPath::for_file("Manuals", "", "user", "en").is_err());
        assert!(LogicalPath::for_file("Manuals", "a/b", "user", "en").is_err());
        assert!(LogicalPath::for_file("Manuals", "printer", "..", "en").is_err());
        assert!(LogicalPath::for_file("Manuals", "printer", "user", "e\\n").is_err());
        assert!(LogicalPath::parse("a//b").is_err());
        assert!(LogicalPath::parse("/").is_err());
    }

    #[test]
    fn test_ancestors_and_parent() {
        let path = LogicalPath::parse("Manuals/printer/user").unwrap();
        let ancestors: Vec<String> = path.ancestors().iter().map(ToString::to_string).collect();
        assert_eq!(ancestors, vec!["Manuals", "Manuals/printer", "Manuals/printer/user"]);

        assert_eq!(path.parent().unwrap().to_string(), "Manuals/printer");
        assert!(LogicalPath::parse("Manuals").unwrap().parent().is_none());
    }

    #[test]
    fn test_lookup_matching() {
        let stored = RemoteLookup::Present { hash: Some("abc123".into()) };
        assert!(stored.matches("abc123"));
        assert!(!stored.matches("ABC123"));
        assert!(!stored.matches("abc123 "));
        assert!(!RemoteLookup::Present { hash: None }.matches("abc123"));
        assert!(!RemoteLookup::Missing.matches("abc123"));
    }

    #[test]
    fn test_metadata_fields() {
        let metadata = UploadMetadata::new("abc123", "ManifestSource");
        let fields = metadata.to_fields("contentHash");
        assert_eq!(fields["contentHash"], "abc123");
        assert_eq!(fields["source"], "ManifestSource");
        assert_eq!(fields.len(), 2);
    }
}
