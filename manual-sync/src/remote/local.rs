//! Mirror into a local directory tree.
//!
//! `<root>/<path>/<filename>` holds the content and
//! `<root>/<path>/.sync-meta/<filename>.json` the metadata fields, so a later run
//! can compare hashes without reading content. Partial writes also live under
//! `.sync-meta`, which keeps them apart from any manifest filename.

use super::{LogicalPath, RemoteLookup, RemoteStore, UploadMetadata};
use crate::utils::errors::{Result, SyncError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Per-folder directory holding sidecars and in-flight writes.
const META_DIR: &str = ".sync-meta";

pub struct LocalDirStore {
    root: PathBuf,
    hash_field: String,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>, hash_field: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            hash_field: hash_field.into(),
        }
    }

    fn dir(&self, path: &LogicalPath) -> Result<PathBuf> {
        path.segments().iter().try_fold(self.root.clone(), |dir, segment| {
            check_reserved(segment)?;
            Ok(dir.join(segment))
        })
    }

    fn sidecar(dir: &Path, filename: &str) -> PathBuf {
        dir.join(META_DIR).join(format!("{}.json", filename))
    }

    /// Write via `.sync-meta/<filename><suffix>` and rename so readers never
    /// see partial files. Content and sidecar writes use different suffixes.
    async fn write_atomic(
        dir: &Path,
        filename: &str,
        suffix: &str,
        target: &Path,
        data: &[u8],
    ) -> Result<()> {
        let tmp = dir.join(META_DIR).join(format!("{}{}", filename, suffix));

        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, target).await?;
        Ok(())
    }
}

fn check_reserved(name: &str) -> Result<()> {
    if name == META_DIR {
        return Err(SyncError::InvalidPath(format!("'{}' is reserved by the local store", name)));
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for LocalDirStore {
    async fn hash_at(&self, path: &LogicalPath, filename: &str) -> Result<RemoteLookup> {
        check_reserved(filename)?;
        let dir = self.dir(path)?;

        match tokio::fs::metadata(dir.join(filename)).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(RemoteLookup::Missing),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RemoteLookup::Missing),
            Err(e) => return Err(e.into()),
        }

        let raw = match tokio::fs::read(Self::sidecar(&dir, filename)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(RemoteLookup::Present { hash: None })
            }
            Err(e) => return Err(e.into()),
        };

        let fields: Map<String, Value> = serde_json::from_slice(&raw)?;
        let hash = fields
            .get(&self.hash_field)
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(RemoteLookup::Present { hash })
    }

    async fn ensure_path(&self, path: &LogicalPath) -> Result<()> {
        tokio::fs::create_dir_all(self.dir(path)?.join(META_DIR)).await?;
        Ok(())
    }

    async fn upload(
        &self,
        path: &LogicalPath,
        filename: &str,
        content: Bytes,
        metadata: &UploadMetadata,
    ) -> Result<()> {
        check_reserved(filename)?;
        let dir = self.dir(path)?;
        let fields = serde_json::to_vec_pretty(&metadata.to_fields(&self.hash_field))?;

        Self::write_atomic(&dir, filename, ".partial", &dir.join(filename), &content).await?;
        Self::write_atomic(&dir, filename, ".json.partial-meta", &Self::sidecar(&dir, filename), &fields)
            .await?;

        debug!(path = %dir.display(), file_name = filename, bytes = content.len(), "Wrote local copy");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn path() -> LogicalPath {
        LogicalPath::parse("Manuals/printer/user/en").unwrap()
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirStore::new(temp_dir.path(), "contentHash");

        let lookup = store.hash_at(&path(), "manual.pdf").await.unwrap();
        assert_eq!(lookup, RemoteLookup::Missing);
    }

    #[tokio::test]
    async fn test_upload_writes_content_and_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirStore::new(temp_dir.path(), "contentHash");
        let metadata = UploadMetadata::new("abc123", "ManifestSource");

        store.ensure_path(&path()).await.unwrap();
        store.ensure_path(&path()).await.unwrap();
        store
            .upload(&path(), "manual.pdf", Bytes::from_static(b"%PDF"), &metadata)
            .await
            .unwrap();

        let dir = temp_dir.path().join("Manuals/printer/user/en");
        assert_eq!(fs::read(dir.join("manual.pdf")).unwrap(), b"%PDF");
        assert!(dir.join(".sync-meta/manual.pdf.json").exists());
        assert!(!dir.join(".sync-meta/manual.pdf.partial").exists());

        let lookup = store.hash_at(&path(), "manual.pdf").await.unwrap();
        assert!(lookup.matches("abc123"));
    }

    #[tokio::test]
    async fn test_upload_replaces_previous_version() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirStore::new(temp_dir.path(), "contentHash");

        store.ensure_path(&path()).await.unwrap();
        let v1 = UploadMetadata::new("v1", "test");
        let v2 = UploadMetadata::new("v2", "test");
        store.upload(&path(), "manual.pdf", Bytes::from_static(b"one"), &v1).await.unwrap();
        store.upload(&path(), "manual.pdf", Bytes::from_static(b"two"), &v2).await.unwrap();

        let dir = temp_dir.path().join("Manuals/printer/user/en");
        assert_eq!(fs::read(dir.join("manual.pdf")).unwrap(), b"two");
        assert!(store.hash_at(&path(), "manual.pdf").await.unwrap().matches("v2"));
    }

    #[tokio::test]
    async fn test_file_without_sidecar_has_no_hash() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Manuals/printer/user/en");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("manual.pdf"), b"legacy").unwrap();

        let store = LocalDirStore::new(temp_dir.path(), "contentHash");
        assert_eq!(
            store.hash_at(&path(), "manual.pdf").await.unwrap(),
            RemoteLookup::Present { hash: None }
        );
    }

    #[tokio::test]
    async fn test_lookalike_filenames_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirStore::new(temp_dir.path(), "contentHash");
        store.ensure_path(&path()).await.unwrap();

        let names = ["a.pdf", "a.pdf.partial", ".a.pdf.meta.json", "a.pdf.json"];
        for (i, name) in names.iter().enumerate() {
            let metadata = UploadMetadata::new(format!("h{}", i), "test");
            let content = Bytes::from(name.to_string());
            store.upload(&path(), name, content, &metadata).await.unwrap();
        }

        let dir = temp_dir.path().join("Manuals/printer/user/en");
        for (i, name) in names.iter().enumerate() {
            assert_eq!(fs::read(dir.join(name)).unwrap(), name.as_bytes());
            let lookup = store.hash_at(&path(), name).await.unwrap();
            assert!(lookup.matches(&format!("h{}", i)), "{} -> {:?}", name, lookup);
        }
    }

    #[tokio::test]
    async fn test_reserved_name_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirStore::new(temp_dir.path(), "contentHash");
        let metadata = UploadMetadata::new("abc123", "test");

        store.ensure_path(&path()).await.unwrap();
        let err = store
            .upload(&path(), ".sync-meta", Bytes::from_static(b"x"), &metadata)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidPath(_)));

        let nested = LogicalPath::parse("Manuals/.sync-meta/en").unwrap();
        assert!(matches!(
            store.ensure_path(&nested).await,
            Err(SyncError::InvalidPath(_))
        ));
    }
}
