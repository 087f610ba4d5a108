use super::{LogicalPath, RemoteLookup, RemoteStore, UploadMetadata};
use crate::utils::errors::{Result, SyncError};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// An object held by [`InMemoryStore`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content: Bytes,
    pub content_hash: Option<String>,
    pub source: Option<String>,
}

/// Process-local store. Uploading into a folder that was never ensured fails,
/// mirroring a real document library.
pub struct InMemoryStore {
    objects: DashMap<String, StoredObject>,
    folders: DashSet<String>,
    uploads: AtomicUsize,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            folders: DashSet::new(),
            uploads: AtomicUsize::new(0),
        }
    }

    /// Seed an object, creating its folders. `hash = None` models an object
    /// that exists but carries no hash metadata.
    pub fn insert(&self, path: &LogicalPath, filename: &str, content: Bytes, hash: Option<&str>) {
        for folder in path.ancestors() {
            self.folders.insert(folder.to_string());
        }
        self.objects.insert(
            path.object_key(filename),
            StoredObject {
                content,
                content_hash: hash.map(str::to_string),
                source: None,
            },
        );
    }

    pub fn get(&self, path: &LogicalPath, filename: &str) -> Option<StoredObject> {
        self.objects
            .get(&path.object_key(filename))
            .map(|entry| entry.value().clone())
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.folders.contains(path)
    }

    /// Number of stored objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Successful uploads since creation
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn hash_at(&self, path: &LogicalPath, filename: &str) -> Result<RemoteLookup> {
        Ok(match self.objects.get(&path.object_key(filename)) {
            Some(entry) => RemoteLookup::Present {
                hash: entry.content_hash.clone(),
            },
            None => RemoteLookup::Missing,
        })
    }

    async fn ensure_path(&self, path: &LogicalPath) -> Result<()> {
        for folder in path.ancestors() {
            self.folders.insert(folder.to_string());
        }
        Ok(())
    }

    async fn upload(
        &self,
        path: &LogicalPath,
        filename: &str,
        content: Bytes,
        metadata: &UploadMetadata,
    ) -> Result<()> {
        if !self.folders.contains(&path.to_string()) {
            return Err(SyncError::Store(format!("folder '{}' does not exist", path)));
        }

        self.objects.insert(
            path.object_key(filename),
            StoredObject {
                content,
                content_hash: Some(metadata.content_hash().to_string()),
                source: Some(metadata.source().to_string()),
            },
        );
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
