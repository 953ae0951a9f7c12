//! Blob storage for run artifacts.
//!
//! Downloaded XML documents, the run manifest, and the CSV extracts all
//! live under run-scoped keys (`{run_id}/...`). The trait keeps the
//! orchestration code independent of where the blobs actually live; the
//! filesystem backend is the production one and the in-memory backend
//! exists for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::Result;

/// Key/value blob storage. Keys use `/` separators regardless of
/// platform; `list` returns keys, never contents.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put(&self, key: &str, content: &[u8], content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    /// Keys starting with `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Filesystem-backed storage rooted at a directory; keys map to
/// relative paths beneath it.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/') {
            path.push(part);
        }
        path
    }
}

#[async_trait]
impl BlobStorage for FsStorage {
    async fn put(&self, key: &str, content: &[u8], content_type: &str) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!(key, content_type, bytes = content.len(), "stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-memory storage for tests.
#[derive(Default)]
pub struct InMemoryStorage {
    blobs: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorage for InMemoryStorage {
    async fn put(&self, key: &str, content: &[u8], content_type: &str) -> Result<()> {
        let mut blobs = self.blobs.lock().unwrap();
        blobs.insert(key.to_string(), content.to_vec());
        debug!(key, content_type, bytes = content.len(), "stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().unwrap();
        Ok(blobs.get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let blobs = self.blobs.lock().unwrap();
        Ok(blobs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn fs_storage_round_trips_nested_keys() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        storage
            .put("run-1/xml/100.xml", b"<document/>", "text/xml")
            .await
            .unwrap();

        let got = storage.get("run-1/xml/100.xml").await.unwrap();
        assert_eq!(got.as_deref(), Some(b"<document/>".as_ref()));
        assert_eq!(storage.get("run-1/xml/missing.xml").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fs_storage_lists_by_prefix_in_order() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        storage.put("run-1/xml/2.xml", b"b", "text/xml").await.unwrap();
        storage.put("run-1/xml/1.xml", b"a", "text/xml").await.unwrap();
        storage.put("run-1/manifest.txt", b"m", "text/plain").await.unwrap();
        storage.put("run-2/xml/9.xml", b"c", "text/xml").await.unwrap();

        let keys = storage.list("run-1/xml").await.unwrap();
        assert_eq!(keys, vec!["run-1/xml/1.xml", "run-1/xml/2.xml"]);
    }

    #[tokio::test]
    async fn in_memory_storage_behaves_like_fs_storage() {
        let storage = InMemoryStorage::new();
        storage.put("run-1/xml/1.xml", b"a", "text/xml").await.unwrap();
        storage.put("run-1/manifest.txt", b"1", "text/plain").await.unwrap();

        assert_eq!(
            storage.list("run-1/xml").await.unwrap(),
            vec!["run-1/xml/1.xml"]
        );
        assert_eq!(storage.get("run-1/xml/1.xml").await.unwrap(), Some(b"a".to_vec()));
    }
}
