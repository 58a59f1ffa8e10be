//! Disk-backed object store
//!
//! Each object is stored as two files, sharded by the first two hex chars of
//! the BLAKE3 hash of its key:
//!
//! ```text
//! <root>/<shard>/<hash>.blob   raw content
//! <root>/<shard>/<hash>.json   ObjectMeta (key, size, content type, created at)
//! ```
//!
//! Keys never map to filesystem directories, so `users/u1/a` and
//! `users/u1/a/b` can coexist. An ordered in-memory index, rebuilt from the
//! metadata files on open, answers prefix listings.

use super::{ObjectMeta, ObjectStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

const BLOB_EXT: &str = "blob";
const META_EXT: &str = "json";

pub struct LocalObjectStore {
    base_path: PathBuf,
    index: RwLock<BTreeMap<String, ObjectMeta>>,
}

impl LocalObjectStore {
    /// Open (or create) a store at the given path and load its index
    pub fn open<P: AsRef<Path>>(base_path: P) -> Result<Self, StoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;

        let mut index = BTreeMap::new();
        for entry in walkdir::WalkDir::new(&base_path).min_depth(2).max_depth(2) {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(META_EXT)
            {
                continue;
            }

            let raw = std::fs::read(path)?;
            let meta: ObjectMeta = serde_json::from_slice(&raw).map_err(|source| {
                StoreError::Metadata {
                    path: path.display().to_string(),
                    source,
                }
            })?;
            index.insert(meta.path.clone(), meta);
        }

        tracing::info!("opened object store at {} ({} objects)", base_path.display(), index.len());

        Ok(Self {
            base_path,
            index: RwLock::new(index),
        })
    }

    /// Shard directory and file stem for a key
    fn locate(&self, key: &str) -> (PathBuf, String) {
        let hash = blake3::hash(key.as_bytes()).to_hex().to_string();
        let shard = self.base_path.join(&hash[..2]);
        (shard, hash)
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let (shard, hash) = self.locate(key);
        shard.join(format!("{}.{}", hash, BLOB_EXT))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        let (shard, hash) = self.locate(key);
        shard.join(format!("{}.{}", hash, META_EXT))
    }

    /// Write `content` to `target` via a temp file and rename
    async fn write_atomic(target: &Path, content: &[u8]) -> Result<(), StoreError> {
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::Backend(format!("no parent for {}", target.display())))?;
        fs::create_dir_all(parent).await?;

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&temp_path, content).await?;
        if let Err(e) = fs::rename(&temp_path, target).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn write_meta(&self, meta: &ObjectMeta) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(meta).map_err(|source| StoreError::Metadata {
            path: meta.path.clone(),
            source,
        })?;
        Self::write_atomic(&self.meta_path(&meta.path), &raw).await
    }
}

#[cfg(test)]
impl LocalObjectStore {
    /// Read an object's content
    pub async fn get(&self, path: &str) -> Result<Bytes, StoreError> {
        if !self.index.read().await.contains_key(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(Bytes::from(fs::read(self.blob_path(path)).await?))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<ObjectMeta>, StoreError> {
        let index = self.index.read().await;
        let matching = index
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, meta)| meta.clone());

        Ok(match limit {
            Some(n) => matching.take(n).collect(),
            None => matching.collect(),
        })
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>, StoreError> {
        Ok(self.index.read().await.get(path).cloned())
    }

    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<ObjectMeta, StoreError> {
        // Content first: a crash before the metadata lands leaves an invisible orphan
        Self::write_atomic(&self.blob_path(path), &data).await?;

        let meta = ObjectMeta {
            path: path.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            created_at: Utc::now(),
        };
        self.write_meta(&meta).await?;
        self.index.write().await.insert(path.to_string(), meta.clone());

        tracing::debug!("wrote object {} ({} bytes)", path, meta.size);
        Ok(meta)
    }

    async fn copy(&self, src: &str, dest: &str) -> Result<ObjectMeta, StoreError> {
        let src_meta = self
            .head(src)
            .await?
            .ok_or_else(|| StoreError::NotFound(src.to_string()))?;

        let dest_blob = self.blob_path(dest);
        let parent = dest_blob
            .parent()
            .ok_or_else(|| StoreError::Backend(format!("no parent for {}", dest_blob.display())))?
            .to_path_buf();
        fs::create_dir_all(&parent).await?;

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::copy(self.blob_path(src), &temp_path).await?;
        if let Err(e) = fs::rename(&temp_path, &dest_blob).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let meta = ObjectMeta {
            path: dest.to_string(),
            created_at: Utc::now(),
            ..src_meta
        };
        self.write_meta(&meta).await?;
        self.index.write().await.insert(dest.to_string(), meta.clone());

        tracing::debug!("copied object {} -> {}", src, dest);
        Ok(meta)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        if !self.index.read().await.contains_key(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }

        // Metadata first so the object disappears even if the blob removal fails
        fs::remove_file(self.meta_path(path)).await?;
        self.index.write().await.remove(path);

        match fs::remove_file(self.blob_path(path)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("orphaned blob for {}: {}", path, e),
        }

        tracing::debug!("deleted object {}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_store() {
        let temp = tempdir().unwrap();
        let store = LocalObjectStore::open(temp.path()).unwrap();

        let key = "users/u1/docs/readme.txt";

        // Initially doesn't exist
        assert!(!store.exists(key).await.unwrap());

        // Write object
        let meta = store
            .put(key, Bytes::from_static(b"hello world"), "text/plain")
            .await
            .unwrap();
        assert_eq!(meta.size, 11);
        assert!(store.exists(key).await.unwrap());

        // Read object
        assert_eq!(store.get(key).await.unwrap(), Bytes::from_static(b"hello world"));

        // Delete object
        store.delete(key).await.unwrap();
        assert!(!store.exists(key).await.unwrap());
        assert!(matches!(store.get(key).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_file_and_folder_keys_coexist() {
        let temp = tempdir().unwrap();
        let store = LocalObjectStore::open(temp.path()).unwrap();

        store.put("users/u1/a", Bytes::from_static(b"1"), "text/plain").await.unwrap();
        store.put("users/u1/a/b", Bytes::from_static(b"2"), "text/plain").await.unwrap();

        let listed = store.list("users/u1/a/", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "users/u1/a/b");
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let temp = tempdir().unwrap();
        {
            let store = LocalObjectStore::open(temp.path()).unwrap();
            store
                .put("users/u1/x.png", Bytes::from_static(b"png"), "image/png")
                .await
                .unwrap();
            store.copy("users/u1/x.png", "users/u1/y.png").await.unwrap();
        }

        let reopened = LocalObjectStore::open(temp.path()).unwrap();
        let listed = reopened.list("users/u1/", None).await.unwrap();
        let paths: Vec<&str> = listed.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["users/u1/x.png", "users/u1/y.png"]);
        assert_eq!(listed[1].content_type, "image/png");
        assert_eq!(
            reopened.get("users/u1/y.png").await.unwrap(),
            Bytes::from_static(b"png")
        );
    }
}
