//! Object storage
//!
//! A flat key/value store of opaque blobs. There are no real directories:
//! a "folder" is just the common prefix of the keys below it.

pub mod error;
pub mod local;
pub mod memory;
pub mod mutator;
pub mod path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::{MutationError, StoreError};
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use mutator::{FolderOperationResult, ItemError, StorageMutator};

/// Metadata describing one stored object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub path: String,
    pub size: u64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic object store client
///
/// Implementations give no cross-object atomicity. `copy` overwrites an
/// existing destination.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List objects whose key starts with `prefix`, in key order
    async fn list(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<ObjectMeta>, StoreError>;

    /// Metadata for a single object, `None` when absent
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>, StoreError>;

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.head(path).await?.is_some())
    }

    /// Write an object, replacing any previous content
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<ObjectMeta, StoreError>;

    /// Server-side copy of `src` to `dest`
    async fn copy(&self, src: &str, dest: &str) -> Result<ObjectMeta, StoreError>;

    /// Remove an object; `NotFound` when absent
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

/// Build the store selected by configuration; called once at startup
pub async fn open_store(config: &crate::config::Config) -> Result<std::sync::Arc<dyn ObjectStore>, StoreError> {
    use crate::config::StorageBackend;
    use std::sync::Arc;

    let store: Arc<dyn ObjectStore> = match config.storage_backend {
        StorageBackend::Local => {
            // Index rebuild walks the whole store with blocking I/O
            let path = config.storage_path.clone();
            let local = tokio::task::spawn_blocking(move || LocalObjectStore::open(path))
                .await
                .map_err(|e| StoreError::Backend(format!("store open task failed: {}", e)))??;
            Arc::new(local)
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory object store; contents are lost on exit");
            Arc::new(MemoryObjectStore::new())
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageBackend};

    #[tokio::test]
    async fn test_open_local_store_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage_backend: StorageBackend::Local,
            storage_path: dir.path().to_string_lossy().into_owned(),
            ..Config::for_tests()
        };

        let store = open_store(&config).await.unwrap();
        assert!(store.list("users/", None).await.unwrap().is_empty());
        store
            .put("users/u1/a.txt", Bytes::from_static(b"a"), "text/plain")
            .await
            .unwrap();
        drop(store);

        let reopened = open_store(&config).await.unwrap();
        let listed = reopened.list("users/u1/", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "users/u1/a.txt");
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let store = open_store(&Config::for_tests()).await.unwrap();
        assert!(!store.exists("users/u1/a.txt").await.unwrap());
    }
}
