use super::{ObjectMeta, ObjectStore, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Ephemeral in-memory object store, ordered by key
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, (ObjectMeta, Bytes)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryObjectStore {
    /// Read an object's content
    pub async fn get(&self, path: &str) -> Result<Bytes, StoreError> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<ObjectMeta>, StoreError> {
        let objects = self.objects.read().await;
        let matching = objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, (meta, _))| meta.clone());

        Ok(match limit {
            Some(n) => matching.take(n).collect(),
            None => matching.collect(),
        })
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>, StoreError> {
        Ok(self.objects.read().await.get(path).map(|(meta, _)| meta.clone()))
    }

    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<ObjectMeta, StoreError> {
        let meta = ObjectMeta {
            path: path.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            created_at: Utc::now(),
        };
        self.objects
            .write()
            .await
            .insert(path.to_string(), (meta.clone(), data));
        Ok(meta)
    }

    async fn copy(&self, src: &str, dest: &str) -> Result<ObjectMeta, StoreError> {
        let mut objects = self.objects.write().await;
        let (src_meta, data) = objects
            .get(src)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(src.to_string()))?;

        let meta = ObjectMeta {
            path: dest.to_string(),
            created_at: Utc::now(),
            ..src_meta
        };
        objects.insert(dest.to_string(), (meta.clone(), data));
        Ok(meta)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.objects
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}
