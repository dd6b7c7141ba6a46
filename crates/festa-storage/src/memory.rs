//! In-memory storage backend for tests.
//!
//! Not durable across restarts, so never suitable for the staging area in
//! production; useful for exercising the pipeline without a filesystem.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::{validate_key, Storage, StorageError, StorageResult, StoredObject};

#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Bytes>>,
    base_url: String,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            base_url: "memory://bucket".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().unwrap().contains_key(key)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload(
        &self,
        key: &str,
        _content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject> {
        validate_key(key)?;
        let size_bytes = data.len() as i64;
        self.objects
            .write()
            .unwrap()
            .insert(key.to_string(), data);
        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            size_bytes,
        })
    }

    async fn download(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        self.objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.write().unwrap().remove(key);
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let storage = MemoryStorage::new();
        storage
            .upload("a/b.webp", "image/webp", Bytes::from_static(b"riff"))
            .await
            .unwrap();
        assert!(storage.contains("a/b.webp"));
        assert_eq!(&storage.download("a/b.webp").await.unwrap()[..], b"riff");

        storage.delete("a/b.webp").await.unwrap();
        assert!(storage.is_empty());
    }
}
