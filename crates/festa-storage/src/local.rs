//! Local filesystem backend.
//!
//! Serves two roles: development object storage, and the durable staging
//! area for original upload bytes. Staged files must outlive the request
//! that wrote them so a worker process (possibly restarted) can read them
//! later; anything memory-resident would break at-least-once processing.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::{validate_key, Storage, StorageError, StorageResult, StoredObject};

#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(Path::new(key))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    #[tracing::instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn upload(
        &self,
        key: &str,
        _content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size_bytes = data.len() as i64;
        tokio::fs::write(&path, &data).await?;

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            size_bytes,
        })
    }

    async fn download(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_download_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/files").unwrap();

        let stored = storage
            .upload("events/e1/a.jpg", "image/jpeg", Bytes::from_static(b"abc"))
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 3);
        assert_eq!(stored.url, "http://localhost:8080/files/events/e1/a.jpg");

        let data = storage.download("events/e1/a.jpg").await.unwrap();
        assert_eq!(&data[..], b"abc");

        storage.delete("events/e1/a.jpg").await.unwrap();
        assert!(matches!(
            storage.download("events/e1/a.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost").unwrap();
        storage.delete("nope/missing.bin").await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost").unwrap();
        let err = storage
            .upload("../escape.txt", "text/plain", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
