//! Festa Storage Library
//!
//! Object-store adapters behind a single `Storage` trait. The S3 backend is
//! the production target; the local backend doubles as the durable staging
//! area for original upload bytes; the in-memory backend exists for tests.

use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;

pub use memory::MemoryStorage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A stored object's stable coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size_bytes: i64,
}

/// Object store contract used by the pipeline.
///
/// Failed uploads abort the surrounding job; successfully uploaded assets
/// that are later superseded (the optimistic preview) are explicitly
/// deleted once their replacement is live.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload bytes under `key`, returning the stable URL and stored size.
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject>;

    /// Read an object back in full.
    async fn download(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Stable URL for a key without a round trip.
    fn url_for(&self, key: &str) -> String;
}

/// Reject keys that could escape the backend's root.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|seg| seg == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("events/e1/media/a.jpg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("a/../../secret").is_err());
    }
}
