//! Configuration module
//!
//! Env-driven configuration for the pipeline worker: database, storage,
//! queue sizing, and upload limits.

use std::env;

use crate::constants::DEFAULT_MAX_FILE_SIZE_BYTES;

const DB_MAX_CONNECTIONS: u32 = 20;
const DB_TIMEOUT_SECS: u64 = 30;
const QUEUE_MAX_WORKERS: usize = 4;
const QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const QUEUE_MAX_RETRIES: i32 = 3;
const QUEUE_DEFAULT_TIMEOUT_SECS: i32 = 600;

/// Storage backend selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

impl StorageBackend {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            other => Err(anyhow::anyhow!("Invalid storage backend: {}", other)),
        }
    }
}

/// Pipeline worker configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Storage
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    /// Durable staging area for original upload bytes. Must survive the
    /// synchronous request so the background worker can read them later.
    pub staging_path: String,
    // Queue
    pub queue_max_workers: usize,
    pub queue_poll_interval_ms: u64,
    pub queue_max_retries: i32,
    pub queue_default_timeout_seconds: i32,
    // Upload limits
    pub max_file_size_bytes: usize,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = require_env("DATABASE_URL")?;

        let storage_backend = StorageBackend::parse(
            &env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string()),
        )?;

        let config = Self {
            database_url,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            db_timeout_seconds: parse_env("DB_TIMEOUT_SECONDS", DB_TIMEOUT_SECS),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            staging_path: env::var("STAGING_PATH")
                .unwrap_or_else(|_| "/var/lib/festa/staging".to_string()),
            queue_max_workers: parse_env("QUEUE_MAX_WORKERS", QUEUE_MAX_WORKERS),
            queue_poll_interval_ms: parse_env("QUEUE_POLL_INTERVAL_MS", QUEUE_POLL_INTERVAL_MS),
            queue_max_retries: parse_env("QUEUE_MAX_RETRIES", QUEUE_MAX_RETRIES),
            queue_default_timeout_seconds: parse_env(
                "QUEUE_DEFAULT_TIMEOUT_SECONDS",
                QUEUE_DEFAULT_TIMEOUT_SECS,
            ),
            max_file_size_bytes: parse_env("MAX_FILE_SIZE_BYTES", DEFAULT_MAX_FILE_SIZE_BYTES),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_none() {
            anyhow::bail!("S3_BUCKET is required when STORAGE_BACKEND=s3");
        }
        if self.queue_max_workers == 0 {
            anyhow::bail!("QUEUE_MAX_WORKERS must be at least 1");
        }
        Ok(())
    }
}

fn require_env(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("{} must be set", key))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!(StorageBackend::parse("s3").unwrap(), StorageBackend::S3);
        assert_eq!(
            StorageBackend::parse("LOCAL").unwrap(),
            StorageBackend::Local
        );
        assert!(StorageBackend::parse("ftp").is_err());
    }
}
