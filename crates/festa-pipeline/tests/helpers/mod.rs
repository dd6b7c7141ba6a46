//! Shared fixtures for pipeline integration tests.
//!
//! Every test gets its own Postgres container, a migrated schema, and
//! in-memory object stores, so tests share nothing and need no external
//! services. The queue is constructed without a worker; tests claim jobs
//! themselves and drive the handler directly.

use std::sync::Arc;

use bytes::Bytes;
use sqlx::postgres::PgPoolOptions;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

use festa_core::config::StorageBackend;
use festa_core::models::{Job, Uploader};
use festa_core::Config;
use festa_db::{EventRepository, JobRepository, MediaRepository};
use festa_pipeline::upload::UploadRequest;
use festa_pipeline::PipelineState;
use festa_realtime::{EventBroadcaster, ProgressTracker};
use festa_storage::{MemoryStorage, Storage};
use festa_worker::{JobQueue, JobQueueConfig};

pub struct TestPipeline {
    pub state: Arc<PipelineState>,
    pub storage: Arc<MemoryStorage>,
    pub staging: Arc<MemoryStorage>,
    _container: ContainerAsync<Postgres>,
}

pub async fn setup() -> TestPipeline {
    let container = Postgres::default()
        .start()
        .await
        .expect("failed to start postgres container");
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("container port");
    let database_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to test database");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let config = test_config(database_url);
    let storage = Arc::new(MemoryStorage::new());
    let staging = Arc::new(MemoryStorage::new());
    let jobs = JobRepository::new(pool.clone());
    let queue = JobQueue::new_no_worker(
        jobs.clone(),
        JobQueueConfig {
            max_workers: 1,
            poll_interval_ms: 100,
            default_timeout_seconds: 60,
            max_retries: config.queue_max_retries,
        },
    );

    let state = Arc::new(PipelineState {
        config,
        media: MediaRepository::new(pool.clone()),
        events: EventRepository::new(pool.clone()),
        jobs,
        storage: storage.clone() as Arc<dyn Storage>,
        staging: staging.clone() as Arc<dyn Storage>,
        queue,
        broadcaster: EventBroadcaster::new(),
        tracker: ProgressTracker::new(),
    });

    TestPipeline {
        state,
        storage,
        staging,
        _container: container,
    }
}

fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        db_max_connections: 5,
        db_timeout_seconds: 30,
        storage_backend: StorageBackend::Local,
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        local_storage_path: None,
        local_storage_base_url: None,
        staging_path: "/tmp/festa-test-staging".to_string(),
        queue_max_workers: 1,
        queue_poll_interval_ms: 100,
        queue_max_retries: 3,
        queue_default_timeout_seconds: 60,
        max_file_size_bytes: 16 * 1024 * 1024,
        environment: "test".to_string(),
    }
}

/// Deterministic PNG fixture; identical calls produce identical bytes.
pub fn sample_png(width: u32, height: u32) -> Bytes {
    use image::{DynamicImage, Rgba, RgbaImage};

    let mut img = RgbaImage::new(width, height);
    for (x, y, px) in img.enumerate_pixels_mut() {
        *px = Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]);
    }
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("png encode");
    Bytes::from(out.into_inner())
}

pub fn image_upload(event_id: Uuid, uploader: Uploader) -> UploadRequest {
    UploadRequest {
        event_id,
        album_id: None,
        filename: "beach.png".to_string(),
        content_type: "image/png".to_string(),
        data: sample_png(1200, 900),
        uploader,
    }
}

pub fn registered_uploader() -> Uploader {
    Uploader::User {
        user_id: Uuid::new_v4(),
    }
}

pub fn guest_uploader(name: &str) -> Uploader {
    Uploader::Guest {
        session_id: Uuid::new_v4(),
        display_name: Some(name.to_string()),
    }
}

/// Claim the next due job, failing the test if the queue is empty.
pub async fn claim_job(state: &PipelineState) -> Job {
    state
        .jobs
        .claim_next_job()
        .await
        .expect("claim query failed")
        .expect("a job should be queued")
}
