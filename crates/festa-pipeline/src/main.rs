//! Pipeline worker binary.
//!
//! Connects to Postgres, runs migrations, wires the storage backends, and
//! runs the job queue until interrupted. Upload submission arrives through
//! the library API; this process owns the background half.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use festa_core::config::StorageBackend;
use festa_core::Config;
use festa_db::{EventRepository, JobRepository, MediaRepository};
use festa_pipeline::PipelineState;
use festa_realtime::{EventBroadcaster, ProgressTracker};
use festa_storage::{LocalStorage, S3Storage, Storage};
use festa_worker::{JobHandlerContext, JobQueue, JobQueueConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env()?;
    tracing::info!(environment = %config.environment, "Configuration loaded");

    let pool = setup_database(&config).await?;
    let storage = setup_storage(&config).await?;
    let staging: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(config.staging_path.as_str(), "file://local/staging")
            .context("Failed to initialize staging storage")?,
    );

    let jobs = JobRepository::new(pool.clone());
    let queue_config = JobQueueConfig {
        max_workers: config.queue_max_workers,
        poll_interval_ms: config.queue_poll_interval_ms,
        default_timeout_seconds: config.queue_default_timeout_seconds,
        max_retries: config.queue_max_retries,
    };

    // The state needs a queue handle for submissions before the dispatching
    // worker can exist, so it gets a worker-less one; the real worker below
    // picks up everything either of them enqueues.
    let state = Arc::new(PipelineState {
        media: MediaRepository::new(pool.clone()),
        events: EventRepository::new(pool.clone()),
        jobs: jobs.clone(),
        storage,
        staging,
        queue: JobQueue::new_no_worker(jobs.clone(), queue_config.clone()),
        broadcaster: EventBroadcaster::new(),
        tracker: ProgressTracker::new(),
        config,
    });

    let context: Arc<dyn JobHandlerContext> = state.clone();
    let worker = JobQueue::new(
        jobs,
        queue_config,
        Arc::downgrade(&context),
        Some(pool.clone()),
    );

    tracing::info!("Pipeline worker running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutdown signal received");
    worker.shutdown().await;
    pool.close().await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn setup_database(config: &Config) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    match config.storage_backend {
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .context("S3_BUCKET is required when STORAGE_BACKEND=s3")?;
            let region = config
                .s3_region
                .clone()
                .unwrap_or_else(|| "us-east-1".to_string());
            let storage = S3Storage::new(bucket, region, config.s3_endpoint.clone()).await?;
            Ok(Arc::new(storage))
        }
        StorageBackend::Local => {
            let root = config
                .local_storage_path
                .clone()
                .unwrap_or_else(|| "/var/lib/festa/media".to_string());
            let base_url = config
                .local_storage_base_url
                .clone()
                .unwrap_or_else(|| "file://local/media".to_string());
            let storage =
                LocalStorage::new(root.as_str(), base_url)
                    .context("Failed to initialize local storage")?;
            Ok(Arc::new(storage))
        }
    }
}
