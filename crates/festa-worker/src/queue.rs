//! Job queue: worker pool, LISTEN/NOTIFY or polling, retry, and submission.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use festa_core::models::{Job, JobKind, JobPayload, Priority};
use festa_core::JobError;
use festa_db::{JobRepository, JOB_NOTIFY_CHANNEL};

use crate::context::JobHandlerContext;

#[derive(Clone)]
pub struct JobQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub default_timeout_seconds: i32,
    pub max_retries: i32,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            default_timeout_seconds: 600,
            max_retries: 3,
        }
    }
}

pub struct JobQueue {
    repository: JobRepository,
    config: JobQueueConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl JobQueue {
    /// Create a new JobQueue with a weak reference to the dispatch context.
    ///
    /// If `pool` is `Some`, the worker uses PostgreSQL LISTEN/NOTIFY to wake
    /// immediately when jobs are enqueued, in addition to polling at
    /// `poll_interval_ms`. If `pool` is `None`, only polling is used.
    pub fn new(
        repository: JobRepository,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        pool: Option<sqlx::PgPool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let repo_clone = repository.clone();
        let config_clone = config.clone();
        tokio::spawn(async move {
            Self::worker_pool(repo_clone, config_clone, context, shutdown_rx, pool).await;
        });

        Self {
            repository,
            config,
            shutdown_tx,
        }
    }

    /// Creates a JobQueue that does not spawn a worker. Jobs submitted here
    /// are written to the DB and will be picked up by a real worker.
    pub fn new_no_worker(repository: JobRepository, config: JobQueueConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        drop(shutdown_rx);
        Self {
            repository,
            config,
            shutdown_tx,
        }
    }

    /// Submit a typed job to the queue.
    #[tracing::instrument(skip(self, payload))]
    pub async fn submit<P: JobPayload>(
        &self,
        payload: &P,
        priority: Priority,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid> {
        let value = serde_json::to_value(payload).context("Failed to serialize job payload")?;
        self.submit_job(P::kind(), value, priority, scheduled_at)
            .await
    }

    /// Submit a raw payload. Prefer [`submit`] for typed payloads.
    #[tracing::instrument(skip(self, payload))]
    pub async fn submit_job(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        priority: Priority,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Uuid> {
        let job = self
            .repository
            .create_job(
                kind.clone(),
                payload,
                priority,
                scheduled_at,
                self.config.max_retries,
                Some(self.config.default_timeout_seconds),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    kind = %kind,
                    priority = priority.as_i32(),
                    "Failed to create job in repository"
                );
                anyhow::anyhow!("Failed to create job in repository: {}", e)
            })?;

        tracing::info!(
            job_id = %job.id,
            kind = %kind,
            priority = priority.as_i32(),
            "Job submitted to queue"
        );

        Ok(job.id)
    }

    async fn worker_pool(
        repository: JobRepository,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        mut shutdown_rx: mpsc::Receiver<()>,
        pool: Option<sqlx::PgPool>,
    ) {
        let use_listen = pool.is_some();
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            listen_notify = use_listen,
            "Job queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        // Channel to wake the main loop when LISTEN receives a NOTIFY.
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);
        if let Some(pool) = pool {
            let tx = notify_tx.clone();
            tokio::spawn(async move {
                loop {
                    match sqlx::postgres::PgListener::connect_with(&pool).await {
                        Ok(mut listener) => {
                            if let Err(e) = listener.listen(JOB_NOTIFY_CHANNEL).await {
                                tracing::warn!(error = %e, "LISTEN failed, will retry");
                                tokio::time::sleep(Duration::from_secs(5)).await;
                                continue;
                            }
                            while listener.recv().await.is_ok() {
                                let _ = tx.send(()).await;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "PgListener connect failed, will retry");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            });
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                _ = notify_rx.recv() => {
                    // Woken by LISTEN/NOTIFY; try to claim one job immediately.
                    Self::claim_and_dispatch_one(&repository, &semaphore, &context).await;
                }
                _ = sleep(poll_interval) => {
                    if let Err(e) = repository.reclaim_stale_jobs().await {
                        tracing::warn!(error = %e, "Failed to reclaim stale jobs");
                    }
                    Self::claim_and_dispatch_one(&repository, &semaphore, &context).await;
                }
            }
        }

        tracing::info!("Job queue worker pool stopped");
    }

    async fn claim_and_dispatch_one(
        repository: &JobRepository,
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn JobHandlerContext>,
    ) {
        match repository.claim_next_job().await {
            Ok(Some(job)) => {
                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::debug!("No workers available, releasing claim");
                        let _ = repository.release_claim(job.id).await;
                        return;
                    }
                };

                let repo = repository.clone();
                let ctx = context.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = Self::process_job_with_retry(job, repo, ctx).await {
                        tracing::error!(error = %e, "Job processing failed after retries");
                    }
                });
            }
            Ok(None) => {
                tracing::trace!("No jobs available in queue");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to claim job from queue");
            }
        }
    }

    #[tracing::instrument(skip(repository, context), fields(job.id = %job.id, job.kind = %job.kind))]
    async fn process_job_with_retry(
        job: Job,
        repository: JobRepository,
        context: Weak<dyn JobHandlerContext>,
    ) -> Result<()> {
        let ctx = context
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("JobHandlerContext was dropped, cannot process job"))?;

        let timeout_duration = job
            .timeout_seconds
            .map(|s| Duration::from_secs(s as u64))
            .unwrap_or(Duration::from_secs(600));

        let result = tokio::time::timeout(timeout_duration, ctx.dispatch_job(&job)).await;

        match result {
            Ok(Ok(job_result)) => {
                repository
                    .mark_completed(job.id, Some(job_result))
                    .await
                    .context("Failed to mark job as completed")?;
                tracing::info!(job_id = %job.id, kind = %job.kind, "Job completed successfully");
                Ok(())
            }
            Ok(Err(e)) => {
                let is_unrecoverable = e
                    .downcast_ref::<JobError>()
                    .map(|je| !je.is_recoverable())
                    .unwrap_or(false);

                tracing::error!(
                    job_id = %job.id,
                    error = %e,
                    retry_count = job.retry_count,
                    max_retries = job.max_retries,
                    unrecoverable = is_unrecoverable,
                    "Job execution failed"
                );

                if is_unrecoverable {
                    repository
                        .mark_failed(job.id, &e.to_string())
                        .await
                        .context("Failed to mark job as failed")?;
                    tracing::error!(
                        job_id = %job.id,
                        "Job failed with unrecoverable error, will not retry"
                    );
                    return Err(e);
                }

                if job.can_retry() {
                    let backoff_seconds = 2_i64.pow(job.retry_count as u32);
                    let retry_at = Utc::now() + ChronoDuration::seconds(backoff_seconds);
                    tracing::info!(
                        job_id = %job.id,
                        retry_count = job.retry_count + 1,
                        backoff_seconds,
                        "Scheduling job retry"
                    );
                    repository
                        .reschedule_for_retry(job.id, retry_at, &e.to_string())
                        .await?;
                    Ok(())
                } else {
                    repository
                        .mark_failed(job.id, &e.to_string())
                        .await
                        .context("Failed to mark job as failed")?;
                    tracing::error!(job_id = %job.id, "Job failed after max retries");
                    Err(e)
                }
            }
            Err(_) => {
                tracing::error!(
                    job_id = %job.id,
                    timeout_seconds = ?job.timeout_seconds,
                    "Job execution timed out"
                );
                if job.can_retry() {
                    let backoff_seconds = 2_i64.pow(job.retry_count as u32);
                    let retry_at = Utc::now() + ChronoDuration::seconds(backoff_seconds);
                    repository
                        .reschedule_for_retry(job.id, retry_at, "Job execution timed out")
                        .await?;
                    Ok(())
                } else {
                    repository
                        .mark_failed(job.id, "Job execution timed out")
                        .await?;
                    Err(anyhow::anyhow!("Job execution timed out"))
                }
            }
        }
    }

    /// Cancel a job that has not started running. Returns false when the
    /// job was already claimed or finished.
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool> {
        let cancelled = self
            .repository
            .cancel_pending(job_id)
            .await
            .context("Failed to cancel job")?;
        if cancelled {
            tracing::info!(job_id = %job_id, "Job cancelled");
        }
        Ok(cancelled)
    }

    pub async fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl Clone for JobQueue {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            config: self.config.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }
}
