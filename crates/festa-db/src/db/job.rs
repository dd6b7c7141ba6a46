//! Job queue persistence.
//!
//! Jobs live in a Postgres table; claiming uses FOR UPDATE SKIP LOCKED so
//! concurrent workers never hand the same job to two handlers. A NOTIFY in
//! the enqueue transaction wakes idle workers without waiting for the next
//! poll tick.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use festa_core::models::{Job, JobKind, JobStatus, Priority};
use festa_core::AppError;

use super::JOB_COLUMNS;

/// Postgres NOTIFY channel pinged on every enqueue.
pub const JOB_NOTIFY_CHANNEL: &str = "festa_new_job";

#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a job and ping the notify channel in the same transaction.
    /// A failed NOTIFY is non-fatal; the poll loop will pick the job up.
    #[tracing::instrument(skip(self, payload), fields(kind = %kind))]
    pub async fn create_job(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        priority: Priority,
        scheduled_at: Option<DateTime<Utc>>,
        max_retries: i32,
        timeout_seconds: Option<i32>,
    ) -> Result<Job, AppError> {
        let mut tx = self.pool.begin().await?;

        let status = if scheduled_at.is_some() {
            JobStatus::Scheduled
        } else {
            JobStatus::Pending
        };

        let job = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            INSERT INTO jobs (id, kind, status, priority, payload, scheduled_at, max_retries, timeout_seconds)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()), $7, $8)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(kind.to_string())
        .bind(status)
        .bind(priority.as_i32())
        .bind(payload)
        .bind(scheduled_at)
        .bind(max_retries)
        .bind(timeout_seconds)
        .fetch_one(&mut *tx)
        .await?;

        if let Err(e) = sqlx::query("SELECT pg_notify($1, '')")
            .bind(JOB_NOTIFY_CHANNEL)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!("Failed to notify job channel: {}", e);
        }

        tx.commit().await?;

        tracing::debug!(job_id = %job.id, "Job enqueued");
        Ok(job)
    }

    /// Claim the highest-priority due job, if any. The claim moves the row
    /// to running before the transaction commits, so a claimed job is never
    /// visible to another worker.
    pub async fn claim_next_job(&self) -> Result<Option<Job>, AppError> {
        let mut tx = self.pool.begin().await?;

        let candidate = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            SELECT {}
            FROM jobs
            WHERE status IN ('pending', 'scheduled')
              AND scheduled_at <= NOW()
            ORDER BY priority DESC, scheduled_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
            JOB_COLUMNS
        ))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(candidate) = candidate else {
            tx.rollback().await?;
            return Ok(None);
        };

        let job = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'running', started_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(candidate.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(job))
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, AppError> {
        let job = sqlx::query_as::<Postgres, Job>(&format!(
            "SELECT {} FROM jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    #[tracing::instrument(skip(self, result))]
    pub async fn mark_completed(
        &self,
        job_id: Uuid,
        result: Option<serde_json::Value>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', result = $2, completed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal failure: retries exhausted or the error was unrecoverable.
    #[tracing::instrument(skip(self))]
    pub async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                result = jsonb_build_object('error', $2::text),
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Recoverable failure: bump the retry count and reschedule the same row
    /// with an exponential delay. Returns the updated job.
    #[tracing::instrument(skip(self))]
    pub async fn reschedule_for_retry(
        &self,
        job_id: Uuid,
        retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<Job, AppError> {
        let job = sqlx::query_as::<Postgres, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'scheduled',
                retry_count = retry_count + 1,
                scheduled_at = $2,
                result = jsonb_build_object('last_error', $3::text),
                started_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(job_id)
        .bind(retry_at)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    /// Put a claimed job back on the queue untouched, for when the worker
    /// pool is saturated. Does not count as a retry.
    pub async fn release_claim(&self, job_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', started_at = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cancel a job that has not started running yet.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_pending(&self, job_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'cancelled', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'scheduled')
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Requeue jobs stuck in running past their timeout, for workers that
    /// died without releasing their claim. Jobs with no timeout are left
    /// alone.
    #[tracing::instrument(skip(self))]
    pub async fn reclaim_stale_jobs(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', started_at = NULL, updated_at = NOW()
            WHERE status = 'running'
              AND timeout_seconds IS NOT NULL
              AND started_at < NOW() - (timeout_seconds * INTERVAL '1 second')
            "#,
        )
        .execute(&self.pool)
        .await?;

        let reclaimed = result.rows_affected();
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "Requeued stale running jobs");
        }
        Ok(reclaimed)
    }
}
