//! Media repository.
//!
//! Owns every write to media rows and, crucially, the transactional coupling
//! between approval-status transitions and the event/participant counters.
//! The counter math itself lives in `festa_core::models::approval`; this
//! module only ever applies the deltas it computes, inside the same
//! transaction as the status write.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use festa_core::models::{
    counter_delta, pending_delta, ApprovalDecision, ApprovalStatus, EventStats, MediaRecord,
    MediaType, MediaVariant, ProcessingStatus, Uploader,
};
use festa_core::models::media::MediaMetadata;
use festa_core::AppError;

use super::MEDIA_COLUMNS;

#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

/// Inputs for the single transactional write at the end of a processing job.
#[derive(Debug, Clone)]
pub struct FinalizeParams {
    pub media_id: Uuid,
    pub original_key: String,
    pub original_url: String,
    pub variants: Vec<MediaVariant>,
    pub metadata: MediaMetadata,
    pub decision: ApprovalDecision,
}

/// Result of the finalize transaction.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    /// False when a redelivered job found the record already completed; the
    /// caller must skip counter-dependent side effects (broadcast, preview
    /// deletion already happened).
    pub applied: bool,
    pub record: MediaRecord,
    pub stats: EventStats,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the optimistic placeholder written by the synchronous path.
    #[tracing::instrument(skip(self, record), fields(media_id = %record.id, event_id = %record.event_id))]
    pub async fn insert_placeholder(&self, record: &MediaRecord) -> Result<(), AppError> {
        let (uploaded_by, guest_session_id, guest_display_name) = uploader_columns(&record.uploader);

        let variants = serde_json::to_value(&record.variants)
            .map_err(|e| AppError::Internal(format!("Failed to serialize variants: {}", e)))?;
        let metadata = serde_json::to_value(&record.metadata)
            .map_err(|e| AppError::Internal(format!("Failed to serialize metadata: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO media (
                id, event_id, album_id, media_type, original_filename, content_type,
                file_size, uploaded_by, guest_session_id, guest_display_name,
                original_key, original_url, preview_key, preview_url,
                variants, metadata,
                processing_status, current_stage, progress, job_id, retry_count,
                started_at, completed_at, error_message,
                approval_status, approved_by, approved_at, rejection_reason, approval_reason
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24,
                $25, $26, $27, $28, $29
            )
            "#,
        )
        .bind(record.id)
        .bind(record.event_id)
        .bind(record.album_id)
        .bind(record.media_type.to_string())
        .bind(&record.original_filename)
        .bind(&record.content_type)
        .bind(record.file_size)
        .bind(uploaded_by)
        .bind(guest_session_id)
        .bind(guest_display_name)
        .bind(&record.original_key)
        .bind(&record.original_url)
        .bind(&record.preview_key)
        .bind(&record.preview_url)
        .bind(variants)
        .bind(metadata)
        .bind(record.processing.status.to_string())
        .bind(&record.processing.current_stage)
        .bind(record.processing.progress)
        .bind(record.processing.job_id)
        .bind(record.processing.retry_count)
        .bind(record.processing.started_at)
        .bind(record.processing.completed_at)
        .bind(&record.processing.error_message)
        .bind(record.approval.status.to_string())
        .bind(record.approval.approved_by)
        .bind(record.approval.approved_at)
        .bind(&record.approval.rejection_reason)
        .bind(&record.approval.auto_reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, media_id: Uuid) -> Result<Option<MediaRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, MediaRecord>(&format!(
            "SELECT {} FROM media WHERE id = $1",
            MEDIA_COLUMNS
        ))
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Link the freshly enqueued job to its placeholder record.
    pub async fn assign_job(&self, media_id: Uuid, job_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE media SET job_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(media_id)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark the record as actively processing under the given job. A record
    /// that already completed is left alone; redelivered jobs must not walk
    /// it backwards.
    #[tracing::instrument(skip(self))]
    pub async fn mark_processing_started(
        &self,
        media_id: Uuid,
        job_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE media
            SET processing_status = 'processing',
                job_id = $2,
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id = $1 AND processing_status <> 'completed'
            "#,
        )
        .bind(media_id)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Durable stage checkpoint. Progress only moves forward; a late or
    /// redelivered update can never walk it backwards.
    #[tracing::instrument(skip(self))]
    pub async fn update_stage(
        &self,
        media_id: Uuid,
        stage: &str,
        progress: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE media
            SET current_stage = $2,
                progress = GREATEST(progress, $3),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(media_id)
        .bind(stage)
        .bind(progress)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark the record failed with a human-readable message and bump the
    /// retry count. Returns the new retry count, or `None` when the record
    /// is gone or already completed: a late failure from a redelivered job
    /// must not flip a completed record back to failed. No counters move
    /// here; a failed record was never counted.
    #[tracing::instrument(skip(self))]
    pub async fn mark_failed(
        &self,
        media_id: Uuid,
        error_message: &str,
    ) -> Result<Option<i32>, AppError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE media
            SET processing_status = 'failed',
                error_message = $2,
                retry_count = retry_count + 1,
                updated_at = NOW()
            WHERE id = $1 AND processing_status <> 'completed'
            RETURNING retry_count
            "#,
        )
        .bind(media_id)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }

    /// Reset a failed record for an operator-triggered retry. Only legal in
    /// the failed state; callers validate the state here before they enqueue
    /// a new job and link it with [`assign_job`](Self::assign_job).
    #[tracing::instrument(skip(self))]
    pub async fn reset_for_retry(&self, media_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let record = fetch_for_update(&mut tx, media_id).await?;
        if record.processing.status != ProcessingStatus::Failed {
            return Err(AppError::InvalidState(format!(
                "media {} is {}, retry requires failed",
                media_id, record.processing.status
            )));
        }

        sqlx::query(
            r#"
            UPDATE media
            SET processing_status = 'pending',
                current_stage = 'received',
                progress = 0,
                error_message = NULL,
                retry_count = retry_count + 1,
                job_id = NULL,
                completed_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(media_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// The single transactional write at the end of a job: final media
    /// update, approval decision, and every dependent counter, atomically.
    ///
    /// Guarded against at-least-once redelivery: if the record is already
    /// completed the transaction applies nothing and reports it, so a second
    /// delivery can never double-count.
    #[tracing::instrument(skip(self, params), fields(media_id = %params.media_id))]
    pub async fn finalize_completed(
        &self,
        params: FinalizeParams,
    ) -> Result<FinalizeOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let existing = fetch_for_update(&mut tx, params.media_id).await?;
        if existing.processing.status == ProcessingStatus::Completed {
            tx.rollback().await?;
            let stats = self.event_stats(existing.event_id).await?;
            tracing::warn!(
                media_id = %params.media_id,
                "Finalize skipped: record already completed (redelivered job)"
            );
            return Ok(FinalizeOutcome {
                applied: false,
                record: existing,
                stats,
            });
        }

        let status = params.decision.status;
        let approved_at = status.is_approved().then(Utc::now);
        let variants = serde_json::to_value(&params.variants)
            .map_err(|e| AppError::Internal(format!("Failed to serialize variants: {}", e)))?;
        let metadata = serde_json::to_value(&params.metadata)
            .map_err(|e| AppError::Internal(format!("Failed to serialize metadata: {}", e)))?;

        let record = sqlx::query_as::<Postgres, MediaRecord>(&format!(
            r#"
            UPDATE media
            SET processing_status = 'completed',
                current_stage = 'done',
                progress = 100,
                completed_at = NOW(),
                error_message = NULL,
                original_key = $2,
                original_url = $3,
                preview_key = NULL,
                preview_url = NULL,
                variants = $4,
                metadata = $5,
                approval_status = $6,
                approval_reason = $7,
                approved_at = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(params.media_id)
        .bind(&params.original_key)
        .bind(&params.original_url)
        .bind(variants)
        .bind(metadata)
        .bind(status.to_string())
        .bind(params.decision.auto_reason)
        .bind(approved_at)
        .fetch_one(&mut *tx)
        .await?;

        // The placeholder was never counted, so the decision is the first
        // counted state for this record.
        let approved_delta = counter_delta(None, status);
        let pending = pending_delta(None, status);
        let stats = apply_event_deltas(
            &mut tx,
            record.event_id,
            record.media_type,
            approved_delta,
            pending,
            record.file_size,
        )
        .await?;

        if approved_delta != 0 {
            apply_participant_delta(&mut tx, &record, approved_delta).await?;
        }

        tx.commit().await?;

        Ok(FinalizeOutcome {
            applied: true,
            record,
            stats,
        })
    }

    /// Moderation entry point: transition the approval status and apply the
    /// matching counter deltas in one transaction. Re-applying the current
    /// status is a counter no-op.
    ///
    /// Only completed records can be moderated. An in-flight record was
    /// never counted, and its pending finalize would overwrite the decision
    /// anyway.
    #[tracing::instrument(skip(self))]
    pub async fn update_approval_status(
        &self,
        media_id: Uuid,
        new_status: ApprovalStatus,
        actor: Option<Uuid>,
        rejection_reason: Option<String>,
    ) -> Result<(MediaRecord, EventStats), AppError> {
        let mut tx = self.pool.begin().await?;

        let existing = fetch_for_update(&mut tx, media_id).await?;
        if existing.processing.status != ProcessingStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "media {} is {}, moderation requires completed",
                media_id, existing.processing.status
            )));
        }
        let previous = existing.approval.status;

        let approved_delta = counter_delta(Some(previous), new_status);
        let pending = pending_delta(Some(previous), new_status);

        let approved_at = new_status.is_approved().then(Utc::now);
        let record = sqlx::query_as::<Postgres, MediaRecord>(&format!(
            r#"
            UPDATE media
            SET approval_status = $2,
                approved_by = $3,
                approved_at = $4,
                rejection_reason = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(media_id)
        .bind(new_status.to_string())
        .bind(actor)
        .bind(approved_at)
        .bind(rejection_reason)
        .fetch_one(&mut *tx)
        .await?;

        let stats = apply_event_deltas(
            &mut tx,
            record.event_id,
            record.media_type,
            approved_delta,
            pending,
            0,
        )
        .await?;

        if approved_delta != 0 {
            apply_participant_delta(&mut tx, &record, approved_delta).await?;
        }

        tx.commit().await?;
        Ok((record, stats))
    }

    /// Delete a record, rolling its contribution back out of the counters in
    /// the same transaction. Returns the deleted record so the caller can
    /// clean up storage.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, media_id: Uuid) -> Result<(MediaRecord, EventStats), AppError> {
        let mut tx = self.pool.begin().await?;

        let record = fetch_for_update(&mut tx, media_id).await?;

        sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(media_id)
            .execute(&mut *tx)
            .await?;

        // Only a completed record ever contributed to the counters; deleting
        // a placeholder or failed record must leave them untouched.
        let (approved_delta, pending, size_delta) =
            if record.processing.status == ProcessingStatus::Completed {
                (
                    -counter_delta(None, record.approval.status),
                    -pending_delta(None, record.approval.status),
                    -record.file_size,
                )
            } else {
                (0, 0, 0)
            };
        let stats = apply_event_deltas(
            &mut tx,
            record.event_id,
            record.media_type,
            approved_delta,
            pending,
            size_delta,
        )
        .await?;

        if approved_delta != 0 {
            apply_participant_delta(&mut tx, &record, approved_delta).await?;
        }

        tx.commit().await?;
        Ok((record, stats))
    }

    async fn event_stats(&self, event_id: Uuid) -> Result<EventStats, AppError> {
        let stats = sqlx::query_as::<Postgres, StatsRow>(
            "SELECT photos, videos, total_size_bytes, pending_approval FROM events WHERE id = $1",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats.0)
    }
}

fn uploader_columns(uploader: &Uploader) -> (Option<Uuid>, Option<Uuid>, Option<String>) {
    match uploader {
        Uploader::User { user_id } => (Some(*user_id), None, None),
        Uploader::Guest {
            session_id,
            display_name,
        } => (None, Some(*session_id), display_name.clone()),
    }
}

async fn fetch_for_update(
    tx: &mut Transaction<'_, Postgres>,
    media_id: Uuid,
) -> Result<MediaRecord, AppError> {
    sqlx::query_as::<Postgres, MediaRecord>(&format!(
        "SELECT {} FROM media WHERE id = $1 FOR UPDATE",
        MEDIA_COLUMNS
    ))
    .bind(media_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("media {}", media_id)))
}

struct StatsRow(EventStats);

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for StatsRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(StatsRow(EventStats {
            photos: row.get("photos"),
            videos: row.get("videos"),
            total_size_bytes: row.get("total_size_bytes"),
            pending_approval: row.get("pending_approval"),
        }))
    }
}

/// Apply signed deltas to the event's materialized counters and return the
/// resulting stats. The approved delta lands on photos or videos depending
/// on media type.
async fn apply_event_deltas(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    media_type: MediaType,
    approved_delta: i64,
    pending_delta: i64,
    size_delta: i64,
) -> Result<EventStats, AppError> {
    let (photo_delta, video_delta) = match media_type {
        MediaType::Image => (approved_delta, 0),
        MediaType::Video => (0, approved_delta),
    };

    let stats = sqlx::query_as::<Postgres, StatsRow>(
        r#"
        UPDATE events
        SET photos = photos + $2,
            videos = videos + $3,
            pending_approval = pending_approval + $4,
            total_size_bytes = total_size_bytes + $5,
            updated_at = NOW()
        WHERE id = $1
        RETURNING photos, videos, total_size_bytes, pending_approval
        "#,
    )
    .bind(event_id)
    .bind(photo_delta)
    .bind(video_delta)
    .bind(pending_delta)
    .bind(size_delta)
    .fetch_one(&mut **tx)
    .await?;

    Ok(stats.0)
}

/// Mirror an approved-count transition onto the uploader's participant row.
async fn apply_participant_delta(
    tx: &mut Transaction<'_, Postgres>,
    record: &MediaRecord,
    delta: i64,
) -> Result<(), AppError> {
    let (is_guest, display_name) = match &record.uploader {
        Uploader::User { .. } => (false, None),
        Uploader::Guest { display_name, .. } => (true, display_name.clone()),
    };

    sqlx::query(
        r#"
        INSERT INTO participants (event_id, subject_id, is_guest, display_name, upload_count)
        VALUES ($1, $2, $3, $4, GREATEST($5, 0))
        ON CONFLICT (event_id, subject_id)
        DO UPDATE SET upload_count = GREATEST(participants.upload_count + $5, 0),
                      updated_at = NOW()
        "#,
    )
    .bind(record.event_id)
    .bind(record.uploader.participant_id())
    .bind(is_guest)
    .bind(display_name)
    .bind(delta)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
