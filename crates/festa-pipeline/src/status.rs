//! Status polling read-model.
//!
//! Merges the durable media record with the live tracker entry. The tracker
//! wins while a job is in flight because it updates more often; once the
//! record reaches a terminal state the database is authoritative.

use uuid::Uuid;

use festa_core::models::{MediaStatusView, ProcessingStatus};
use festa_core::AppError;

use crate::PipelineState;

impl PipelineState {
    pub async fn media_status(&self, media_id: Uuid) -> Result<MediaStatusView, AppError> {
        let record = self
            .media
            .get(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media {}", media_id)))?;

        let terminal = matches!(
            record.processing.status,
            ProcessingStatus::Completed | ProcessingStatus::Failed
        );
        let live_entry = if terminal {
            None
        } else {
            self.tracker.get(media_id).await
        };

        let view = match live_entry {
            Some(entry) => MediaStatusView {
                media_id,
                status: record.processing.status,
                stage: Some(entry.stage.to_string()),
                // The tracker can be slightly ahead of the last durable
                // checkpoint; never report less than the database.
                percentage: entry.percentage.max(record.processing.progress),
                job_id: record.processing.job_id,
                retry_count: record.processing.retry_count,
                error_message: entry.failed_reason,
                last_updated: entry.updated_at,
                live: true,
            },
            None => MediaStatusView {
                media_id,
                status: record.processing.status,
                stage: record.processing.current_stage,
                percentage: record.processing.progress,
                job_id: record.processing.job_id,
                retry_count: record.processing.retry_count,
                error_message: record.processing.error_message,
                last_updated: record.updated_at,
                live: false,
            },
        };
        Ok(view)
    }
}
