//! Moderation and deletion.
//!
//! Both reuse the media repository's transactional counter bookkeeping, so
//! an approve/reject/hide or a delete can never leave the event counters out
//! of step with the media set.

use uuid::Uuid;

use festa_core::models::{ApprovalStatus, EventStats, MediaRecord, Notification};
use festa_core::AppError;

use crate::PipelineState;

impl PipelineState {
    /// Apply a moderator's decision and broadcast the resulting stats.
    /// Re-applying the current status is a harmless no-op on the counters.
    #[tracing::instrument(skip(self))]
    pub async fn moderate(
        &self,
        media_id: Uuid,
        new_status: ApprovalStatus,
        moderator: Option<Uuid>,
        rejection_reason: Option<String>,
    ) -> Result<(MediaRecord, EventStats), AppError> {
        let (record, stats) = self
            .media
            .update_approval_status(media_id, new_status, moderator, rejection_reason)
            .await?;

        tracing::info!(
            media_id = %media_id,
            status = %new_status,
            "Moderation decision applied"
        );

        self.broadcaster
            .publish(
                record.event_id,
                Notification::StatsUpdated {
                    event_id: record.event_id,
                    stats,
                },
            )
            .await;

        Ok((record, stats))
    }

    /// Delete a media record, its stored objects, and its counter
    /// contribution. The database row goes first; object cleanup is
    /// best-effort after the transaction commits.
    #[tracing::instrument(skip(self))]
    pub async fn delete_media(&self, media_id: Uuid) -> Result<EventStats, AppError> {
        let (record, stats) = self.media.delete(media_id).await?;

        let mut keys: Vec<String> = Vec::new();
        if let Some(key) = &record.original_key {
            keys.push(key.clone());
        }
        if let Some(key) = &record.preview_key {
            keys.push(key.clone());
        }
        keys.extend(record.variants.iter().map(|v| v.key.clone()));
        for key in keys {
            if let Err(e) = self.storage.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete stored object");
            }
        }

        // An in-flight or failed upload may still have staged bytes.
        let extension =
            crate::keys::extension_for(&record.original_filename, &record.content_type);
        let staging_key = crate::keys::staging_key(record.id, &extension);
        if let Err(e) = self.staging.delete(&staging_key).await {
            tracing::warn!(key = %staging_key, error = %e, "Failed to delete staged original");
        }

        self.tracker.remove(media_id).await;
        self.broadcaster
            .publish(record.event_id, Notification::MediaRemoved { media_id })
            .await;
        self.broadcaster
            .publish(
                record.event_id,
                Notification::StatsUpdated {
                    event_id: record.event_id,
                    stats,
                },
            )
            .await;

        tracing::info!(media_id = %media_id, "Media deleted");
        Ok(stats)
    }
}
