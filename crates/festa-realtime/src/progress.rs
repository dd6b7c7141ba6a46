//! Ephemeral per-upload progress tracker.
//!
//! A map of media id to the latest stage and percentage. Percentages only
//! move forward; a stale update arriving after a newer one cannot rewind the
//! UI. Entries for finished uploads are removed by the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use festa_core::models::{ProcessingStage, ProgressEntry};

#[derive(Clone, Default)]
pub struct ProgressTracker {
    entries: Arc<RwLock<HashMap<Uuid, ProgressEntry>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh upload at the received stage.
    pub async fn initialize(
        &self,
        media_id: Uuid,
        event_id: Uuid,
        filename: String,
        size_bytes: i64,
    ) {
        let entry = ProgressEntry {
            media_id,
            event_id,
            filename,
            size_bytes,
            stage: ProcessingStage::Received,
            percentage: 0,
            failed_reason: None,
            updated_at: Utc::now(),
        };
        self.entries.write().await.insert(media_id, entry);
    }

    /// Advance an upload to a stage/percentage. Returns the percentage
    /// actually recorded, which never goes backwards. Unknown media ids are
    /// ignored (the tracker may have restarted mid-job).
    pub async fn update(
        &self,
        media_id: Uuid,
        stage: ProcessingStage,
        percentage: i32,
    ) -> Option<i32> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&media_id)?;

        let clamped = percentage.clamp(0, 100).max(entry.percentage);
        entry.stage = stage;
        entry.percentage = clamped;
        entry.updated_at = Utc::now();
        Some(clamped)
    }

    /// Record a failure reason without removing the entry, so pollers can
    /// still see what went wrong until the next retry or cleanup.
    pub async fn mark_failed(&self, media_id: Uuid, reason: String) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&media_id) {
            entry.failed_reason = Some(reason);
            entry.updated_at = Utc::now();
        }
    }

    pub async fn get(&self, media_id: Uuid) -> Option<ProgressEntry> {
        self.entries.read().await.get(&media_id).cloned()
    }

    pub async fn remove(&self, media_id: Uuid) -> Option<ProgressEntry> {
        self.entries.write().await.remove(&media_id)
    }

    /// All live entries for one event, for room-level progress displays.
    pub async fn entries_for_event(&self, event_id: Uuid) -> Vec<ProgressEntry> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.event_id == event_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tracked(tracker: &ProgressTracker) -> Uuid {
        let media_id = Uuid::new_v4();
        tracker
            .initialize(media_id, Uuid::new_v4(), "photo.jpg".to_string(), 1024)
            .await;
        media_id
    }

    #[tokio::test]
    async fn test_initialize_starts_at_zero() {
        let tracker = ProgressTracker::new();
        let media_id = tracked(&tracker).await;

        let entry = tracker.get(media_id).await.unwrap();
        assert_eq!(entry.stage, ProcessingStage::Received);
        assert_eq!(entry.percentage, 0);
        assert_eq!(entry.failed_reason, None);
    }

    #[tokio::test]
    async fn test_percentage_never_rewinds() {
        let tracker = ProgressTracker::new();
        let media_id = tracked(&tracker).await;

        assert_eq!(
            tracker
                .update(media_id, ProcessingStage::StoringVariants, 70)
                .await,
            Some(70)
        );
        // Stale update from an earlier stage arrives late.
        assert_eq!(
            tracker
                .update(media_id, ProcessingStage::ExtractingMetadata, 10)
                .await,
            Some(70)
        );
    }

    #[tokio::test]
    async fn test_update_unknown_media_is_ignored() {
        let tracker = ProgressTracker::new();
        assert_eq!(
            tracker
                .update(Uuid::new_v4(), ProcessingStage::Finalizing, 90)
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_mark_failed_keeps_entry() {
        let tracker = ProgressTracker::new();
        let media_id = tracked(&tracker).await;

        tracker
            .mark_failed(media_id, "corrupt input".to_string())
            .await;
        let entry = tracker.get(media_id).await.unwrap();
        assert_eq!(entry.failed_reason.as_deref(), Some("corrupt input"));
    }

    #[tokio::test]
    async fn test_reinitialize_resets_failed_entry() {
        let tracker = ProgressTracker::new();
        let media_id = tracked(&tracker).await;

        tracker
            .update(media_id, ProcessingStage::StoringVariants, 70)
            .await;
        tracker.mark_failed(media_id, "encode failed".to_string()).await;

        // A retry registers the upload again; the dead attempt's percentage
        // and failure reason must not pin the new one.
        tracker
            .initialize(media_id, Uuid::new_v4(), "photo.jpg".to_string(), 1024)
            .await;

        let entry = tracker.get(media_id).await.unwrap();
        assert_eq!(entry.stage, ProcessingStage::Received);
        assert_eq!(entry.percentage, 0);
        assert_eq!(entry.failed_reason, None);
        assert_eq!(
            tracker
                .update(media_id, ProcessingStage::ExtractingMetadata, 10)
                .await,
            Some(10)
        );
    }

    #[tokio::test]
    async fn test_entries_for_event_filters() {
        let tracker = ProgressTracker::new();
        let event_id = Uuid::new_v4();
        tracker
            .initialize(Uuid::new_v4(), event_id, "a.jpg".to_string(), 1)
            .await;
        tracker
            .initialize(Uuid::new_v4(), event_id, "b.jpg".to_string(), 2)
            .await;
        tracker
            .initialize(Uuid::new_v4(), Uuid::new_v4(), "c.jpg".to_string(), 3)
            .await;

        assert_eq!(tracker.entries_for_event(event_id).await.len(), 2);
    }
}
