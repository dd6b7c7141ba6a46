//! Notification payloads broadcast to event rooms.
//!
//! Delivery is best-effort: no acknowledgment, no replay. For a single media
//! id the kinds are emitted in pipeline order (optimistic_upload →
//! processing_progress* → processing_complete | processing_failed); nothing
//! is guaranteed across different media ids.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventStats;
use super::media::MediaVariant;
use super::progress::ProcessingStage;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    OptimisticUpload {
        media_id: Uuid,
        event_id: Uuid,
        preview_url: String,
        filename: String,
        uploader_name: Option<String>,
    },
    ProcessingProgress {
        media_id: Uuid,
        stage: ProcessingStage,
        percentage: i32,
    },
    ProcessingComplete {
        media_id: Uuid,
        original_url: String,
        variants: Vec<MediaVariant>,
        width: Option<u32>,
        height: Option<u32>,
    },
    ProcessingFailed {
        media_id: Uuid,
        error: String,
        retry_count: i32,
    },
    MediaRemoved {
        media_id: Uuid,
    },
    StatsUpdated {
        event_id: Uuid,
        stats: EventStats,
    },
}

impl Notification {
    /// The media id this notification concerns, when it concerns one.
    pub fn media_id(&self) -> Option<Uuid> {
        match self {
            Notification::OptimisticUpload { media_id, .. }
            | Notification::ProcessingProgress { media_id, .. }
            | Notification::ProcessingComplete { media_id, .. }
            | Notification::ProcessingFailed { media_id, .. }
            | Notification::MediaRemoved { media_id } => Some(*media_id),
            Notification::StatsUpdated { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OptimisticUpload { .. } => "optimistic_upload",
            Notification::ProcessingProgress { .. } => "processing_progress",
            Notification::ProcessingComplete { .. } => "processing_complete",
            Notification::ProcessingFailed { .. } => "processing_failed",
            Notification::MediaRemoved { .. } => "media_removed",
            Notification::StatsUpdated { .. } => "stats_updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_kind_tag() {
        let n = Notification::ProcessingFailed {
            media_id: Uuid::new_v4(),
            error: "corrupt input".to_string(),
            retry_count: 1,
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "processing_failed");
        assert_eq!(json["error"], "corrupt input");

        let back: Notification = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), "processing_failed");
    }

    #[test]
    fn test_stats_updated_has_no_media_id() {
        let n = Notification::StatsUpdated {
            event_id: Uuid::new_v4(),
            stats: EventStats::default(),
        };
        assert_eq!(n.media_id(), None);
        assert_eq!(n.kind(), "stats_updated");
    }
}
