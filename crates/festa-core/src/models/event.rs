//! Event model and aggregate counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Materialized counters embedded in the event row.
///
/// Mutated only inside the same transaction as the media-record write that
/// caused the transition, so they never silently drift from the underlying
/// media set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventStats {
    pub photos: i64,
    pub videos: i64,
    pub total_size_bytes: i64,
    pub pending_approval: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub name: String,
    /// When true, guest uploads are held for moderation.
    pub requires_approval: bool,
    pub stats: EventStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for EventRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(EventRecord {
            id: row.get("id"),
            name: row.get("name"),
            requires_approval: row.get("requires_approval"),
            stats: EventStats {
                photos: row.get("photos"),
                videos: row.get("videos"),
                total_size_bytes: row.get("total_size_bytes"),
                pending_approval: row.get("pending_approval"),
            },
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
