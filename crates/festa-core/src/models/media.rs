//! Media record model.
//!
//! The durable record for one uploaded asset. Parsed once at the database
//! boundary into a strongly-typed value; the uploader reference is a tagged
//! enum so "registered user XOR guest" cannot be misrepresented in memory.
//! A row with both or neither uploader column set fails to decode, loudly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::approval::ApprovalInfo;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaType::Image => write!(f, "image"),
            MediaType::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

/// Who uploaded an asset: a registered user or an unauthenticated guest
/// identified by their session. Exactly one, by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Uploader {
    User { user_id: Uuid },
    Guest {
        session_id: Uuid,
        display_name: Option<String>,
    },
}

impl Uploader {
    pub fn is_guest(&self) -> bool {
        matches!(self, Uploader::Guest { .. })
    }

    /// The id that owns participant upload counters for this uploader.
    pub fn participant_id(&self) -> Uuid {
        match self {
            Uploader::User { user_id } => *user_id,
            Uploader::Guest { session_id, .. } => *session_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid processing status: {}", s)),
        }
    }
}

/// Processing sub-record embedded in a media record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub status: ProcessingStatus,
    pub current_stage: Option<String>,
    /// 0–100, monotonically non-decreasing within one job's lifetime.
    pub progress: i32,
    pub job_id: Option<Uuid>,
    pub retry_count: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ProcessingInfo {
    pub fn initial(job_id: Option<Uuid>) -> Self {
        Self {
            status: ProcessingStatus::Pending,
            current_stage: Some("received".to_string()),
            progress: 0,
            job_id,
            retry_count: 0,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }
}

/// One (size, format) encoding of an asset, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaVariant {
    pub name: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: i64,
    pub key: String,
    pub url: String,
}

/// Raw metadata pulled from the original bytes at processing time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub aspect_ratio: Option<f64>,
    pub format: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub taken_at: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub album_id: Option<Uuid>,
    pub media_type: MediaType,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    pub uploader: Uploader,
    pub original_key: Option<String>,
    pub original_url: Option<String>,
    pub preview_key: Option<String>,
    pub preview_url: Option<String>,
    pub variants: Vec<MediaVariant>,
    pub metadata: MediaMetadata,
    pub processing: ProcessingInfo,
    pub approval: ApprovalInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Invariant check: a completed record must carry a non-empty URL for
    /// every expected (name, format) pair plus the original.
    pub fn has_complete_variants(&self, expected: &[(&str, &str)]) -> bool {
        if self.original_url.as_deref().unwrap_or("").is_empty() {
            return false;
        }
        expected.iter().all(|(name, format)| {
            self.variants
                .iter()
                .any(|v| v.name == *name && v.format == *format && !v.url.is_empty())
        })
    }

    pub fn variant(&self, name: &str, format: &str) -> Option<&MediaVariant> {
        self.variants
            .iter()
            .find(|v| v.name == name && v.format == format)
    }
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for MediaRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let uploaded_by: Option<Uuid> = row.get("uploaded_by");
        let guest_session_id: Option<Uuid> = row.get("guest_session_id");
        let uploader = match (uploaded_by, guest_session_id) {
            (Some(user_id), None) => Uploader::User { user_id },
            (None, Some(session_id)) => Uploader::Guest {
                session_id,
                display_name: row.get("guest_display_name"),
            },
            // The CHECK constraint makes this unreachable; if it ever fires
            // the row is corrupt and must not be silently patched over.
            (both, neither) => {
                return Err(sqlx::Error::Decode(
                    format!(
                        "media row {} violates uploader XOR (uploaded_by={:?}, guest_session_id={:?})",
                        row.get::<Uuid, _>("id"),
                        both,
                        neither
                    )
                    .into(),
                ))
            }
        };

        let variants: serde_json::Value = row.get("variants");
        let variants: Vec<MediaVariant> = serde_json::from_value(variants)
            .map_err(|e| sqlx::Error::Decode(format!("Failed to parse variants: {}", e).into()))?;

        let metadata: serde_json::Value = row.get("metadata");
        let metadata: MediaMetadata = serde_json::from_value(metadata)
            .map_err(|e| sqlx::Error::Decode(format!("Failed to parse metadata: {}", e).into()))?;

        Ok(MediaRecord {
            id: row.get("id"),
            event_id: row.get("event_id"),
            album_id: row.get("album_id"),
            media_type: row.get::<String, _>("media_type").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse media_type: {}", e).into())
            })?,
            original_filename: row.get("original_filename"),
            content_type: row.get("content_type"),
            file_size: row.get("file_size"),
            uploader,
            original_key: row.get("original_key"),
            original_url: row.get("original_url"),
            preview_key: row.get("preview_key"),
            preview_url: row.get("preview_url"),
            variants,
            metadata,
            processing: ProcessingInfo {
                status: row
                    .get::<String, _>("processing_status")
                    .parse()
                    .map_err(|e| {
                        sqlx::Error::Decode(
                            format!("Failed to parse processing_status: {}", e).into(),
                        )
                    })?,
                current_stage: row.get("current_stage"),
                progress: row.get("progress"),
                job_id: row.get("job_id"),
                retry_count: row.get("retry_count"),
                started_at: row.get("started_at"),
                completed_at: row.get("completed_at"),
                error_message: row.get("error_message"),
            },
            approval: ApprovalInfo {
                status: row
                    .get::<String, _>("approval_status")
                    .parse()
                    .map_err(|e| {
                        sqlx::Error::Decode(
                            format!("Failed to parse approval_status: {}", e).into(),
                        )
                    })?,
                approved_by: row.get("approved_by"),
                approved_at: row.get("approved_at"),
                rejection_reason: row.get("rejection_reason"),
                auto_reason: row.get("approval_reason"),
            },
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::approval::ApprovalStatus;

    fn variant(name: &str, format: &str, url: &str) -> MediaVariant {
        MediaVariant {
            name: name.to_string(),
            format: format.to_string(),
            width: 400,
            height: 300,
            size_bytes: 12_000,
            key: format!("media/{}.{}", name, format),
            url: url.to_string(),
        }
    }

    fn record_with_variants(variants: Vec<MediaVariant>) -> MediaRecord {
        MediaRecord {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            album_id: None,
            media_type: MediaType::Image,
            original_filename: "wedding.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            file_size: 10_000_000,
            uploader: Uploader::User {
                user_id: Uuid::new_v4(),
            },
            original_key: Some("media/orig.jpg".to_string()),
            original_url: Some("https://cdn.example.com/media/orig.jpg".to_string()),
            preview_key: None,
            preview_url: None,
            variants,
            metadata: MediaMetadata::default(),
            processing: ProcessingInfo {
                status: ProcessingStatus::Completed,
                current_stage: Some("done".to_string()),
                progress: 100,
                job_id: Some(Uuid::new_v4()),
                retry_count: 0,
                started_at: Some(Utc::now()),
                completed_at: Some(Utc::now()),
                error_message: None,
            },
            approval: ApprovalInfo {
                status: ApprovalStatus::AutoApproved,
                approved_by: None,
                approved_at: Some(Utc::now()),
                rejection_reason: None,
                auto_reason: None,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const EXPECTED: &[(&str, &str)] = &[
        ("small", "webp"),
        ("small", "jpeg"),
        ("medium", "webp"),
        ("medium", "jpeg"),
        ("large", "webp"),
        ("large", "jpeg"),
    ];

    #[test]
    fn test_complete_variant_set_satisfies_invariant() {
        let variants = EXPECTED
            .iter()
            .map(|(n, f)| variant(n, f, "https://cdn.example.com/v"))
            .collect();
        let record = record_with_variants(variants);
        assert!(record.has_complete_variants(EXPECTED));
    }

    #[test]
    fn test_missing_variant_fails_invariant() {
        let variants = EXPECTED
            .iter()
            .skip(1)
            .map(|(n, f)| variant(n, f, "https://cdn.example.com/v"))
            .collect();
        let record = record_with_variants(variants);
        assert!(!record.has_complete_variants(EXPECTED));
    }

    #[test]
    fn test_empty_url_fails_invariant() {
        let mut variants: Vec<_> = EXPECTED
            .iter()
            .map(|(n, f)| variant(n, f, "https://cdn.example.com/v"))
            .collect();
        variants[3].url = String::new();
        let record = record_with_variants(variants);
        assert!(!record.has_complete_variants(EXPECTED));
    }

    #[test]
    fn test_uploader_serde_tagging() {
        let guest = Uploader::Guest {
            session_id: Uuid::new_v4(),
            display_name: None,
        };
        let json = serde_json::to_value(&guest).unwrap();
        assert_eq!(json["kind"], "guest");

        let user = Uploader::User {
            user_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["kind"], "user");
    }

    #[test]
    fn test_participant_id() {
        let session_id = Uuid::new_v4();
        let guest = Uploader::Guest {
            session_id,
            display_name: Some("g".to_string()),
        };
        assert_eq!(guest.participant_id(), session_id);
        assert!(guest.is_guest());
    }
}
