//! Background job model.
//!
//! One row per unit of queued work. Created by the synchronous upload path,
//! claimed by a worker (at-least-once), and moved to a terminal state by the
//! queue after success or exhausted retries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::media::{MediaType, Uploader};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ProcessUpload,
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobKind::ProcessUpload => write!(f, "process_upload"),
        }
    }
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "process_upload" => Ok(JobKind::ProcessUpload),
            _ => Err(anyhow::anyhow!("Invalid job kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Scheduled,
    Cancelled,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Scheduled => write!(f, "scheduled"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 3,
    #[default]
    Normal = 5,
    High = 7,
    Critical = 10,
}

impl Priority {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            0..=3 => Priority::Low,
            4..=6 => Priority::Normal,
            7..=9 => Priority::High,
            _ => Priority::Critical,
        }
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> Self {
        priority as i32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub timeout_seconds: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Job {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Job {
            id: row.get("id"),
            kind: row.get::<String, _>("kind").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse job kind: {}", e).into())
            })?,
            status: row.get("status"),
            priority: row.get("priority"),
            payload: row.get("payload"),
            result: row.get("result"),
            scheduled_at: row.get("scheduled_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            timeout_seconds: row.get("timeout_seconds"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl Job {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Extract the payload as a typed struct, returning an error on failure.
    pub fn try_payload_as<P: JobPayload>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Create a payload value from a typed struct.
    pub fn payload_from<P: JobPayload>(payload: &P) -> serde_json::Value {
        serde_json::to_value(payload).unwrap_or_default()
    }
}

/// Trait for type-safe job payloads
pub trait JobPayload: Serialize + for<'de> Deserialize<'de> {
    fn kind() -> JobKind;
}

/// Everything the worker needs to reprocess an upload without re-reading the
/// original multipart body from the long-closed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessUploadPayload {
    pub media_id: Uuid,
    pub event_id: Uuid,
    pub album_id: Option<Uuid>,
    pub media_type: MediaType,
    /// Key of the original bytes in the durable staging area.
    pub staging_key: String,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    pub uploader: Uploader,
}

impl JobPayload for ProcessUploadPayload {
    fn kind() -> JobKind {
        JobKind::ProcessUpload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(retry_count: i32, max_retries: i32) -> Job {
        Job {
            id: Uuid::new_v4(),
            kind: JobKind::ProcessUpload,
            status: JobStatus::Failed,
            priority: Priority::Normal.as_i32(),
            payload: serde_json::json!({}),
            result: None,
            scheduled_at: Utc::now(),
            started_at: None,
            completed_at: None,
            retry_count,
            max_retries,
            timeout_seconds: Some(600),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_job_kind_round_trip() {
        assert_eq!(JobKind::ProcessUpload.to_string(), "process_upload");
        assert_eq!(
            "process_upload".parse::<JobKind>().unwrap(),
            JobKind::ProcessUpload
        );
        assert!("make_zip".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(Priority::High.as_i32(), 7);
        assert_eq!(Priority::from_i32(5), Priority::Normal);
        assert_eq!(Priority::from_i32(10), Priority::Critical);
        assert!(Priority::Normal < Priority::High);
    }

    #[test]
    fn test_can_retry() {
        assert!(job(2, 3).can_retry());
        assert!(!job(3, 3).can_retry());
        assert!(!job(5, 3).can_retry());
    }

    #[test]
    fn test_typed_payload_round_trip() {
        let payload = ProcessUploadPayload {
            media_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            album_id: None,
            media_type: MediaType::Image,
            staging_key: "staging/abc.jpg".to_string(),
            original_filename: "beach.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            file_size: 123_456,
            uploader: Uploader::Guest {
                session_id: Uuid::new_v4(),
                display_name: None,
            },
        };

        let mut j = job(0, 3);
        j.payload = Job::payload_from(&payload);
        let parsed: ProcessUploadPayload = j.try_payload_as().unwrap();
        assert_eq!(parsed.media_id, payload.media_id);
        assert_eq!(parsed.staging_key, payload.staging_key);
        assert!(parsed.uploader.is_guest());
    }
}
