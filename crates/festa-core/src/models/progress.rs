//! Processing stages and the ephemeral progress entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::media::ProcessingStatus;

/// Stages the orchestrator walks through for one job, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    Received,
    ExtractingMetadata,
    StoringOriginal,
    GeneratingVariants,
    StoringVariants,
    Finalizing,
    Done,
}

impl ProcessingStage {
    /// Progress percentage when this stage begins.
    pub fn base_progress(self) -> i32 {
        match self {
            ProcessingStage::Received => 0,
            ProcessingStage::ExtractingMetadata => 10,
            ProcessingStage::StoringOriginal => 25,
            ProcessingStage::GeneratingVariants => 45,
            ProcessingStage::StoringVariants => 70,
            ProcessingStage::Finalizing => 90,
            ProcessingStage::Done => 100,
        }
    }
}

impl Display for ProcessingStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessingStage::Received => write!(f, "received"),
            ProcessingStage::ExtractingMetadata => write!(f, "extracting_metadata"),
            ProcessingStage::StoringOriginal => write!(f, "storing_original"),
            ProcessingStage::GeneratingVariants => write!(f, "generating_variants"),
            ProcessingStage::StoringVariants => write!(f, "storing_variants"),
            ProcessingStage::Finalizing => write!(f, "finalizing"),
            ProcessingStage::Done => write!(f, "done"),
        }
    }
}

/// Advisory, in-memory progress for one in-flight upload. Loss of this state
/// never corrupts the durable media record; it only degrades the live UI.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEntry {
    pub media_id: Uuid,
    pub event_id: Uuid,
    pub filename: String,
    pub size_bytes: i64,
    pub stage: ProcessingStage,
    pub percentage: i32,
    pub failed_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Read-model for status polling: the durable record merged with the live
/// progress entry when one exists.
#[derive(Debug, Clone, Serialize)]
pub struct MediaStatusView {
    pub media_id: Uuid,
    pub status: ProcessingStatus,
    pub stage: Option<String>,
    pub percentage: i32,
    pub job_id: Option<Uuid>,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub last_updated: DateTime<Utc>,
    /// True when the stage/percentage came from the live tracker rather than
    /// the database.
    pub live: bool,
}
