pub mod approval;
pub mod event;
pub mod job;
pub mod media;
pub mod notification;
pub mod progress;

pub use approval::{
    counter_delta, decide_approval, pending_delta, ApprovalDecision, ApprovalInfo, ApprovalStatus,
};
pub use event::{EventRecord, EventStats};
pub use job::{Job, JobKind, JobPayload, JobStatus, Priority, ProcessUploadPayload};
pub use media::{
    MediaMetadata, MediaRecord, MediaType, MediaVariant, ProcessingInfo, ProcessingStatus,
    Uploader,
};
pub use notification::Notification;
pub use progress::{MediaStatusView, ProcessingStage, ProgressEntry};
