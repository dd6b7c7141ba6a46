//! Festa Pipeline – the upload orchestrator.
//!
//! The synchronous path (`accept_upload`) validates, stages the original,
//! publishes an optimistic preview, and enqueues a background job. The
//! asynchronous path (`process_upload`) generates variants, finalizes the
//! record transactionally, and broadcasts the outcome. Moderation and
//! deletion route through the same counter bookkeeping as job completion.

pub mod dispatch;
pub mod keys;
pub mod moderation;
pub mod process;
pub mod status;
pub mod upload;

use std::sync::Arc;

use festa_core::Config;
use festa_db::{EventRepository, JobRepository, MediaRepository};
use festa_realtime::{EventBroadcaster, ProgressTracker};
use festa_storage::Storage;
use festa_worker::JobQueue;

/// Shared state for every pipeline operation. The queue worker holds a weak
/// reference back to this and dispatches claimed jobs through it.
pub struct PipelineState {
    pub config: Config,
    pub media: MediaRepository,
    pub events: EventRepository,
    pub jobs: JobRepository,
    /// Permanent object store for originals, variants, and previews.
    pub storage: Arc<dyn Storage>,
    /// Durable staging area holding original bytes between request and job.
    pub staging: Arc<dyn Storage>,
    pub queue: JobQueue,
    pub broadcaster: EventBroadcaster,
    pub tracker: ProgressTracker,
}
