//! Festa Worker – background job queue and worker infrastructure.
//!
//! This crate provides the job queue (LISTEN/NOTIFY wakeup, polling, retry,
//! worker pool) and the `JobHandlerContext` trait. The pipeline implements
//! the trait for its application state and dispatches to handlers; handlers
//! stay in the pipeline crate.

mod context;
mod queue;

pub use context::{empty_context_weak, JobHandlerContext};
pub use queue::{JobQueue, JobQueueConfig};
