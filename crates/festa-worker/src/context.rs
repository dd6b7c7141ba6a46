//! Job handler context trait
//!
//! The pipeline implements this trait for its application state. The worker
//! calls `dispatch_job` when processing a claimed job; the implementation
//! matches on job kind and invokes the appropriate handler.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};

use festa_core::models::Job;

/// Context for job dispatch.
///
/// Implemented by the pipeline's application state. The worker holds a weak
/// reference and calls `dispatch_job` when processing a claimed job.
#[async_trait]
pub trait JobHandlerContext: Send + Sync {
    /// Dispatch a job to the appropriate handler and return the result.
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<serde_json::Value>;
}

/// Placeholder context used when no real context exists yet (e.g. during init).
/// Dispatch always errors.
struct NoopContext;

#[async_trait]
impl JobHandlerContext for NoopContext {
    async fn dispatch_job(self: Arc<Self>, _job: &Job) -> Result<serde_json::Value> {
        Err(anyhow!("NoopContext: no handler context available"))
    }
}

/// Returns a weak reference to a no-op context. Use as placeholder when
/// building JobQueue before the real application context exists.
pub fn empty_context_weak() -> Weak<dyn JobHandlerContext> {
    let n: Arc<dyn JobHandlerContext> = Arc::new(NoopContext);
    Arc::downgrade(&n)
}
