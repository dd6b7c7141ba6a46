//! Job dispatch: the worker's entry point into the pipeline.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use festa_core::models::{Job, JobKind};
use festa_worker::JobHandlerContext;

use crate::PipelineState;

#[async_trait]
impl JobHandlerContext for PipelineState {
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<serde_json::Value> {
        match job.kind {
            JobKind::ProcessUpload => self
                .process_upload(job)
                .await
                // Keep the JobError intact so the queue can read the
                // recoverable flag through the anyhow boundary.
                .map_err(anyhow::Error::new),
        }
    }
}
