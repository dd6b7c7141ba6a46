//! Background processing of one staged upload.
//!
//! Walks the stages in order, checkpointing progress durably and
//! broadcasting each transition. The final write (record + approval +
//! counters) is a single transaction in the media repository, guarded so a
//! redelivered job cannot double-count.

use bytes::Bytes;
use futures::future::try_join_all;
use serde_json::json;

use festa_core::models::{
    decide_approval, Job, MediaMetadata, MediaType, MediaVariant, Notification, ProcessingStage,
    ProcessingStatus, ProcessUploadPayload,
};
use festa_core::{AppError, JobError, JobResultExt};
use festa_db::FinalizeParams;
use festa_processing::metadata::extract_image_metadata;
use festa_processing::variants::{
    generate_variants_concurrent, ProcessedVariant, DEFAULT_VARIANT_SPECS,
};
use festa_storage::StorageError;

use crate::keys;
use crate::PipelineState;

impl PipelineState {
    /// Handle one `process_upload` job end to end.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn process_upload(&self, job: &Job) -> Result<serde_json::Value, JobError> {
        let payload: ProcessUploadPayload = job.try_payload_as().unrecoverable()?;
        let media_id = payload.media_id;

        match self.process_upload_inner(job, &payload).await {
            Ok(result) => Ok(result),
            Err(e) => {
                // The job row is the queue's concern; the media record and
                // the live UI are ours.
                let message = e.to_string();
                let retry_count = match self.media.mark_failed(media_id, &message).await {
                    Ok(Some(count)) => Some(count),
                    Ok(None) => {
                        // The record is gone or already completed; a late
                        // failure must not surface as one.
                        tracing::warn!(
                            media_id = %media_id,
                            error = %message,
                            "Skipping failure bookkeeping for a missing or completed record"
                        );
                        None
                    }
                    Err(db_err) => {
                        tracing::error!(
                            media_id = %media_id,
                            error = %db_err,
                            "Failed to record processing failure"
                        );
                        Some(0)
                    }
                };
                if let Some(retry_count) = retry_count {
                    self.tracker.mark_failed(media_id, message.clone()).await;
                    self.broadcaster
                        .publish(
                            payload.event_id,
                            Notification::ProcessingFailed {
                                media_id,
                                error: message,
                                retry_count,
                            },
                        )
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn process_upload_inner(
        &self,
        job: &Job,
        payload: &ProcessUploadPayload,
    ) -> Result<serde_json::Value, JobError> {
        let media_id = payload.media_id;

        // A deleted record is gone for good; retrying cannot bring it back.
        let record = self
            .media
            .get(media_id)
            .await?
            .ok_or_else(|| {
                JobError::unrecoverable(AppError::NotFound(format!("media {}", media_id)))
            })?;

        // Redelivered job; the first delivery already did the side effects.
        if record.processing.status == ProcessingStatus::Completed {
            self.tracker.remove(media_id).await;
            return Ok(json!({ "media_id": media_id, "deduplicated": true }));
        }

        self.media.mark_processing_started(media_id, job.id).await?;

        // This attempt owns the live view from here. Starting fresh drops
        // any stale percentage or failure left by an earlier attempt.
        self.tracker
            .initialize(
                media_id,
                payload.event_id,
                payload.original_filename.clone(),
                payload.file_size,
            )
            .await;

        // Missing staged bytes are equally terminal.
        let data = match self.staging.download(&payload.staging_key).await {
            Ok(data) => data,
            Err(StorageError::NotFound(key)) => {
                return Err(JobError::unrecoverable(AppError::NotFound(format!(
                    "staged original {}",
                    key
                ))));
            }
            Err(e) => return Err(AppError::Storage(e.to_string()).into()),
        };

        self.emit_progress(payload, ProcessingStage::ExtractingMetadata)
            .await?;
        let metadata = self.extract_metadata(payload, data.clone()).await?;

        self.emit_progress(payload, ProcessingStage::StoringOriginal)
            .await?;
        let extension = keys::extension_for(&payload.original_filename, &payload.content_type);
        let original = self
            .storage
            .upload(
                &keys::original_key(payload.event_id, media_id, &extension),
                &payload.content_type,
                data.clone(),
            )
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        self.emit_progress(payload, ProcessingStage::GeneratingVariants)
            .await?;
        let processed = match payload.media_type {
            MediaType::Image => {
                generate_variants_concurrent(data, &DEFAULT_VARIANT_SPECS)
                    .await
                    .map_err(AppError::from)?
            }
            // Videos keep only their original for now.
            MediaType::Video => Vec::new(),
        };

        self.emit_progress(payload, ProcessingStage::StoringVariants)
            .await?;
        let variants = self.store_variants(payload, processed).await?;

        self.emit_progress(payload, ProcessingStage::Finalizing)
            .await?;
        let event = self.events.get(payload.event_id).await?;
        let decision = decide_approval(&payload.uploader, event.requires_approval);
        let outcome = self
            .media
            .finalize_completed(FinalizeParams {
                media_id,
                original_key: original.key,
                original_url: original.url.clone(),
                variants: variants.clone(),
                metadata: metadata.clone(),
                decision,
            })
            .await?;

        if !outcome.applied {
            // Redelivered job; the first delivery already did the side
            // effects.
            self.tracker.remove(media_id).await;
            return Ok(json!({ "media_id": media_id, "deduplicated": true }));
        }

        self.cleanup_superseded(&record.preview_key, &payload.staging_key)
            .await;

        self.tracker.remove(media_id).await;
        self.broadcaster
            .publish(
                payload.event_id,
                Notification::ProcessingComplete {
                    media_id,
                    original_url: original.url,
                    variants: variants.clone(),
                    width: metadata.width,
                    height: metadata.height,
                },
            )
            .await;
        self.broadcaster
            .publish(
                payload.event_id,
                Notification::StatsUpdated {
                    event_id: payload.event_id,
                    stats: outcome.stats,
                },
            )
            .await;

        tracing::info!(
            media_id = %media_id,
            variants = variants.len(),
            approval = %outcome.record.approval.status,
            "Upload processed"
        );

        Ok(json!({
            "media_id": media_id,
            "variants": variants.len(),
            "approval_status": outcome.record.approval.status.to_string(),
        }))
    }

    /// Checkpoint a stage durably, update the live tracker, and broadcast.
    async fn emit_progress(
        &self,
        payload: &ProcessUploadPayload,
        stage: ProcessingStage,
    ) -> Result<(), AppError> {
        let percentage = stage.base_progress();
        self.media
            .update_stage(payload.media_id, &stage.to_string(), percentage)
            .await?;
        let live = self
            .tracker
            .update(payload.media_id, stage, percentage)
            .await
            .unwrap_or(percentage);
        self.broadcaster
            .publish(
                payload.event_id,
                Notification::ProcessingProgress {
                    media_id: payload.media_id,
                    stage,
                    percentage: live,
                },
            )
            .await;
        Ok(())
    }

    async fn extract_metadata(
        &self,
        payload: &ProcessUploadPayload,
        data: Bytes,
    ) -> Result<MediaMetadata, JobError> {
        match payload.media_type {
            MediaType::Image => {
                let metadata =
                    tokio::task::spawn_blocking(move || extract_image_metadata(&data))
                        .await
                        .map_err(|e| {
                            JobError::recoverable(anyhow::anyhow!(
                                "Metadata task panicked: {}",
                                e
                            ))
                        })?
                        .map_err(AppError::from)?;
                Ok(metadata)
            }
            MediaType::Video => Ok(MediaMetadata {
                format: Some(payload.content_type.clone()),
                ..Default::default()
            }),
        }
    }

    /// Upload every variant concurrently. All-or-nothing: one failed upload
    /// fails the stage and nothing is persisted to the record.
    async fn store_variants(
        &self,
        payload: &ProcessUploadPayload,
        processed: Vec<ProcessedVariant>,
    ) -> Result<Vec<MediaVariant>, JobError> {
        let uploads = processed.into_iter().map(|variant| {
            let storage = self.storage.clone();
            let key = keys::variant_key(
                payload.event_id,
                payload.media_id,
                &variant.name,
                variant.format.extension(),
            );
            async move {
                let stored = storage
                    .upload(&key, variant.format.content_type(), variant.bytes.clone())
                    .await
                    .map_err(|e| AppError::Storage(e.to_string()))?;
                Ok::<MediaVariant, AppError>(MediaVariant {
                    name: variant.name,
                    format: variant.format.as_str().to_string(),
                    width: variant.width,
                    height: variant.height,
                    size_bytes: stored.size_bytes,
                    key: stored.key,
                    url: stored.url,
                })
            }
        });

        let variants = try_join_all(uploads).await?;
        Ok(variants)
    }

    /// Best-effort removal of the optimistic preview and the staged
    /// original. Failures are logged, never fatal; a periodic sweep can
    /// reclaim leftovers.
    async fn cleanup_superseded(&self, preview_key: &Option<String>, staging_key: &str) {
        if let Some(key) = preview_key {
            if let Err(e) = self.storage.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete preview");
            }
        }
        if let Err(e) = self.staging.delete(staging_key).await {
            tracing::warn!(key = %staging_key, error = %e, "Failed to delete staged original");
        }
    }
}
