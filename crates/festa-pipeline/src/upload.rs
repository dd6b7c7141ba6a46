//! Synchronous upload path.
//!
//! Everything here runs inside the request/response cycle, so it is limited
//! to validation, one small preview encode, a staging write, and the
//! placeholder insert. The heavy work happens in the background job.

use bytes::Bytes;
use uuid::Uuid;

use festa_core::constants::{ALLOWED_IMAGE_CONTENT_TYPES, ALLOWED_VIDEO_CONTENT_TYPES};
use festa_core::models::{
    ApprovalInfo, MediaMetadata, MediaRecord, MediaType, Notification, Priority,
    ProcessUploadPayload, ProcessingInfo, Uploader,
};
use festa_core::AppError;
use festa_processing::preview::generate_preview;

use crate::keys;
use crate::PipelineState;

/// One incoming upload, already extracted from whatever transport carried it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub event_id: Uuid,
    pub album_id: Option<Uuid>,
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
    pub uploader: Uploader,
}

/// What the client gets back immediately.
#[derive(Debug, Clone)]
pub struct UploadAccepted {
    pub media_id: Uuid,
    pub job_id: Uuid,
    pub preview_url: Option<String>,
}

/// Classify a content type into a media type, rejecting everything outside
/// the allow lists.
pub fn classify_content_type(content_type: &str) -> Result<MediaType, AppError> {
    if ALLOWED_IMAGE_CONTENT_TYPES.contains(&content_type) {
        Ok(MediaType::Image)
    } else if ALLOWED_VIDEO_CONTENT_TYPES.contains(&content_type) {
        Ok(MediaType::Video)
    } else {
        Err(AppError::UnsupportedFormat(content_type.to_string()))
    }
}

impl PipelineState {
    /// Accept an upload: validate, preview, stage, insert the placeholder,
    /// broadcast optimistically, and enqueue the processing job.
    #[tracing::instrument(skip(self, request), fields(event_id = %request.event_id, filename = %request.filename))]
    pub async fn accept_upload(&self, request: UploadRequest) -> Result<UploadAccepted, AppError> {
        if request.data.len() > self.config.max_file_size_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds limit of {}",
                request.data.len(),
                self.config.max_file_size_bytes
            )));
        }
        let media_type = classify_content_type(&request.content_type)?;
        let filename = keys::sanitize_filename(&request.filename)?;

        // Existence check doubles as the counters' foreign-key anchor.
        let event = self.events.get(request.event_id).await?;

        let media_id = Uuid::new_v4();
        let file_size = request.data.len() as i64;
        let extension = keys::extension_for(&filename, &request.content_type);

        tracing::info!(
            media_id = %media_id,
            media_type = %media_type,
            file_size,
            "Accepting upload"
        );

        // Optimistic preview, images only. A decode failure here means the
        // bytes are corrupt and the upload is rejected synchronously instead
        // of failing minutes later in the background.
        let preview = match media_type {
            MediaType::Image => {
                let data = request.data.clone();
                let preview = tokio::task::spawn_blocking(move || generate_preview(&data))
                    .await
                    .map_err(|e| AppError::Internal(format!("Preview task panicked: {}", e)))??;

                let key = keys::preview_key(event.id, media_id);
                let stored = self
                    .storage
                    .upload(&key, "image/webp", preview.bytes)
                    .await
                    .map_err(|e| AppError::Storage(e.to_string()))?;
                Some(stored)
            }
            MediaType::Video => None,
        };

        // Stage the original durably so the worker can read it after the
        // request body is gone.
        let staging_key = keys::staging_key(media_id, &extension);
        self.staging
            .upload(&staging_key, &request.content_type, request.data)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let record = MediaRecord {
            id: media_id,
            event_id: event.id,
            album_id: request.album_id,
            media_type,
            original_filename: filename.clone(),
            content_type: request.content_type.clone(),
            file_size,
            uploader: request.uploader.clone(),
            original_key: None,
            original_url: None,
            preview_key: preview.as_ref().map(|p| p.key.clone()),
            preview_url: preview.as_ref().map(|p| p.url.clone()),
            variants: Vec::new(),
            metadata: MediaMetadata::default(),
            processing: ProcessingInfo::initial(None),
            approval: ApprovalInfo::initial(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.media.insert_placeholder(&record).await?;

        self.tracker
            .initialize(media_id, event.id, filename.clone(), file_size)
            .await;

        let uploader_name = match &request.uploader {
            Uploader::User { .. } => None,
            Uploader::Guest { display_name, .. } => display_name.clone(),
        };
        self.broadcaster
            .publish(
                event.id,
                Notification::OptimisticUpload {
                    media_id,
                    event_id: event.id,
                    preview_url: preview.as_ref().map(|p| p.url.clone()).unwrap_or_default(),
                    filename,
                    uploader_name,
                },
            )
            .await;

        let payload = ProcessUploadPayload {
            media_id,
            event_id: event.id,
            album_id: request.album_id,
            media_type,
            staging_key,
            original_filename: record.original_filename,
            content_type: request.content_type,
            file_size,
            uploader: request.uploader,
        };
        let job_id = self
            .queue
            .submit(&payload, Priority::Normal, None)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to enqueue job: {}", e)))?;
        self.media.assign_job(media_id, job_id).await?;

        Ok(UploadAccepted {
            media_id,
            job_id,
            preview_url: preview.map(|p| p.url),
        })
    }

    /// Re-enqueue a failed upload. The staging key is re-derived from the
    /// media id, so this works as long as the staged original still exists.
    #[tracing::instrument(skip(self))]
    pub async fn retry_upload(&self, media_id: Uuid) -> Result<Uuid, AppError> {
        let record = self
            .media
            .get(media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("media {}", media_id)))?;

        // Only a failed record may be reset. Validating before any job
        // exists means a refused retry leaves nothing behind in the queue.
        self.media.reset_for_retry(media_id).await?;

        // Fresh live entry: the failed attempt's percentage and reason must
        // not leak into the new one.
        self.tracker
            .initialize(
                media_id,
                record.event_id,
                record.original_filename.clone(),
                record.file_size,
            )
            .await;

        let extension = keys::extension_for(&record.original_filename, &record.content_type);
        let payload = ProcessUploadPayload {
            media_id: record.id,
            event_id: record.event_id,
            album_id: record.album_id,
            media_type: record.media_type,
            staging_key: keys::staging_key(record.id, &extension),
            original_filename: record.original_filename.clone(),
            content_type: record.content_type.clone(),
            file_size: record.file_size,
            uploader: record.uploader.clone(),
        };

        let job_id = match self.queue.submit(&payload, Priority::High, None).await {
            Ok(job_id) => job_id,
            Err(e) => {
                // Put the record back where the operator can retry again.
                let _ = self
                    .media
                    .mark_failed(media_id, "Failed to enqueue retry job")
                    .await;
                return Err(AppError::Internal(format!(
                    "Failed to enqueue retry job: {}",
                    e
                )));
            }
        };
        self.media.assign_job(media_id, job_id).await?;

        tracing::info!(media_id = %media_id, job_id = %job_id, "Upload retry enqueued");
        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_content_type() {
        assert_eq!(
            classify_content_type("image/jpeg").unwrap(),
            MediaType::Image
        );
        assert_eq!(
            classify_content_type("video/mp4").unwrap(),
            MediaType::Video
        );
        assert!(matches!(
            classify_content_type("application/pdf"),
            Err(AppError::UnsupportedFormat(_))
        ));
    }
}
