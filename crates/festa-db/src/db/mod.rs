pub mod event;
pub mod job;
pub mod media;

/// Every media column, in the order the `FromRow` impl expects.
pub(crate) const MEDIA_COLUMNS: &str = r#"
    id,
    event_id,
    album_id,
    media_type,
    original_filename,
    content_type,
    file_size,
    uploaded_by,
    guest_session_id,
    guest_display_name,
    original_key,
    original_url,
    preview_key,
    preview_url,
    variants,
    metadata,
    processing_status,
    current_stage,
    progress,
    job_id,
    retry_count,
    started_at,
    completed_at,
    error_message,
    approval_status,
    approved_by,
    approved_at,
    rejection_reason,
    approval_reason,
    created_at,
    updated_at
"#;

pub(crate) const JOB_COLUMNS: &str = r#"
    id,
    kind,
    status,
    priority,
    payload,
    result,
    scheduled_at,
    started_at,
    completed_at,
    retry_count,
    max_retries,
    timeout_seconds,
    created_at,
    updated_at
"#;
