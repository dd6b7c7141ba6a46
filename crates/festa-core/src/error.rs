//! Error types module
//!
//! All errors surfaced by the pipeline are unified under the `AppError` enum:
//! database, storage, image-processing, and domain-specific validation errors.
//!
//! The taxonomy follows the processing contract: validation failures are
//! surfaced synchronously to the caller and never retried; corrupt input is
//! terminal for a job regardless of remaining attempts; storage and database
//! failures during a job are transient and retried by the queue's backoff
//! policy.

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt input: {0}")]
    CorruptInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable error code for logs and client payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::ImageProcessing(_) => "IMAGE_PROCESSING_ERROR",
            AppError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            AppError::CorruptInput(_) => "CORRUPT_INPUT",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a job failing with this error should be retried by the queue.
    ///
    /// Validation and corrupt-input failures won't change on retry; invariant
    /// violations are bugs, not conditions to retry through.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_)
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::UnsupportedFormat("text/plain".into()).error_code(),
            "UNSUPPORTED_FORMAT"
        );
        assert_eq!(
            AppError::CorruptInput("truncated jpeg".into()).error_code(),
            "CORRUPT_INPUT"
        );
        assert_eq!(
            AppError::InvalidState("not failed".into()).error_code(),
            "INVALID_STATE"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Storage("timeout".into()).is_retryable());
        assert!(!AppError::CorruptInput("bad bytes".into()).is_retryable());
        assert!(!AppError::UnsupportedFormat("bmp".into()).is_retryable());
        assert!(!AppError::InvariantViolation("both uploaders set".into()).is_retryable());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
