//! Job execution error types
//!
//! Allows job handlers to indicate whether an error is recoverable (should be
//! retried by the queue's backoff policy) or unrecoverable (should fail the
//! job immediately without consuming the remaining attempts).

use std::fmt;

use crate::error::AppError;

/// Job execution error that can be either recoverable or unrecoverable
#[derive(Debug)]
pub struct JobError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl JobError {
    /// Create a new unrecoverable job error
    ///
    /// Unrecoverable errors fail the job immediately without retrying.
    /// Use this for errors like:
    /// - Corrupt or unreadable input bytes
    /// - A media record that no longer exists
    /// - Invalid payload data that won't change on retry
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Create a new recoverable job error
    ///
    /// Recoverable errors are retried according to the job's retry policy.
    /// Use this for errors like:
    /// - Transient network or object-store failures
    /// - Temporary database unavailability
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    /// Check if this error is recoverable (should be retried)
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Get the inner error
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Consume self and return the inner error
    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for JobError {
    /// Default conversion from anyhow::Error creates a recoverable error
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

impl From<AppError> for JobError {
    /// Classify a domain error by its own retryability.
    fn from(err: AppError) -> Self {
        if err.is_retryable() {
            Self::recoverable(err)
        } else {
            Self::unrecoverable(err)
        }
    }
}

/// Extension trait for Result to easily create unrecoverable job errors
pub trait JobResultExt<T> {
    /// Mark this result as unrecoverable on error
    fn unrecoverable(self) -> Result<T, JobError>;
}

impl<T, E: Into<anyhow::Error>> JobResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, JobError> {
        self.map_err(|e| JobError::unrecoverable(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_error() {
        let err = JobError::unrecoverable(anyhow::anyhow!("media record deleted"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("media record deleted"));
    }

    #[test]
    fn test_recoverable_error() {
        let err = JobError::recoverable(anyhow::anyhow!("network timeout"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_from_anyhow_defaults_to_recoverable() {
        let err: JobError = anyhow::anyhow!("some error").into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_from_app_error_follows_retryability() {
        let err: JobError = AppError::CorruptInput("truncated".into()).into();
        assert!(!err.is_recoverable());

        let err: JobError = AppError::Storage("503".into()).into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("bad payload"));
        let job_result = result.unrecoverable();
        assert!(!job_result.unwrap_err().is_recoverable());
    }
}
