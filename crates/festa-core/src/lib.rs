//! Festa Core Library
//!
//! Domain models, error types, configuration, and constants shared across
//! all Festa pipeline components.

pub mod config;
pub mod constants;
pub mod error;
pub mod job_error;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use error::AppError;
pub use job_error::{JobError, JobResultExt};
