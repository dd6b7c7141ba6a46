//! Festa DB Library
//!
//! sqlx/Postgres repositories for media records, events, and the job queue.
//! Counter mutations always happen inside the same transaction as the media
//! write that caused them; no caller mutates approval state or counters
//! directly.

pub mod db;

pub use db::event::EventRepository;
pub use db::job::{JobRepository, JOB_NOTIFY_CHANNEL};
pub use db::media::{FinalizeOutcome, FinalizeParams, MediaRepository};
