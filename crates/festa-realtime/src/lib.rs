//! Festa Realtime – best-effort fan-out to event rooms and the ephemeral
//! progress tracker.
//!
//! Nothing in this crate is durable. Subscribers that lag are dropped by the
//! broadcast channel, and tracker state disappears on restart; the database
//! record remains the source of truth either way.

mod broadcaster;
mod progress;

pub use broadcaster::EventBroadcaster;
pub use progress::ProgressTracker;
