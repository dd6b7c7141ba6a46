//! Approval status and the counter-update algorithm.
//!
//! Every place that touches event or participant counters routes through
//! `counter_delta`/`pending_delta`; approval semantics live here and nowhere
//! else. Moderation actions and the job-completion decision both apply the
//! same transition math, which is what keeps the materialized counters from
//! drifting away from the underlying media set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::media::Uploader;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    AutoApproved,
    Hidden,
}

impl ApprovalStatus {
    /// The single approval predicate. Counts toward the event's visible
    /// photo/video totals iff this returns true.
    pub fn is_approved(self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::AutoApproved)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, ApprovalStatus::Pending)
    }
}

impl Display for ApprovalStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
            ApprovalStatus::AutoApproved => write!(f, "auto_approved"),
            ApprovalStatus::Hidden => write!(f, "hidden"),
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            "auto_approved" => Ok(ApprovalStatus::AutoApproved),
            "hidden" => Ok(ApprovalStatus::Hidden),
            _ => Err(anyhow::anyhow!("Invalid approval status: {}", s)),
        }
    }
}

/// Approval sub-record embedded in a media record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalInfo {
    pub status: ApprovalStatus,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    /// Why an automatic decision was taken (e.g. "guest_auto_approve").
    pub auto_reason: Option<String>,
}

impl ApprovalInfo {
    pub fn initial() -> Self {
        Self {
            status: ApprovalStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            auto_reason: None,
        }
    }
}

/// Outcome of the once-per-job approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalDecision {
    pub status: ApprovalStatus,
    pub auto_reason: Option<&'static str>,
}

/// Decide the approval status for a finished upload.
///
/// Registered users are always auto-approved. Guests are held for moderation
/// only when the event requires it.
pub fn decide_approval(uploader: &Uploader, event_requires_approval: bool) -> ApprovalDecision {
    match uploader {
        Uploader::User { .. } => ApprovalDecision {
            status: ApprovalStatus::AutoApproved,
            auto_reason: None,
        },
        Uploader::Guest { .. } if event_requires_approval => ApprovalDecision {
            status: ApprovalStatus::Pending,
            auto_reason: None,
        },
        Uploader::Guest { .. } => ApprovalDecision {
            status: ApprovalStatus::AutoApproved,
            auto_reason: Some("guest_auto_approve"),
        },
    }
}

/// Signed delta to apply to the approved (photos/videos) counters for a
/// status transition. Zero when the transition doesn't cross the approval
/// boundary, which makes re-applying the same transition a no-op.
pub fn counter_delta(previous: Option<ApprovalStatus>, next: ApprovalStatus) -> i64 {
    let was = previous.map(ApprovalStatus::is_approved).unwrap_or(false);
    let is = next.is_approved();
    match (was, is) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

/// Signed delta for the event's pending-approval counter.
pub fn pending_delta(previous: Option<ApprovalStatus>, next: ApprovalStatus) -> i64 {
    let was = previous.map(ApprovalStatus::is_pending).unwrap_or(false);
    let is = next.is_pending();
    match (was, is) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest() -> Uploader {
        Uploader::Guest {
            session_id: Uuid::new_v4(),
            display_name: Some("Aunt Carol".to_string()),
        }
    }

    fn user() -> Uploader {
        Uploader::User {
            user_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_is_approved_predicate() {
        assert!(ApprovalStatus::Approved.is_approved());
        assert!(ApprovalStatus::AutoApproved.is_approved());
        assert!(!ApprovalStatus::Pending.is_approved());
        assert!(!ApprovalStatus::Rejected.is_approved());
        assert!(!ApprovalStatus::Hidden.is_approved());
    }

    #[test]
    fn test_display_from_str_round_trip() {
        for status in [
            ApprovalStatus::Pending,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
            ApprovalStatus::AutoApproved,
            ApprovalStatus::Hidden,
        ] {
            assert_eq!(status.to_string().parse::<ApprovalStatus>().unwrap(), status);
        }
        assert!("visible".parse::<ApprovalStatus>().is_err());
    }

    #[test]
    fn test_registered_user_is_auto_approved() {
        let decision = decide_approval(&user(), true);
        assert_eq!(decision.status, ApprovalStatus::AutoApproved);
        assert_eq!(decision.auto_reason, None);
    }

    #[test]
    fn test_guest_held_when_event_requires_approval() {
        let decision = decide_approval(&guest(), true);
        assert_eq!(decision.status, ApprovalStatus::Pending);
    }

    #[test]
    fn test_guest_auto_approved_when_not_required() {
        let decision = decide_approval(&guest(), false);
        assert_eq!(decision.status, ApprovalStatus::AutoApproved);
        assert_eq!(decision.auto_reason, Some("guest_auto_approve"));
    }

    #[test]
    fn test_counter_delta_initial_decision() {
        // First application, no previous status: only one bucket moves.
        assert_eq!(counter_delta(None, ApprovalStatus::AutoApproved), 1);
        assert_eq!(pending_delta(None, ApprovalStatus::AutoApproved), 0);

        assert_eq!(counter_delta(None, ApprovalStatus::Pending), 0);
        assert_eq!(pending_delta(None, ApprovalStatus::Pending), 1);
    }

    #[test]
    fn test_counter_delta_moderation_transition() {
        // pending -> approved moves one from pending to photos.
        assert_eq!(
            counter_delta(Some(ApprovalStatus::Pending), ApprovalStatus::Approved),
            1
        );
        assert_eq!(
            pending_delta(Some(ApprovalStatus::Pending), ApprovalStatus::Approved),
            -1
        );

        // approved -> hidden removes from photos.
        assert_eq!(
            counter_delta(Some(ApprovalStatus::Approved), ApprovalStatus::Hidden),
            -1
        );
        assert_eq!(
            pending_delta(Some(ApprovalStatus::Approved), ApprovalStatus::Hidden),
            0
        );
    }

    #[test]
    fn test_counter_delta_idempotent_on_same_status() {
        for status in [
            ApprovalStatus::Pending,
            ApprovalStatus::Approved,
            ApprovalStatus::AutoApproved,
            ApprovalStatus::Rejected,
            ApprovalStatus::Hidden,
        ] {
            assert_eq!(counter_delta(Some(status), status), 0);
            assert_eq!(pending_delta(Some(status), status), 0);
        }
    }

    #[test]
    fn test_counter_delta_within_approved_family_is_noop() {
        // approved <-> auto_approved never crosses the boundary.
        assert_eq!(
            counter_delta(Some(ApprovalStatus::Approved), ApprovalStatus::AutoApproved),
            0
        );
        assert_eq!(
            counter_delta(Some(ApprovalStatus::AutoApproved), ApprovalStatus::Approved),
            0
        );
    }
}
