//! The OD request lifecycle.
//!
//! ```text
//! pending ──approve──▶ approved
//!    └─────reject───▶ rejected
//! ```
//!
//! Both `approved` and `rejected` are terminal. Deciding a request does not touch
//! the attendance ledger; attendance is linked to approved requests lazily by
//! [`crate::reconcile`].

use crate::error::{OdError, OdResult};
use crate::models::{OdRequest, OdStatus, Principal};
use chrono::NaiveDateTime;

/// A teacher's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target(self) -> OdStatus {
        match self {
            Decision::Approve => OdStatus::Approved,
            Decision::Reject => OdStatus::Rejected,
        }
    }
}

impl OdStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OdStatus::Pending)
    }

    /// Returns `to` if the lifecycle allows moving there from `self`.
    pub fn transition(self, to: OdStatus) -> OdResult<OdStatus> {
        match (self, to) {
            (OdStatus::Pending, OdStatus::Approved | OdStatus::Rejected) => Ok(to),
            (from, to) => Err(OdError::InvalidTransition { from, to }),
        }
    }
}

/// Applies `decision` to `request`, recording who decided and when.
///
/// The request is left unchanged on error. Whether `actor` may decide this
/// request is the caller's concern.
pub fn decide(
    request: &mut OdRequest,
    decision: Decision,
    actor: &Principal,
    at: NaiveDateTime,
) -> OdResult<()> {
    request.status = request.status.transition(decision.target())?;
    // Rejections are stamped too; the audit fields record the decider either way.
    request.approved_by = Some(actor.email.clone());
    request.approved_at = Some(at);
    Ok(())
}
