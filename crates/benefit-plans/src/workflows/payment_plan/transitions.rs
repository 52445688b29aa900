use serde::{Deserialize, Serialize};

use super::domain::{ApprovalStage, PlanStatus};

/// Action a caller asks the workflow to perform on a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Lock,
    Remove,
    Unlock,
    SetFsp,
    UnlockFsp,
    SendForApproval,
    Approve,
    Authorize,
    MarkReleased,
    Reject,
    Finalize,
}

impl PlanAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Remove => "remove",
            Self::Unlock => "unlock",
            Self::SetFsp => "set_fsp",
            Self::UnlockFsp => "unlock_fsp",
            Self::SendForApproval => "send_for_approval",
            Self::Approve => "approve",
            Self::Authorize => "authorize",
            Self::MarkReleased => "mark_released",
            Self::Reject => "reject",
            Self::Finalize => "finalize",
        }
    }
}

/// Permission consulted before a guarded action mutates anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Lock,
    Remove,
    Unlock,
    SendForApproval,
    Approve,
    Authorize,
    MarkAsReleased,
}

impl Capability {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lock => "can_lock",
            Self::Remove => "can_remove",
            Self::Unlock => "can_unlock",
            Self::SendForApproval => "can_send_for_approval",
            Self::Approve => "can_approve",
            Self::Authorize => "can_authorize",
            Self::MarkAsReleased => "can_mark_as_released",
        }
    }
}

/// Where a transition leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Status { status: PlanStatus },
    /// Records an approval; moves to `advance_to` once the stage quorum is met.
    Quorum {
        stage: ApprovalStage,
        advance_to: PlanStatus,
    },
    /// Rejection: clears the stage tally and steps back one status.
    Demote { stage: ApprovalStage, to: PlanStatus },
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: PlanStatus,
    pub action: PlanAction,
    /// `None` for transitions driven by an external system.
    pub guard: Option<Capability>,
    pub to: Destination,
}

const fn edge(
    from: PlanStatus,
    action: PlanAction,
    guard: Option<Capability>,
    to: Destination,
) -> Transition {
    Transition {
        from,
        action,
        guard,
        to,
    }
}

/// Every legal plan transition. No entry leaves FINISHED or a removed plan.
pub static TRANSITIONS: &[Transition] = &[
    edge(
        PlanStatus::Open,
        PlanAction::Lock,
        Some(Capability::Lock),
        Destination::Status {
            status: PlanStatus::Locked,
        },
    ),
    edge(
        PlanStatus::Open,
        PlanAction::Remove,
        Some(Capability::Remove),
        Destination::Deleted,
    ),
    edge(
        PlanStatus::Locked,
        PlanAction::Unlock,
        Some(Capability::Unlock),
        Destination::Status {
            status: PlanStatus::Open,
        },
    ),
    edge(
        PlanStatus::Locked,
        PlanAction::SetFsp,
        Some(Capability::Lock),
        Destination::Status {
            status: PlanStatus::LockedFsp,
        },
    ),
    edge(
        PlanStatus::LockedFsp,
        PlanAction::UnlockFsp,
        Some(Capability::Unlock),
        Destination::Status {
            status: PlanStatus::Locked,
        },
    ),
    edge(
        PlanStatus::LockedFsp,
        PlanAction::SendForApproval,
        Some(Capability::SendForApproval),
        Destination::Status {
            status: PlanStatus::InApproval,
        },
    ),
    edge(
        PlanStatus::InApproval,
        PlanAction::Approve,
        Some(Capability::Approve),
        Destination::Quorum {
            stage: ApprovalStage::Approval,
            advance_to: PlanStatus::InAuthorization,
        },
    ),
    edge(
        PlanStatus::InApproval,
        PlanAction::Reject,
        Some(Capability::Approve),
        Destination::Demote {
            stage: ApprovalStage::Approval,
            to: PlanStatus::LockedFsp,
        },
    ),
    edge(
        PlanStatus::InAuthorization,
        PlanAction::Authorize,
        Some(Capability::Authorize),
        Destination::Quorum {
            stage: ApprovalStage::Authorization,
            advance_to: PlanStatus::InReview,
        },
    ),
    edge(
        PlanStatus::InAuthorization,
        PlanAction::Reject,
        Some(Capability::Authorize),
        Destination::Demote {
            stage: ApprovalStage::Authorization,
            to: PlanStatus::InApproval,
        },
    ),
    edge(
        PlanStatus::InReview,
        PlanAction::MarkReleased,
        Some(Capability::MarkAsReleased),
        Destination::Quorum {
            stage: ApprovalStage::FinanceRelease,
            advance_to: PlanStatus::Accepted,
        },
    ),
    edge(
        PlanStatus::InReview,
        PlanAction::Reject,
        Some(Capability::MarkAsReleased),
        Destination::Demote {
            stage: ApprovalStage::FinanceRelease,
            to: PlanStatus::InAuthorization,
        },
    ),
    edge(
        PlanStatus::Accepted,
        PlanAction::Finalize,
        None,
        Destination::Status {
            status: PlanStatus::Finished,
        },
    ),
];

pub fn lookup(from: PlanStatus, action: PlanAction) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|transition| transition.from == from && transition.action == action)
}

/// Actions the table offers from `status`, in table order.
pub fn available_actions(status: PlanStatus) -> Vec<PlanAction> {
    TRANSITIONS
        .iter()
        .filter(|transition| transition.from == status)
        .map(|transition| transition.action)
        .collect()
}
