//! Payment plan lifecycle: lock, provider assignment, and quorum-gated approvals.

pub mod domain;
pub mod repository;
pub mod router;
pub mod transitions;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use domain::{
    ApprovalDecision, ApprovalQuorum, ApprovalRecord, ApprovalStage, BackgroundActionStatus,
    FspId, PaymentPlan, PlanStatus, StageTallies,
};
pub use repository::{InMemoryPlanRepository, PlanRepository, PlanRepositoryError, PlanStatusView};
pub use router::{payment_plan_router, BackgroundActionRequest, OpenPlanRequest};
pub use transitions::{
    available_actions, lookup, Capability, Destination, PlanAction, Transition, TRANSITIONS,
};
pub use workflow::{
    ApprovalWorkflow, CapabilityCheck, PlanCommand, TransitionOutcome, WorkflowError,
    PAYMENT_SYSTEM_ACTOR,
};
