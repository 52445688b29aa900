use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    ApprovalDecision, ApprovalQuorum, ApprovalRecord, ApprovalStage, BackgroundActionStatus,
    FspId, PaymentPlan, PlanStatus,
};
use super::repository::{PlanRepository, PlanRepositoryError, PlanStatusView};
use super::transitions::{lookup, Capability, Destination, PlanAction, Transition};
use crate::workflows::{ActorId, PlanId, ValidationError};

/// Actor recorded when the payment system closes out a plan.
pub const PAYMENT_SYSTEM_ACTOR: &str = "payment-system";

/// Who is driving a transition. Unguarded edges belong to the payment system alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Caller {
    User,
    PaymentSystem,
}

/// Permission lookup consulted by every guarded transition.
pub trait CapabilityCheck: Send + Sync {
    fn can(&self, actor: &ActorId, capability: Capability, plan_id: &PlanId) -> bool;
}

/// Request to perform one action on a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCommand {
    pub actor_id: ActorId,
    pub action: PlanAction,
    /// Version the caller last observed. A mismatch is reported as a conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fsp: Option<FspId>,
}

impl PlanCommand {
    pub fn new(actor_id: ActorId, action: PlanAction) -> Self {
        Self {
            actor_id,
            action,
            expected_version: None,
            comment: None,
            fsp: None,
        }
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_fsp(mut self, fsp: FspId) -> Self {
        self.fsp = Some(fsp);
        self
    }
}

/// Result of an accepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub plan: PaymentPlan,
    pub action: PlanAction,
    pub from: PlanStatus,
}

impl TransitionOutcome {
    pub fn to(&self) -> PlanStatus {
        self.plan.status()
    }

    /// False when an approval was recorded but the stage quorum is still open.
    pub fn status_changed(&self) -> bool {
        self.from != self.plan.status() || self.plan.is_removed()
    }
}

/// Drives payment plans through the canonical transition table.
///
/// Every change is computed on a copy of the stored plan and written back with a
/// compare-and-swap on the plan version, so concurrent callers racing on the same
/// plan see exactly one winner and a `Conflict` for the rest.
pub struct ApprovalWorkflow<R, C> {
    repository: Arc<R>,
    capabilities: Arc<C>,
    quorum: ApprovalQuorum,
}

impl<R, C> ApprovalWorkflow<R, C>
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    pub fn new(
        repository: Arc<R>,
        capabilities: Arc<C>,
        quorum: ApprovalQuorum,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            repository,
            capabilities,
            quorum: quorum.validate()?,
        })
    }

    /// Quorum frozen onto plans when they are sent for approval.
    pub fn quorum(&self) -> ApprovalQuorum {
        self.quorum
    }

    pub fn open(&self, plan_id: PlanId, actor: &ActorId) -> Result<PaymentPlan, WorkflowError> {
        let plan = PaymentPlan::open(plan_id, actor.clone(), Utc::now());
        let stored = self.repository.insert(plan)?;
        info!(plan_id = %stored.id(), actor = %actor, "payment plan opened");
        Ok(stored)
    }

    pub fn get(&self, plan_id: &PlanId) -> Result<PaymentPlan, WorkflowError> {
        self.repository
            .fetch(plan_id)?
            .ok_or_else(|| WorkflowError::NotFound(plan_id.clone()))
    }

    pub fn status_view(&self, plan_id: &PlanId) -> Result<PlanStatusView, WorkflowError> {
        Ok(self.get(plan_id)?.status_view())
    }

    /// Apply a user command. Unguarded edges such as `finalize` are not reachable from here.
    pub fn apply(
        &self,
        plan_id: &PlanId,
        command: PlanCommand,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.perform(plan_id, command, Caller::User)
    }

    /// Move an ACCEPTED plan to FINISHED once the payment system has delivered it.
    pub fn finalize(
        &self,
        plan_id: &PlanId,
        expected_version: Option<u64>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let mut command = PlanCommand::new(ActorId::new(PAYMENT_SYSTEM_ACTOR), PlanAction::Finalize);
        command.expected_version = expected_version;
        self.perform(plan_id, command, Caller::PaymentSystem)
    }

    fn perform(
        &self,
        plan_id: &PlanId,
        command: PlanCommand,
        caller: Caller,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let current = self.get(plan_id)?;
        let from = current.status();

        let transition = lookup(from, command.action)
            .filter(|_| !current.is_removed())
            .filter(|transition| (caller == Caller::PaymentSystem) == transition.guard.is_none())
            .ok_or(WorkflowError::InvalidTransition {
                status: from,
                action: command.action,
            })?;

        if let Some(capability) = transition.guard {
            if !self.capabilities.can(&command.actor_id, capability, plan_id) {
                return Err(WorkflowError::PermissionDenied {
                    actor: command.actor_id.clone(),
                    capability,
                    plan_id: plan_id.clone(),
                });
            }
        }

        check_version(&current, command.expected_version)?;

        let now = Utc::now();
        let mut next = current.clone();
        self.advance(&mut next, transition, &command, now)?;
        next.touch(now);

        let stored = self.swap(next, current.version())?;
        info!(
            plan_id = %plan_id,
            actor = %command.actor_id,
            action = command.action.label(),
            from = from.label(),
            to = stored.status().label(),
            version = stored.version(),
            "payment plan transition applied"
        );

        Ok(TransitionOutcome {
            plan: stored,
            action: command.action,
            from,
        })
    }

    fn advance(
        &self,
        plan: &mut PaymentPlan,
        transition: &Transition,
        command: &PlanCommand,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        match transition.to {
            Destination::Status { status } => {
                match command.action {
                    PlanAction::SetFsp => {
                        let fsp = command
                            .fsp
                            .clone()
                            .filter(|fsp| !fsp.0.trim().is_empty())
                            .ok_or(WorkflowError::MissingFsp)?;
                        plan.set_fsp(Some(fsp));
                    }
                    PlanAction::UnlockFsp => plan.set_fsp(None),
                    PlanAction::SendForApproval => plan.freeze_quorum(self.quorum),
                    _ => {}
                }
                plan.set_status(status);
            }
            Destination::Quorum { stage, advance_to } => {
                if plan.tallies().has_decided(stage, &command.actor_id) {
                    return Err(WorkflowError::DuplicateDecision {
                        actor: command.actor_id.clone(),
                        stage,
                    });
                }
                let record = decision_record(command, stage, ApprovalDecision::Approve, now);
                plan.tallies_mut().record(record.clone());
                plan.append_history(record);

                let required = plan.quorum().unwrap_or(self.quorum).required(stage);
                let approvals = plan.tallies().approvals(stage);
                if approvals >= required as usize {
                    plan.set_status(advance_to);
                } else {
                    debug!(
                        plan_id = %plan.id(),
                        stage = stage.label(),
                        approvals,
                        required,
                        "approval recorded; quorum not met"
                    );
                }
            }
            Destination::Demote { stage, to } => {
                plan.append_history(decision_record(command, stage, ApprovalDecision::Reject, now));
                plan.tallies_mut().clear(stage);
                if let Some(reentered) = to.approval_stage() {
                    plan.tallies_mut().clear(reentered);
                }
                plan.set_status(to);
            }
            Destination::Deleted => plan.mark_removed(),
        }
        Ok(())
    }

    /// Set or clear the background action overlay. Plan status is neither read nor changed.
    pub fn set_background_action(
        &self,
        plan_id: &PlanId,
        action: Option<BackgroundActionStatus>,
        expected_version: Option<u64>,
    ) -> Result<PaymentPlan, WorkflowError> {
        let current = self.get(plan_id)?;
        check_version(&current, expected_version)?;

        let mut next = current.clone();
        next.set_background_action(action);
        next.touch(Utc::now());

        let stored = self.swap(next, current.version())?;
        info!(
            plan_id = %plan_id,
            background_action = action.map(BackgroundActionStatus::label).unwrap_or("none"),
            "background action updated"
        );
        Ok(stored)
    }

    fn swap(&self, plan: PaymentPlan, expected: u64) -> Result<PaymentPlan, WorkflowError> {
        let plan_id = plan.id().clone();
        self.repository
            .compare_and_swap(plan, expected)
            .map_err(|error| match error {
                PlanRepositoryError::Conflict { expected, found } => WorkflowError::Conflict {
                    plan_id,
                    expected,
                    found,
                },
                PlanRepositoryError::NotFound => WorkflowError::NotFound(plan_id),
                other => WorkflowError::Repository(other),
            })
    }
}

fn check_version(plan: &PaymentPlan, expected: Option<u64>) -> Result<(), WorkflowError> {
    match expected {
        Some(expected) if expected != plan.version() => Err(WorkflowError::Conflict {
            plan_id: plan.id().clone(),
            expected,
            found: plan.version(),
        }),
        _ => Ok(()),
    }
}

fn decision_record(
    command: &PlanCommand,
    stage: ApprovalStage,
    decision: ApprovalDecision,
    now: DateTime<Utc>,
) -> ApprovalRecord {
    ApprovalRecord {
        actor_id: command.actor_id.clone(),
        decision,
        timestamp: now,
        comment: command.comment.clone(),
        stage,
    }
}

/// Error raised by the approval workflow. The stored plan is never partially updated.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{actor} lacks {} on plan {plan_id}", .capability.label())]
    PermissionDenied {
        actor: ActorId,
        capability: Capability,
        plan_id: PlanId,
    },
    #[error("cannot {} a plan in status {}", .action.label(), .status.label())]
    InvalidTransition {
        status: PlanStatus,
        action: PlanAction,
    },
    #[error("plan {plan_id} changed concurrently (expected version {expected}, found {found})")]
    Conflict {
        plan_id: PlanId,
        expected: u64,
        found: u64,
    },
    #[error("{actor} already decided in the {} stage", .stage.label())]
    DuplicateDecision { actor: ActorId, stage: ApprovalStage },
    #[error("set_fsp requires a financial service provider")]
    MissingFsp,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("plan {0} not found")]
    NotFound(PlanId),
    #[error(transparent)]
    Repository(#[from] PlanRepositoryError),
}
