use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::payment_plan::{
    payment_plan_router, ApprovalQuorum, ApprovalWorkflow, Capability, CapabilityCheck, FspId,
    InMemoryPlanRepository, PaymentPlan, PlanAction, PlanCommand, PlanRepository,
    PlanRepositoryError, PlanStatus,
};
use crate::workflows::{ActorId, PlanId};

pub(super) type MemoryWorkflow = ApprovalWorkflow<InMemoryPlanRepository, CapabilityTable>;

pub(super) fn actor(name: &str) -> ActorId {
    ActorId::new(name)
}

pub(super) fn plan_id() -> PlanId {
    PlanId::new("PP-0001")
}

/// Grants keyed by actor. `admin` may do everything.
#[derive(Default)]
pub(super) struct CapabilityTable {
    grants: HashMap<ActorId, HashSet<Capability>>,
}

impl CapabilityTable {
    pub(super) fn standard() -> Self {
        let all = [
            Capability::Lock,
            Capability::Remove,
            Capability::Unlock,
            Capability::SendForApproval,
            Capability::Approve,
            Capability::Authorize,
            Capability::MarkAsReleased,
        ];
        Self::default()
            .grant("admin", &all)
            .grant("approver-1", &[Capability::Approve])
            .grant("approver-2", &[Capability::Approve])
            .grant("authorizer", &[Capability::Authorize])
            .grant("finance", &[Capability::MarkAsReleased])
            .grant("clerk", &[Capability::Lock, Capability::Unlock])
    }

    pub(super) fn grant(mut self, name: &str, capabilities: &[Capability]) -> Self {
        self.grants
            .entry(actor(name))
            .or_default()
            .extend(capabilities.iter().copied());
        self
    }
}

impl CapabilityCheck for CapabilityTable {
    fn can(&self, actor: &ActorId, capability: Capability, _plan_id: &PlanId) -> bool {
        self.grants
            .get(actor)
            .map(|granted| granted.contains(&capability))
            .unwrap_or(false)
    }
}

pub(super) fn build_workflow(quorum: ApprovalQuorum) -> (MemoryWorkflow, Arc<InMemoryPlanRepository>) {
    let repository = Arc::new(InMemoryPlanRepository::new());
    let workflow = ApprovalWorkflow::new(
        repository.clone(),
        Arc::new(CapabilityTable::standard()),
        quorum,
    )
    .expect("valid quorum");
    (workflow, repository)
}

pub(super) fn command(name: &str, action: PlanAction) -> PlanCommand {
    PlanCommand::new(actor(name), action)
}

/// Open a plan and push it forward with `admin` until it reaches `target`.
pub(super) fn plan_at(workflow: &MemoryWorkflow, target: PlanStatus) -> PaymentPlan {
    let mut plan = workflow
        .open(plan_id(), &actor("admin"))
        .expect("plan opens");
    let path = [
        (PlanStatus::Locked, command("admin", PlanAction::Lock)),
        (
            PlanStatus::LockedFsp,
            command("admin", PlanAction::SetFsp).with_fsp(FspId("FSP-MPESA".to_string())),
        ),
        (
            PlanStatus::InApproval,
            command("admin", PlanAction::SendForApproval),
        ),
        (
            PlanStatus::InAuthorization,
            command("approver-1", PlanAction::Approve),
        ),
        (
            PlanStatus::InReview,
            command("authorizer", PlanAction::Authorize),
        ),
        (
            PlanStatus::Accepted,
            command("finance", PlanAction::MarkReleased),
        ),
        (
            PlanStatus::Finished,
            command("payment-system", PlanAction::Finalize),
        ),
    ];

    for (reached, step) in path {
        if plan.status() == target {
            break;
        }
        let outcome = if step.action == PlanAction::Finalize {
            workflow.finalize(&plan_id(), None)
        } else {
            workflow.apply(&plan_id(), step)
        };
        plan = outcome.expect("path step applies").plan;
        assert_eq!(plan.status(), reached, "single-approval quorum expected");
    }
    assert_eq!(plan.status(), target);
    plan
}

pub(super) struct UnavailableRepository;

impl PlanRepository for UnavailableRepository {
    fn insert(&self, _plan: PaymentPlan) -> Result<PaymentPlan, PlanRepositoryError> {
        Err(PlanRepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &PlanId) -> Result<Option<PaymentPlan>, PlanRepositoryError> {
        Err(PlanRepositoryError::Unavailable("database offline".to_string()))
    }

    fn compare_and_swap(
        &self,
        _plan: PaymentPlan,
        _expected_version: u64,
    ) -> Result<PaymentPlan, PlanRepositoryError> {
        Err(PlanRepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router_with(workflow: MemoryWorkflow) -> axum::Router {
    payment_plan_router(Arc::new(workflow))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
