use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde::Serialize;

use super::domain::{ApprovalQuorum, ApprovalStage, FspId, PaymentPlan};
use super::transitions::{available_actions, PlanAction};
use crate::workflows::PlanId;

impl PaymentPlan {
    /// Actions the transition table offers right now. Removed plans offer none.
    pub fn available_actions(&self) -> Vec<PlanAction> {
        if self.is_removed() {
            return Vec::new();
        }
        available_actions(self.status())
    }

    pub fn status_view(&self) -> PlanStatusView {
        PlanStatusView {
            plan_id: self.id().clone(),
            status: self.status().label(),
            version: self.version(),
            removed: self.is_removed(),
            background_action: self.background_action().map(|action| action.label()),
            fsp: self.fsp().cloned(),
            quorum: self.quorum(),
            approvals: ApprovalStage::ALL
                .into_iter()
                .map(|stage| (stage.label(), self.tallies().approvals(stage)))
                .collect(),
            available_actions: self.available_actions(),
        }
    }
}

/// Sanitized representation of a plan for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStatusView {
    pub plan_id: PlanId,
    pub status: &'static str,
    pub version: u64,
    pub removed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fsp: Option<FspId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quorum: Option<ApprovalQuorum>,
    pub approvals: BTreeMap<&'static str, usize>,
    pub available_actions: Vec<PlanAction>,
}

/// Storage abstraction for plans. Writes after creation go through `compare_and_swap`.
pub trait PlanRepository: Send + Sync {
    fn insert(&self, plan: PaymentPlan) -> Result<PaymentPlan, PlanRepositoryError>;
    fn fetch(&self, id: &PlanId) -> Result<Option<PaymentPlan>, PlanRepositoryError>;

    /// Store `plan` only if the stored copy still carries `expected_version`.
    fn compare_and_swap(
        &self,
        plan: PaymentPlan,
        expected_version: u64,
    ) -> Result<PaymentPlan, PlanRepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanRepositoryError {
    #[error("plan already exists")]
    AlreadyExists,
    #[error("plan changed concurrently (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    #[error("plan not found")]
    NotFound,
    #[error("plan repository unavailable: {0}")]
    Unavailable(String),
}

/// Process-local repository used by the API service and tests.
#[derive(Debug, Default)]
pub struct InMemoryPlanRepository {
    plans: Mutex<HashMap<PlanId, PaymentPlan>>,
}

impl InMemoryPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plans.lock().expect("plan repository mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PlanRepository for InMemoryPlanRepository {
    fn insert(&self, plan: PaymentPlan) -> Result<PaymentPlan, PlanRepositoryError> {
        let mut guard = self.plans.lock().expect("plan repository mutex poisoned");
        if guard.contains_key(plan.id()) {
            return Err(PlanRepositoryError::AlreadyExists);
        }
        guard.insert(plan.id().clone(), plan.clone());
        Ok(plan)
    }

    fn fetch(&self, id: &PlanId) -> Result<Option<PaymentPlan>, PlanRepositoryError> {
        let guard = self.plans.lock().expect("plan repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn compare_and_swap(
        &self,
        plan: PaymentPlan,
        expected_version: u64,
    ) -> Result<PaymentPlan, PlanRepositoryError> {
        let mut guard = self.plans.lock().expect("plan repository mutex poisoned");
        let stored = guard
            .get_mut(plan.id())
            .ok_or(PlanRepositoryError::NotFound)?;
        if stored.version() != expected_version {
            return Err(PlanRepositoryError::Conflict {
                expected: expected_version,
                found: stored.version(),
            });
        }
        *stored = plan.clone();
        Ok(plan)
    }
}
