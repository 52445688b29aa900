use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::{ActorId, PlanId, ValidationError};

/// Lifecycle status of a payment plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Open,
    Locked,
    LockedFsp,
    InApproval,
    InAuthorization,
    InReview,
    Accepted,
    Finished,
}

impl PlanStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Locked => "LOCKED",
            Self::LockedFsp => "LOCKED_FSP",
            Self::InApproval => "IN_APPROVAL",
            Self::InAuthorization => "IN_AUTHORIZATION",
            Self::InReview => "IN_REVIEW",
            Self::Accepted => "ACCEPTED",
            Self::Finished => "FINISHED",
        }
    }

    /// Approval stage collecting decisions while the plan sits in this status.
    pub const fn approval_stage(self) -> Option<ApprovalStage> {
        match self {
            Self::InApproval => Some(ApprovalStage::Approval),
            Self::InAuthorization => Some(ApprovalStage::Authorization),
            Self::InReview => Some(ApprovalStage::FinanceRelease),
            _ => None,
        }
    }
}

/// One of the three quorum-gated sign-off rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStage {
    Approval,
    Authorization,
    FinanceRelease,
}

impl ApprovalStage {
    pub const ALL: [ApprovalStage; 3] = [
        ApprovalStage::Approval,
        ApprovalStage::Authorization,
        ApprovalStage::FinanceRelease,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Authorization => "authorization",
            Self::FinanceRelease => "finance_release",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

/// Single sign-off (or rejection) by an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub actor_id: ActorId,
    pub decision: ApprovalDecision,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub stage: ApprovalStage,
}

/// Number of distinct approvals each stage needs before the plan advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalQuorum {
    pub approval: u32,
    pub authorization: u32,
    pub finance_release: u32,
}

impl Default for ApprovalQuorum {
    fn default() -> Self {
        Self {
            approval: 1,
            authorization: 1,
            finance_release: 1,
        }
    }
}

impl ApprovalQuorum {
    pub fn validate(self) -> Result<Self, ValidationError> {
        for stage in ApprovalStage::ALL {
            let value = self.required(stage);
            if value == 0 {
                return Err(ValidationError::InvalidQuorum { stage, value });
            }
        }
        Ok(self)
    }

    pub const fn required(&self, stage: ApprovalStage) -> u32 {
        match stage {
            ApprovalStage::Approval => self.approval,
            ApprovalStage::Authorization => self.authorization,
            ApprovalStage::FinanceRelease => self.finance_release,
        }
    }
}

/// Long-running side job shown next to the plan status. Never gates a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundActionStatus {
    RuleEngineRun,
    RuleEngineError,
    XlsxExporting,
    XlsxExportError,
    XlsxImportingEntitlements,
    XlsxImportingReconciliation,
    XlsxImportError,
    ExcludeBeneficiaries,
    ExcludeBeneficiariesError,
    SendToPaymentGateway,
    SendToPaymentGatewayError,
}

impl BackgroundActionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::RuleEngineRun => "RULE_ENGINE_RUN",
            Self::RuleEngineError => "RULE_ENGINE_ERROR",
            Self::XlsxExporting => "XLSX_EXPORTING",
            Self::XlsxExportError => "XLSX_EXPORT_ERROR",
            Self::XlsxImportingEntitlements => "XLSX_IMPORTING_ENTITLEMENTS",
            Self::XlsxImportingReconciliation => "XLSX_IMPORTING_RECONCILIATION",
            Self::XlsxImportError => "XLSX_IMPORT_ERROR",
            Self::ExcludeBeneficiaries => "EXCLUDE_BENEFICIARIES",
            Self::ExcludeBeneficiariesError => "EXCLUDE_BENEFICIARIES_ERROR",
            Self::SendToPaymentGateway => "SEND_TO_PAYMENT_GATEWAY",
            Self::SendToPaymentGatewayError => "SEND_TO_PAYMENT_GATEWAY_ERROR",
        }
    }

    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::RuleEngineError
                | Self::XlsxExportError
                | Self::XlsxImportError
                | Self::ExcludeBeneficiariesError
                | Self::SendToPaymentGatewayError
        )
    }
}

/// Financial service provider delivering the payments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FspId(pub String);

/// Decisions recorded towards the quorum of each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTallies {
    #[serde(default)]
    approval: Vec<ApprovalRecord>,
    #[serde(default)]
    authorization: Vec<ApprovalRecord>,
    #[serde(default)]
    finance_release: Vec<ApprovalRecord>,
}

impl StageTallies {
    pub fn records(&self, stage: ApprovalStage) -> &[ApprovalRecord] {
        match stage {
            ApprovalStage::Approval => &self.approval,
            ApprovalStage::Authorization => &self.authorization,
            ApprovalStage::FinanceRelease => &self.finance_release,
        }
    }

    fn records_mut(&mut self, stage: ApprovalStage) -> &mut Vec<ApprovalRecord> {
        match stage {
            ApprovalStage::Approval => &mut self.approval,
            ApprovalStage::Authorization => &mut self.authorization,
            ApprovalStage::FinanceRelease => &mut self.finance_release,
        }
    }

    pub fn approvals(&self, stage: ApprovalStage) -> usize {
        self.records(stage)
            .iter()
            .filter(|record| record.decision == ApprovalDecision::Approve)
            .count()
    }

    pub fn has_decided(&self, stage: ApprovalStage, actor: &ActorId) -> bool {
        self.records(stage)
            .iter()
            .any(|record| &record.actor_id == actor)
    }

    pub(crate) fn record(&mut self, record: ApprovalRecord) {
        self.records_mut(record.stage).push(record);
    }

    pub(crate) fn clear(&mut self, stage: ApprovalStage) {
        self.records_mut(stage).clear();
    }

    pub(crate) fn clear_all(&mut self) {
        for stage in ApprovalStage::ALL {
            self.clear(stage);
        }
    }
}

/// A payment plan as stored by the host. Status and tallies only change through
/// [`ApprovalWorkflow`](super::ApprovalWorkflow).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPlan {
    id: PlanId,
    status: PlanStatus,
    version: u64,
    #[serde(default)]
    removed: bool,
    #[serde(default)]
    fsp: Option<FspId>,
    #[serde(default)]
    quorum: Option<ApprovalQuorum>,
    #[serde(default)]
    tallies: StageTallies,
    #[serde(default)]
    history: Vec<ApprovalRecord>,
    #[serde(default)]
    background_action: Option<BackgroundActionStatus>,
    created_by: ActorId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentPlan {
    pub(crate) fn open(id: PlanId, created_by: ActorId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: PlanStatus::Open,
            version: 1,
            removed: false,
            fsp: None,
            quorum: None,
            tallies: StageTallies::default(),
            history: Vec::new(),
            background_action: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &PlanId {
        &self.id
    }

    pub fn status(&self) -> PlanStatus {
        self.status
    }

    /// Stamp bumped by every accepted change; used for compare-and-swap.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn fsp(&self) -> Option<&FspId> {
        self.fsp.as_ref()
    }

    /// Thresholds frozen when the plan was sent for approval.
    pub fn quorum(&self) -> Option<ApprovalQuorum> {
        self.quorum
    }

    pub fn tallies(&self) -> &StageTallies {
        &self.tallies
    }

    /// Every decision ever recorded, including those cleared from the tallies.
    pub fn history(&self) -> &[ApprovalRecord] {
        &self.history
    }

    pub fn background_action(&self) -> Option<BackgroundActionStatus> {
        self.background_action
    }

    pub fn created_by(&self) -> &ActorId {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn set_status(&mut self, status: PlanStatus) {
        self.status = status;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }

    pub(crate) fn set_fsp(&mut self, fsp: Option<FspId>) {
        self.fsp = fsp;
    }

    pub(crate) fn freeze_quorum(&mut self, quorum: ApprovalQuorum) {
        self.quorum = Some(quorum);
        self.tallies.clear_all();
    }

    pub(crate) fn tallies_mut(&mut self) -> &mut StageTallies {
        &mut self.tallies
    }

    pub(crate) fn append_history(&mut self, record: ApprovalRecord) {
        self.history.push(record);
    }

    pub(crate) fn set_background_action(&mut self, action: Option<BackgroundActionStatus>) {
        self.background_action = action;
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}
