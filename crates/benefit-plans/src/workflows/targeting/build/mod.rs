//! Tracking of the externally executed job that turns a criteria set into a population.

mod poller;
mod tracker;

pub use poller::{BuildPoller, BuildStatusSource, PollOutcome};
pub use tracker::{BuildSnapshot, BuildStatusTracker, DiscardReason, EventDisposition};

use serde::{Deserialize, Serialize};

use super::CriteriaSet;
use crate::workflows::PlanId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Pending,
    Building,
    Ok,
    Failed,
}

impl BuildStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Building => "building",
            Self::Ok => "ok",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Failed)
    }
}

/// Monotonic attempt number within one tracked plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildVersion(pub u64);

/// Handle for one submitted attempt; executors echo it back in their events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildTicket {
    pub plan_id: PlanId,
    pub version: BuildVersion,
}

/// Households selected by a finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltPopulation {
    pub household_ids: Vec<String>,
}

impl BuiltPopulation {
    pub fn len(&self) -> usize {
        self.household_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.household_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildProgress {
    Started,
    Succeeded(BuiltPopulation),
    Failed { reason: String },
}

impl BuildProgress {
    pub fn status(&self) -> BuildStatus {
        match self {
            BuildProgress::Started => BuildStatus::Building,
            BuildProgress::Succeeded(_) => BuildStatus::Ok,
            BuildProgress::Failed { .. } => BuildStatus::Failed,
        }
    }
}

/// Status report from the build executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub plan_id: PlanId,
    pub version: BuildVersion,
    pub progress: BuildProgress,
}

impl BuildEvent {
    pub fn new(ticket: &BuildTicket, progress: BuildProgress) -> Self {
        Self {
            plan_id: ticket.plan_id.clone(),
            version: ticket.version,
            progress,
        }
    }
}

/// Terminal failure reported by the executor. Never retried without a new submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("population build failed: {reason}")]
pub struct BuildFailed {
    pub reason: String,
}

/// External batch job that materializes a population asynchronously.
pub trait BuildExecutor: Send + Sync {
    fn enqueue(&self, ticket: &BuildTicket, criteria: &CriteriaSet) -> Result<(), BuildError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("plan {0} has no authored criteria to build from")]
    EmptyCriteria(PlanId),
    #[error("build cannot move from {from:?} to {to:?}")]
    InvalidProgress { from: BuildStatus, to: BuildStatus },
    #[error("build executor unavailable: {0}")]
    Executor(String),
}
