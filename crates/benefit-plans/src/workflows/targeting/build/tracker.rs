use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use super::{
    BuildError, BuildEvent, BuildExecutor, BuildFailed, BuildProgress, BuildStatus, BuildTicket,
    BuildVersion, BuiltPopulation,
};
use crate::workflows::targeting::CriteriaSet;
use crate::workflows::PlanId;

#[derive(Debug, Clone)]
enum AttemptState {
    Pending,
    Building,
    Ok(BuiltPopulation),
    Failed(BuildFailed),
}

impl AttemptState {
    fn status(&self) -> BuildStatus {
        match self {
            AttemptState::Pending => BuildStatus::Pending,
            AttemptState::Building => BuildStatus::Building,
            AttemptState::Ok(_) => BuildStatus::Ok,
            AttemptState::Failed(_) => BuildStatus::Failed,
        }
    }
}

#[derive(Debug, Clone)]
struct BuildAttempt {
    version: BuildVersion,
    state: AttemptState,
    submitted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Why an event was ignored instead of applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    ForeignPlan,
    NoAttempt,
    Superseded,
    UnknownVersion,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Applied(BuildStatus),
    Discarded(DiscardReason),
}

/// Serializable view of the tracked attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSnapshot {
    pub plan_id: PlanId,
    pub version: BuildVersion,
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tracks the population build of one plan. Only the latest submission counts.
///
/// Each `submit` or `retarget` bumps a generation counter published over a watch
/// channel, which lets pollers for an older attempt or plan stop right away.
#[derive(Debug)]
pub struct BuildStatusTracker {
    plan_id: PlanId,
    last_version: u64,
    attempt: Option<BuildAttempt>,
    generation: watch::Sender<u64>,
}

impl BuildStatusTracker {
    pub fn new(plan_id: PlanId) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            plan_id,
            last_version: 0,
            attempt: None,
            generation,
        }
    }

    pub fn plan_id(&self) -> &PlanId {
        &self.plan_id
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn bump_generation(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    fn next_ticket(&self) -> BuildTicket {
        BuildTicket {
            plan_id: self.plan_id.clone(),
            version: BuildVersion(self.last_version + 1),
        }
    }

    /// Start a new attempt, superseding any attempt still in flight.
    pub fn submit(&mut self, criteria: &CriteriaSet) -> Result<BuildTicket, BuildError> {
        if criteria.is_empty() {
            return Err(BuildError::EmptyCriteria(self.plan_id.clone()));
        }
        let ticket = self.next_ticket();
        self.commit(&ticket);
        Ok(ticket)
    }

    /// Hand the criteria to the executor, then start tracking. Nothing changes if enqueueing fails.
    pub fn submit_to<E>(
        &mut self,
        criteria: &CriteriaSet,
        executor: &E,
    ) -> Result<BuildTicket, BuildError>
    where
        E: BuildExecutor + ?Sized,
    {
        if criteria.is_empty() {
            return Err(BuildError::EmptyCriteria(self.plan_id.clone()));
        }
        let ticket = self.next_ticket();
        executor.enqueue(&ticket, criteria)?;
        self.commit(&ticket);
        Ok(ticket)
    }

    fn commit(&mut self, ticket: &BuildTicket) {
        let now = Utc::now();
        if let Some(previous) = &self.attempt {
            if !previous.state.status().is_terminal() {
                debug!(
                    plan_id = %self.plan_id,
                    superseded = previous.version.0,
                    "superseding in-flight build attempt"
                );
            }
        }
        self.last_version = ticket.version.0;
        self.attempt = Some(BuildAttempt {
            version: ticket.version,
            state: AttemptState::Pending,
            submitted_at: now,
            updated_at: now,
        });
        self.bump_generation();
        info!(plan_id = %self.plan_id, version = ticket.version.0, "population build submitted");
    }

    /// Point the tracker at another plan. The current attempt is dropped and pollers stop.
    ///
    /// Versions keep counting across retargets, so an attempt issued before a round trip
    /// back to the same plan can never be mistaken for a fresh one.
    pub fn retarget(&mut self, plan_id: PlanId) {
        if plan_id == self.plan_id {
            return;
        }
        self.plan_id = plan_id;
        self.attempt = None;
        self.bump_generation();
    }

    pub fn is_current(&self, ticket: &BuildTicket) -> bool {
        ticket.plan_id == self.plan_id
            && self
                .attempt
                .as_ref()
                .map(|attempt| attempt.version == ticket.version)
                .unwrap_or(false)
    }

    pub fn apply(&mut self, event: BuildEvent) -> Result<EventDisposition, BuildError> {
        if event.plan_id != self.plan_id {
            return Ok(self.discard(&event, DiscardReason::ForeignPlan));
        }
        let Some(current) = self.attempt.as_ref().map(|attempt| attempt.version) else {
            return Ok(self.discard(&event, DiscardReason::NoAttempt));
        };
        if event.version < current {
            return Ok(self.discard(&event, DiscardReason::Superseded));
        }
        if event.version > current {
            return Ok(self.discard(&event, DiscardReason::UnknownVersion));
        }

        let Some(attempt) = self.attempt.as_mut() else {
            return Ok(EventDisposition::Discarded(DiscardReason::NoAttempt));
        };
        let from = attempt.state.status();
        let to = event.progress.status();

        if from == to && (from == BuildStatus::Building || from.is_terminal()) {
            debug!(plan_id = %event.plan_id, version = event.version.0, "duplicate build event");
            return Ok(EventDisposition::Discarded(DiscardReason::Duplicate));
        }
        if from.is_terminal() {
            return Err(BuildError::InvalidProgress { from, to });
        }

        attempt.state = match event.progress {
            BuildProgress::Started => AttemptState::Building,
            BuildProgress::Succeeded(population) => AttemptState::Ok(population),
            BuildProgress::Failed { reason } => AttemptState::Failed(BuildFailed { reason }),
        };
        attempt.updated_at = Utc::now();

        info!(
            plan_id = %event.plan_id,
            version = event.version.0,
            status = to.label(),
            "population build progressed"
        );
        Ok(EventDisposition::Applied(to))
    }

    fn discard(&self, event: &BuildEvent, reason: DiscardReason) -> EventDisposition {
        debug!(
            plan_id = %event.plan_id,
            version = event.version.0,
            ?reason,
            "discarding build event"
        );
        EventDisposition::Discarded(reason)
    }

    pub fn status(&self) -> Option<BuildStatus> {
        self.attempt.as_ref().map(|attempt| attempt.state.status())
    }

    /// Polling is only meaningful while the current attempt is still running.
    pub fn should_poll(&self) -> bool {
        self.status()
            .map(|status| !status.is_terminal())
            .unwrap_or(false)
    }

    /// Terminal result of the current attempt, if it has one.
    pub fn outcome(&self) -> Option<Result<&BuiltPopulation, &BuildFailed>> {
        match &self.attempt.as_ref()?.state {
            AttemptState::Ok(population) => Some(Ok(population)),
            AttemptState::Failed(failure) => Some(Err(failure)),
            AttemptState::Pending | AttemptState::Building => None,
        }
    }

    pub fn snapshot(&self) -> Option<BuildSnapshot> {
        let attempt = self.attempt.as_ref()?;
        let (population_size, failure_reason) = match &attempt.state {
            AttemptState::Ok(population) => (Some(population.len()), None),
            AttemptState::Failed(failure) => (None, Some(failure.reason.clone())),
            AttemptState::Pending | AttemptState::Building => (None, None),
        };
        Some(BuildSnapshot {
            plan_id: self.plan_id.clone(),
            version: attempt.version,
            status: attempt.state.status(),
            population_size,
            failure_reason,
            submitted_at: attempt.submitted_at,
            updated_at: attempt.updated_at,
        })
    }
}
