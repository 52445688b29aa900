use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use super::tracker::BuildStatusTracker;
use super::{BuildError, BuildEvent, BuildStatus, BuildTicket};

/// Where the poller asks for the latest status of an attempt.
pub trait BuildStatusSource: Send + Sync {
    fn fetch(
        &self,
        ticket: &BuildTicket,
    ) -> impl Future<Output = Result<Option<BuildEvent>, BuildError>> + Send;
}

/// How a poll loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(BuildStatus),
    Superseded,
    Retargeted,
}

/// Periodically feeds status from a source into a shared tracker.
pub struct BuildPoller<S> {
    tracker: Arc<Mutex<BuildStatusTracker>>,
    source: Arc<S>,
    interval: Duration,
}

impl<S> BuildPoller<S>
where
    S: BuildStatusSource,
{
    pub fn new(tracker: Arc<Mutex<BuildStatusTracker>>, source: Arc<S>, interval: Duration) -> Self {
        Self {
            tracker,
            source,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until the attempt behind `ticket` reaches a terminal status, is superseded
    /// by a newer submission, or the tracker moves to another plan.
    pub async fn run(&self, ticket: BuildTicket) -> PollOutcome {
        let mut generation = {
            let tracker = self.tracker.lock().expect("build tracker mutex poisoned");
            tracker.subscribe()
        };
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(outcome) = self.settled(&ticket) {
                debug!(plan_id = %ticket.plan_id, version = ticket.version.0, ?outcome, "build polling stopped");
                return outcome;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = generation.changed() => {
                    if changed.is_err() {
                        return PollOutcome::Superseded;
                    }
                    continue;
                }
            }

            match self.source.fetch(&ticket).await {
                Ok(Some(event)) => {
                    let mut tracker = self.tracker.lock().expect("build tracker mutex poisoned");
                    if let Err(error) = tracker.apply(event) {
                        warn!(plan_id = %ticket.plan_id, %error, "rejected build status event");
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(plan_id = %ticket.plan_id, %error, "build status fetch failed; retrying");
                }
            }
        }
    }

    fn settled(&self, ticket: &BuildTicket) -> Option<PollOutcome> {
        let tracker = self.tracker.lock().expect("build tracker mutex poisoned");
        if tracker.plan_id() != &ticket.plan_id {
            return Some(PollOutcome::Retargeted);
        }
        if !tracker.is_current(ticket) {
            return Some(PollOutcome::Superseded);
        }
        match tracker.status() {
            Some(status) if status.is_terminal() => Some(PollOutcome::Completed(status)),
            _ => None,
        }
    }
}
