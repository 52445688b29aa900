use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::build::BuiltPopulation;
use super::collaborators::{ExclusionOracle, RecordStore, RecordStoreError};
use super::criteria::{CriteriaSet, FieldRequest, MatchVerdict};
use super::domain::{EntityKind, EntitySnapshot, HouseholdSnapshot};

/// Service composing the record store, exclusion oracle, and criteria evaluation.
pub struct TargetingService<S, O> {
    store: Arc<S>,
    oracle: Arc<O>,
}

/// Per-household breakdown of a criteria set applied to a candidate list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetingPreview {
    pub matched: Vec<String>,
    pub not_matched: Vec<String>,
    pub excluded_by_id: Vec<String>,
    pub excluded_by_adjudication: Vec<String>,
    pub excluded_by_sanctions: Vec<String>,
    pub missing: Vec<String>,
}

impl TargetingPreview {
    fn record(&mut self, household_id: String, verdict: MatchVerdict) {
        let bucket = match verdict {
            MatchVerdict::Matched => &mut self.matched,
            MatchVerdict::NotMatched => &mut self.not_matched,
            MatchVerdict::ExcludedById => &mut self.excluded_by_id,
            MatchVerdict::ExcludedByAdjudication => &mut self.excluded_by_adjudication,
            MatchVerdict::ExcludedBySanctions => &mut self.excluded_by_sanctions,
        };
        bucket.push(household_id);
    }
}

impl<S, O> TargetingService<S, O>
where
    S: RecordStore + 'static,
    O: ExclusionOracle + 'static,
{
    pub fn new(store: Arc<S>, oracle: Arc<O>) -> Self {
        Self { store, oracle }
    }

    /// Load every field the criteria read for one household and its members.
    pub fn snapshot(
        &self,
        criteria: &CriteriaSet,
        household_id: &str,
    ) -> Result<Option<HouseholdSnapshot>, TargetingError> {
        let Some(members) = self.store.members(household_id)? else {
            return Ok(None);
        };
        let requests = criteria.referenced_fields();

        let household = self.load_entity(&members.household_id, EntityKind::Household, &requests)?;
        let individuals = members
            .individual_ids
            .iter()
            .map(|id| self.load_entity(id, EntityKind::Individual, &requests))
            .collect::<Result<Vec<_>, _>>()?;
        let collectors = members
            .collector_ids
            .iter()
            .map(|id| self.load_entity(id, EntityKind::Collector, &requests))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(HouseholdSnapshot {
            household,
            individuals,
            collectors,
        }))
    }

    fn load_entity(
        &self,
        entity_id: &str,
        kind: EntityKind,
        requests: &[FieldRequest],
    ) -> Result<EntitySnapshot, TargetingError> {
        let mut entity = EntitySnapshot::new(entity_id);
        for request in requests.iter().filter(|request| request.field.entity() == kind) {
            if let Some(value) = self.store.lookup(entity_id, &request.field, request.round)? {
                entity.set(request.field.name(), request.round, value);
            }
        }
        Ok(entity)
    }

    pub fn preview<I, T>(
        &self,
        criteria: &CriteriaSet,
        household_ids: I,
    ) -> Result<TargetingPreview, TargetingError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut preview = TargetingPreview::default();
        for household_id in household_ids {
            let household_id = household_id.as_ref();
            match self.snapshot(criteria, household_id)? {
                Some(snapshot) => {
                    let verdict = criteria.verdict(&snapshot, self.oracle.as_ref());
                    preview.record(household_id.to_string(), verdict);
                }
                None => preview.missing.push(household_id.to_string()),
            }
        }

        debug!(
            matched = preview.matched.len(),
            not_matched = preview.not_matched.len(),
            missing = preview.missing.len(),
            "targeting preview evaluated"
        );
        Ok(preview)
    }

    /// Evaluate the candidates and keep the matching households.
    pub fn materialize<I, T>(
        &self,
        criteria: &CriteriaSet,
        household_ids: I,
    ) -> Result<BuiltPopulation, TargetingError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let preview = self.preview(criteria, household_ids)?;
        Ok(BuiltPopulation {
            household_ids: preview.matched,
        })
    }
}

/// Error raised by the targeting service.
#[derive(Debug, thiserror::Error)]
pub enum TargetingError {
    #[error(transparent)]
    Store(#[from] RecordStoreError),
}
