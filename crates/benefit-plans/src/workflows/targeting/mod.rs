//! Beneficiary targeting: typed rules over household, individual, and collector fields,
//! composed into criteria that select the population of a payment plan.
//!
//! Criteria are validated when they are built, so evaluation itself never fails. Data is
//! gathered through [`RecordStore`] into snapshots before any rule runs.

pub mod build;
mod coerce;
mod collaborators;
mod criteria;
mod domain;
mod evaluation;
mod ids;
mod rule;
mod service;

#[cfg(test)]
mod tests;

pub use build::{
    BuildError, BuildEvent, BuildExecutor, BuildFailed, BuildPoller, BuildProgress,
    BuildSnapshot, BuildStatus, BuildStatusSource, BuildStatusTracker, BuildTicket, BuildVersion,
    BuiltPopulation, DiscardReason, EventDisposition, PollOutcome,
};
pub use collaborators::{
    ExclusionOracle, HouseholdMembers, NoExclusions, RecordStore, RecordStoreError,
};
pub use criteria::{
    CriteriaSet, CriteriaSetDraft, Criterion, CriterionDraft, Facet, FieldRequest, FilterBlock,
    FilterBlockDraft, MatchVerdict,
};
pub use domain::{
    EntityKind, EntitySnapshot, FieldRef, FieldRefDraft, FieldType, FieldValue,
    HouseholdSnapshot, ValueType,
};
pub use evaluation::ComparisonEngine;
pub use ids::{parse_id_list, IdKind, HOUSEHOLD_ID_PREFIX, INDIVIDUAL_ID_PREFIX};
pub use rule::{ComparisonMethod, Operand, Rule, RuleDraft};
pub use service::{TargetingError, TargetingPreview, TargetingService};
