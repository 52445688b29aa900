use serde::{Deserialize, Serialize};

use super::domain::{FieldRef, FieldValue};

/// Membership of a household as known to the record store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMembers {
    pub household_id: String,
    pub individual_ids: Vec<String>,
    pub collector_ids: Vec<String>,
}

/// Source of beneficiary data. Consulted before evaluation, never during it.
pub trait RecordStore: Send + Sync {
    fn members(&self, household_id: &str) -> Result<Option<HouseholdMembers>, RecordStoreError>;

    fn lookup(
        &self,
        entity_id: &str,
        field: &FieldRef,
        round: Option<u32>,
    ) -> Result<Option<FieldValue>, RecordStoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordStoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Lookups backing the exclusion flags of a criteria set.
pub trait ExclusionOracle: Send + Sync {
    fn has_active_adjudication_ticket(&self, entity_id: &str) -> bool;
    fn is_on_sanction_list(&self, entity_id: &str) -> bool;
}

/// Oracle for hosts that run no adjudication or sanction screening.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExclusions;

impl ExclusionOracle for NoExclusions {
    fn has_active_adjudication_ticket(&self, _entity_id: &str) -> bool {
        false
    }

    fn is_on_sanction_list(&self, _entity_id: &str) -> bool {
        false
    }
}
