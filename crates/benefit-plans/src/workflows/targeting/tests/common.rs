use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::workflows::targeting::{
    BuildError, BuildEvent, BuildExecutor, BuildStatusSource, BuildTicket, ComparisonMethod,
    CriteriaSet, Criterion, EntityKind, EntitySnapshot, ExclusionOracle, FieldRef, FieldType,
    FieldValue, FilterBlock, HouseholdMembers, HouseholdSnapshot, RecordStore, RecordStoreError,
    Rule, ValueType,
};

pub(super) fn age() -> FieldRef {
    FieldRef::new(
        EntityKind::Individual,
        "age",
        FieldType::plain(ValueType::Number),
    )
    .expect("valid field")
}

pub(super) fn sex() -> FieldRef {
    FieldRef::with_choices(
        EntityKind::Individual,
        "sex",
        FieldType::plain(ValueType::SelectOne),
        ["MALE", "FEMALE"],
    )
    .expect("valid field")
}

pub(super) fn household_size() -> FieldRef {
    FieldRef::new(
        EntityKind::Household,
        "size",
        FieldType::plain(ValueType::Number),
    )
    .expect("valid field")
}

pub(super) fn assets() -> FieldRef {
    FieldRef::with_choices(
        EntityKind::Household,
        "assets",
        FieldType::plain(ValueType::SelectMany),
        ["RADIO", "TV", "CAR", "LIVESTOCK"],
    )
    .expect("valid field")
}

pub(super) fn village() -> FieldRef {
    FieldRef::new(
        EntityKind::Household,
        "village",
        FieldType::plain(ValueType::String),
    )
    .expect("valid field")
}

pub(super) fn registered_on() -> FieldRef {
    FieldRef::new(
        EntityKind::Household,
        "registered_on",
        FieldType::plain(ValueType::Date),
    )
    .expect("valid field")
}

pub(super) fn disabled() -> FieldRef {
    FieldRef::new(
        EntityKind::Individual,
        "disabled",
        FieldType::plain(ValueType::Bool),
    )
    .expect("valid field")
}

pub(super) fn id_photo() -> FieldRef {
    FieldRef::new(
        EntityKind::Collector,
        "id_photo",
        FieldType::plain(ValueType::Image),
    )
    .expect("valid field")
}

pub(super) fn monthly_income() -> FieldRef {
    FieldRef::new(
        EntityKind::Household,
        "monthly_income",
        FieldType::periodic(ValueType::Number, 3),
    )
    .expect("valid field")
}

pub(super) fn rule(field: FieldRef, method: ComparisonMethod, args: &[&str]) -> Rule {
    Rule::new(field, method, args.iter().copied(), None).expect("valid rule")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn number(value: f64) -> FieldValue {
    FieldValue::Number(value)
}

pub(super) fn text(value: &str) -> FieldValue {
    FieldValue::Text(value.to_string())
}

pub(super) fn choices(values: &[&str]) -> FieldValue {
    FieldValue::Choices(values.iter().map(|value| value.to_string()).collect())
}

pub(super) fn person(id: &str, age: f64, sex: &str) -> EntitySnapshot {
    EntitySnapshot::new(id)
        .with("age", number(age))
        .with("sex", text(sex))
}

/// HH-1: five members, one girl aged 9 and one woman aged 34.
pub(super) fn household_one() -> HouseholdSnapshot {
    HouseholdSnapshot::new(
        EntitySnapshot::new("HH-1")
            .with("size", number(5.0))
            .with("village", text("Kalemie North"))
            .with("assets", choices(&["RADIO", "LIVESTOCK"])),
    )
    .with_individual(person("IND-11", 9.0, "FEMALE"))
    .with_individual(person("IND-12", 34.0, "FEMALE"))
    .with_collector(EntitySnapshot::new("IND-12"))
}

/// HH-2: a single adult man.
pub(super) fn household_two() -> HouseholdSnapshot {
    HouseholdSnapshot::new(
        EntitySnapshot::new("HH-2")
            .with("size", number(1.0))
            .with("village", text("Moba")),
    )
    .with_individual(person("IND-21", 41.0, "MALE"))
}

/// Criterion selecting households with a child aged 7 to 15.
pub(super) fn child_criterion() -> Criterion {
    let block = FilterBlock::new(
        EntityKind::Individual,
        vec![rule(age(), ComparisonMethod::Range, &["7", "15"])],
    )
    .expect("valid block");
    Criterion::individuals(vec![block]).expect("valid criterion")
}

pub(super) fn child_criteria() -> CriteriaSet {
    CriteriaSet::new(vec![child_criterion()])
}

#[derive(Default)]
pub(super) struct MemoryStore {
    households: HashMap<String, HouseholdSnapshot>,
    lookups: Mutex<usize>,
}

impl MemoryStore {
    pub(super) fn with(mut self, household: HouseholdSnapshot) -> Self {
        self.households.insert(household.id().to_string(), household);
        self
    }

    pub(super) fn lookups(&self) -> usize {
        *self.lookups.lock().expect("lookup counter poisoned")
    }

    fn entity(&self, entity_id: &str) -> Option<&EntitySnapshot> {
        self.households.values().find_map(|household| {
            std::iter::once(&household.household)
                .chain(household.individuals.iter())
                .chain(household.collectors.iter())
                .find(|entity| entity.id == entity_id)
        })
    }
}

impl RecordStore for MemoryStore {
    fn members(&self, household_id: &str) -> Result<Option<HouseholdMembers>, RecordStoreError> {
        Ok(self
            .households
            .get(household_id)
            .map(|household| HouseholdMembers {
                household_id: household.id().to_string(),
                individual_ids: household
                    .individuals
                    .iter()
                    .map(|member| member.id.clone())
                    .collect(),
                collector_ids: household
                    .collectors
                    .iter()
                    .map(|member| member.id.clone())
                    .collect(),
            }))
    }

    fn lookup(
        &self,
        entity_id: &str,
        field: &FieldRef,
        round: Option<u32>,
    ) -> Result<Option<FieldValue>, RecordStoreError> {
        *self.lookups.lock().expect("lookup counter poisoned") += 1;
        Ok(self
            .entity(entity_id)
            .and_then(|entity| entity.value(field, round))
            .cloned())
    }
}

pub(super) struct OfflineStore;

impl RecordStore for OfflineStore {
    fn members(&self, _household_id: &str) -> Result<Option<HouseholdMembers>, RecordStoreError> {
        Err(RecordStoreError::Unavailable("registry offline".to_string()))
    }

    fn lookup(
        &self,
        _entity_id: &str,
        _field: &FieldRef,
        _round: Option<u32>,
    ) -> Result<Option<FieldValue>, RecordStoreError> {
        Err(RecordStoreError::Unavailable("registry offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct ListOracle {
    pub(super) adjudication: Vec<String>,
    pub(super) sanctioned: Vec<String>,
}

impl ExclusionOracle for ListOracle {
    fn has_active_adjudication_ticket(&self, entity_id: &str) -> bool {
        self.adjudication.iter().any(|id| id == entity_id)
    }

    fn is_on_sanction_list(&self, entity_id: &str) -> bool {
        self.sanctioned.iter().any(|id| id == entity_id)
    }
}

#[derive(Default)]
pub(super) struct RecordingExecutor {
    tickets: Mutex<Vec<BuildTicket>>,
}

impl RecordingExecutor {
    pub(super) fn tickets(&self) -> Vec<BuildTicket> {
        self.tickets.lock().expect("executor mutex poisoned").clone()
    }
}

impl BuildExecutor for RecordingExecutor {
    fn enqueue(&self, ticket: &BuildTicket, _criteria: &CriteriaSet) -> Result<(), BuildError> {
        self.tickets
            .lock()
            .expect("executor mutex poisoned")
            .push(ticket.clone());
        Ok(())
    }
}

pub(super) struct RejectingExecutor;

impl BuildExecutor for RejectingExecutor {
    fn enqueue(&self, _ticket: &BuildTicket, _criteria: &CriteriaSet) -> Result<(), BuildError> {
        Err(BuildError::Executor("queue full".to_string()))
    }
}

/// Replays scripted poll results in order; an exhausted script reports no news.
#[derive(Default)]
pub(super) struct ScriptedSource {
    script: Mutex<Vec<Result<Option<BuildEvent>, BuildError>>>,
    fetches: Mutex<usize>,
}

impl ScriptedSource {
    pub(super) fn new(script: Vec<Result<Option<BuildEvent>, BuildError>>) -> Arc<Self> {
        let mut script = script;
        script.reverse();
        Arc::new(Self {
            script: Mutex::new(script),
            fetches: Mutex::new(0),
        })
    }

    pub(super) fn fetches(&self) -> usize {
        *self.fetches.lock().expect("source mutex poisoned")
    }
}

impl BuildStatusSource for ScriptedSource {
    async fn fetch(&self, _ticket: &BuildTicket) -> Result<Option<BuildEvent>, BuildError> {
        *self.fetches.lock().expect("source mutex poisoned") += 1;
        self.script
            .lock()
            .expect("source mutex poisoned")
            .pop()
            .unwrap_or(Ok(None))
    }
}
