use benefit_plans::workflows::payment_plan::{
    ApprovalQuorum, ApprovalStage, Capability, CapabilityCheck,
};
use benefit_plans::workflows::targeting::{
    BuildError, BuildEvent, BuildExecutor, BuildProgress, BuildStatusSource, BuildTicket,
    CriteriaSet, EntityKind, EntitySnapshot, ExclusionOracle, FieldRef, FieldType, FieldValue,
    HouseholdMembers, HouseholdSnapshot, RecordStore, RecordStoreError, TargetingService,
    ValueType,
};
use benefit_plans::workflows::{ActorId, PlanId, ValidationError};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type RegistryTargeting = TargetingService<InMemoryRecordStore, ListExclusions>;

/// Targeting service plus the households it previews by default.
#[derive(Clone)]
pub(crate) struct TargetingState {
    pub(crate) service: Arc<RegistryTargeting>,
    pub(crate) candidates: Vec<String>,
}

impl TargetingState {
    pub(crate) fn new(store: InMemoryRecordStore, exclusions: ListExclusions) -> Self {
        let candidates = store.household_ids();
        Self {
            service: Arc::new(TargetingService::new(Arc::new(store), Arc::new(exclusions))),
            candidates,
        }
    }
}

/// Beneficiary registry held in memory. Lookups search household, members and collectors.
#[derive(Default, Clone)]
pub(crate) struct InMemoryRecordStore {
    households: HashMap<String, HouseholdSnapshot>,
}

impl InMemoryRecordStore {
    pub(crate) fn with(mut self, household: HouseholdSnapshot) -> Self {
        self.households
            .insert(household.id().to_string(), household);
        self
    }

    pub(crate) fn household_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.households.keys().cloned().collect();
        ids.sort();
        ids
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

impl RecordStore for InMemoryRecordStore {
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
        Ok(self
            .entity(entity_id)
            .and_then(|entity| entity.value(field, round))
            .cloned())
    }
}

/// Adjudication and sanction lists loaded up front.
#[derive(Default, Clone)]
pub(crate) struct ListExclusions {
    pub(crate) adjudication: Vec<String>,
    pub(crate) sanctioned: Vec<String>,
}

impl ExclusionOracle for ListExclusions {
    fn has_active_adjudication_ticket(&self, entity_id: &str) -> bool {
        self.adjudication
            .iter()
            .any(|id| id.eq_ignore_ascii_case(entity_id))
    }

    fn is_on_sanction_list(&self, entity_id: &str) -> bool {
        self.sanctioned
            .iter()
            .any(|id| id.eq_ignore_ascii_case(entity_id))
    }
}

/// Static role table: one program officer plus enough signers to meet every stage quorum.
/// Actors outside the table hold no capability.
#[derive(Default, Clone)]
pub(crate) struct RoleCapabilities {
    grants: HashMap<ActorId, Vec<Capability>>,
}

pub(crate) const PROGRAM_OFFICER: &str = "program-officer";

impl RoleCapabilities {
    pub(crate) fn for_quorum(quorum: ApprovalQuorum) -> Self {
        let mut roles = Self::default().grant(
            PROGRAM_OFFICER,
            &[
                Capability::Lock,
                Capability::Unlock,
                Capability::Remove,
                Capability::SendForApproval,
            ],
        );
        for stage in ApprovalStage::ALL {
            let capability = stage_capability(stage);
            for seat in 1..=quorum.required(stage) {
                roles = roles.grant(&signer(stage, seat), &[capability]);
            }
        }
        roles
    }

    fn grant(mut self, actor: &str, capabilities: &[Capability]) -> Self {
        self.grants
            .entry(ActorId::new(actor))
            .or_default()
            .extend_from_slice(capabilities);
        self
    }
}

pub(crate) fn stage_capability(stage: ApprovalStage) -> Capability {
    match stage {
        ApprovalStage::Approval => Capability::Approve,
        ApprovalStage::Authorization => Capability::Authorize,
        ApprovalStage::FinanceRelease => Capability::MarkAsReleased,
    }
}

/// Name of the `seat`-th signer of a stage, e.g. `approver-2`.
pub(crate) fn signer(stage: ApprovalStage, seat: u32) -> String {
    let role = match stage {
        ApprovalStage::Approval => "approver",
        ApprovalStage::Authorization => "authorizer",
        ApprovalStage::FinanceRelease => "finance-officer",
    };
    format!("{role}-{seat}")
}

impl CapabilityCheck for RoleCapabilities {
    fn can(&self, actor: &ActorId, capability: Capability, _plan_id: &PlanId) -> bool {
        self.grants
            .get(actor)
            .is_some_and(|granted| granted.contains(&capability))
    }
}

/// Materializes populations synchronously on enqueue. Only the latest attempt per plan is kept.
pub(crate) struct InProcessBuilds {
    targeting: TargetingState,
    results: Mutex<HashMap<PlanId, (BuildTicket, BuildProgress)>>,
}

impl InProcessBuilds {
    pub(crate) fn new(targeting: TargetingState) -> Self {
        Self {
            targeting,
            results: Mutex::new(HashMap::new()),
        }
    }
}

impl BuildExecutor for InProcessBuilds {
    fn enqueue(&self, ticket: &BuildTicket, criteria: &CriteriaSet) -> Result<(), BuildError> {
        let progress = match self
            .targeting
            .service
            .materialize(criteria, &self.targeting.candidates)
        {
            Ok(population) => {
                info!(
                    plan_id = %ticket.plan_id,
                    version = ticket.version.0,
                    households = population.len(),
                    "population materialized"
                );
                BuildProgress::Succeeded(population)
            }
            Err(error) => BuildProgress::Failed {
                reason: error.to_string(),
            },
        };
        self.results
            .lock()
            .expect("build results mutex poisoned")
            .insert(ticket.plan_id.clone(), (ticket.clone(), progress));
        Ok(())
    }
}

impl BuildStatusSource for InProcessBuilds {
    async fn fetch(&self, ticket: &BuildTicket) -> Result<Option<BuildEvent>, BuildError> {
        let results = self.results.lock().expect("build results mutex poisoned");
        Ok(results
            .get(&ticket.plan_id)
            .filter(|(latest, _)| latest == ticket)
            .map(|(_, progress)| BuildEvent::new(ticket, progress.clone())))
    }
}

pub(crate) fn age_field() -> Result<FieldRef, ValidationError> {
    FieldRef::new(
        EntityKind::Individual,
        "age",
        FieldType::plain(ValueType::Number),
    )
}

pub(crate) fn household_size_field() -> Result<FieldRef, ValidationError> {
    FieldRef::new(
        EntityKind::Household,
        "size",
        FieldType::plain(ValueType::Number),
    )
}

fn member(id: &str, age: f64) -> EntitySnapshot {
    EntitySnapshot::new(id).with("age", FieldValue::Number(age))
}

fn household(id: &str, size: f64, village: &str) -> EntitySnapshot {
    EntitySnapshot::new(id)
        .with("size", FieldValue::Number(size))
        .with("village", FieldValue::Text(village.to_string()))
}

/// Small registry used by the demo and by a freshly started service.
pub(crate) fn sample_registry() -> InMemoryRecordStore {
    InMemoryRecordStore::default()
        .with(
            HouseholdSnapshot::new(household("HH-1", 4.0, "Kalemie North"))
                .with_individual(member("IND-11", 9.0))
                .with_individual(member("IND-12", 34.0))
                .with_collector(member("IND-12", 34.0)),
        )
        .with(
            HouseholdSnapshot::new(household("HH-2", 1.0, "Moba"))
                .with_individual(member("IND-21", 41.0)),
        )
        .with(
            HouseholdSnapshot::new(household("HH-3", 7.0, "Moba"))
                .with_individual(member("IND-31", 52.0))
                .with_individual(member("IND-32", 19.0)),
        )
        .with(
            HouseholdSnapshot::new(household("HH-4", 3.0, "Kalemie South"))
                .with_individual(member("IND-41", 12.0)),
        )
}

pub(crate) fn sample_exclusions() -> ListExclusions {
    ListExclusions {
        adjudication: Vec::new(),
        sanctioned: vec!["IND-41".to_string()],
    }
}
