use serde::{Deserialize, Serialize};

use super::collaborators::ExclusionOracle;
use super::domain::{EntityKind, EntitySnapshot, FieldRef, HouseholdSnapshot};
use super::evaluation::ComparisonEngine;
use super::ids::{normalize_ids, parse_id_list, IdKind};
use super::rule::Rule;
use crate::workflows::ValidationError;

const MAX_EXCLUSION_REASON: usize = 500;

/// AND-group of rules over one entity kind. An empty block matches everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FilterBlockDraft", into = "FilterBlockDraft")]
pub struct FilterBlock {
    entity: EntityKind,
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterBlockDraft {
    pub entity: EntityKind,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl FilterBlock {
    pub fn new(entity: EntityKind, rules: Vec<Rule>) -> Result<Self, ValidationError> {
        if let Some(stray) = rules.iter().find(|rule| rule.field().entity() != entity) {
            return Err(ValidationError::MixedEntityKinds {
                field: stray.field().name().to_string(),
                expected: entity,
                found: stray.field().entity(),
            });
        }
        Ok(Self { entity, rules })
    }

    pub fn empty(entity: EntityKind) -> Self {
        Self {
            entity,
            rules: Vec::new(),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn matches(&self, entity: &EntitySnapshot) -> bool {
        ComparisonEngine::evaluate_block(self, entity)
    }

    /// True when some member satisfies every rule of the block.
    fn matches_any(&self, members: &[EntitySnapshot]) -> bool {
        self.is_empty() || members.iter().any(|member| self.matches(member))
    }

    pub fn describe(&self) -> String {
        if self.rules.is_empty() {
            return format!("any {}", self.entity.label());
        }
        let rules: Vec<String> = self.rules.iter().map(Rule::describe).collect();
        format!("{} where {}", self.entity.label(), rules.join(" and "))
    }
}

impl TryFrom<FilterBlockDraft> for FilterBlock {
    type Error = ValidationError;

    fn try_from(draft: FilterBlockDraft) -> Result<Self, Self::Error> {
        Self::new(draft.entity, draft.rules)
    }
}

impl From<FilterBlock> for FilterBlockDraft {
    fn from(block: FilterBlock) -> Self {
        Self {
            entity: block.entity,
            rules: block.rules,
        }
    }
}

/// One populated facet of a criterion. Unpopulated facets are simply absent.
#[derive(Debug, Clone, PartialEq)]
pub enum Facet {
    Household(Vec<FilterBlock>),
    Individual(Vec<FilterBlock>),
    Collector(Vec<FilterBlock>),
    HouseholdIds(Vec<String>),
    /// Matches when any individual or collector of the household is listed.
    IndividualIds(Vec<String>),
}

impl Facet {
    fn matches(&self, record: &HouseholdSnapshot) -> bool {
        match self {
            Facet::Household(blocks) => blocks.iter().all(|block| block.matches(&record.household)),
            Facet::Individual(blocks) => blocks
                .iter()
                .all(|block| block.matches_any(&record.individuals)),
            Facet::Collector(blocks) => blocks
                .iter()
                .all(|block| block.matches_any(&record.collectors)),
            Facet::HouseholdIds(ids) => contains_id(ids, record.id()),
            Facet::IndividualIds(ids) => record
                .identifiers()
                .skip(1)
                .any(|member_id| contains_id(ids, member_id)),
        }
    }

    fn blocks(&self) -> &[FilterBlock] {
        match self {
            Facet::Household(blocks) | Facet::Individual(blocks) | Facet::Collector(blocks) => {
                blocks
            }
            Facet::HouseholdIds(_) | Facet::IndividualIds(_) => &[],
        }
    }

    fn describe(&self) -> String {
        match self {
            Facet::Household(blocks) | Facet::Individual(blocks) | Facet::Collector(blocks) => {
                blocks
                    .iter()
                    .map(FilterBlock::describe)
                    .collect::<Vec<_>>()
                    .join(" AND ")
            }
            Facet::HouseholdIds(ids) => format!("household in [{}]", ids.join(", ")),
            Facet::IndividualIds(ids) => format!("member in [{}]", ids.join(", ")),
        }
    }
}

fn contains_id(ids: &[String], candidate: &str) -> bool {
    ids.iter().any(|id| id.eq_ignore_ascii_case(candidate))
}

/// One alternative of a criteria set: every populated facet must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CriterionDraft", into = "CriterionDraft")]
pub struct Criterion {
    facets: Vec<Facet>,
}

/// Criterion as authored, with one list per facet (empty lists mean "not used").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionDraft {
    #[serde(default)]
    pub household_blocks: Vec<FilterBlock>,
    #[serde(default)]
    pub individual_blocks: Vec<FilterBlock>,
    #[serde(default)]
    pub collector_blocks: Vec<FilterBlock>,
    #[serde(default)]
    pub household_ids: Vec<String>,
    #[serde(default)]
    pub individual_ids: Vec<String>,
}

impl Criterion {
    pub fn new(draft: CriterionDraft) -> Result<Self, ValidationError> {
        let CriterionDraft {
            household_blocks,
            individual_blocks,
            collector_blocks,
            household_ids,
            individual_ids,
        } = draft;

        let mut facets = Vec::new();
        for (kind, blocks) in [
            (EntityKind::Household, household_blocks),
            (EntityKind::Individual, individual_blocks),
            (EntityKind::Collector, collector_blocks),
        ] {
            if blocks.is_empty() {
                continue;
            }
            if let Some(block) = blocks.iter().find(|block| block.entity() != kind) {
                let field = block
                    .rules()
                    .first()
                    .map(|rule| rule.field().name().to_string())
                    .unwrap_or_default();
                return Err(ValidationError::MixedEntityKinds {
                    field,
                    expected: kind,
                    found: block.entity(),
                });
            }
            facets.push(match kind {
                EntityKind::Household => Facet::Household(blocks),
                EntityKind::Individual => Facet::Individual(blocks),
                EntityKind::Collector => Facet::Collector(blocks),
            });
        }

        let household_ids = normalize_ids(household_ids, IdKind::Household)?;
        if !household_ids.is_empty() {
            facets.push(Facet::HouseholdIds(household_ids));
        }
        let individual_ids = normalize_ids(individual_ids, IdKind::Individual)?;
        if !individual_ids.is_empty() {
            facets.push(Facet::IndividualIds(individual_ids));
        }

        if facets.is_empty() {
            return Err(ValidationError::EmptyCriterion);
        }
        Ok(Self { facets })
    }

    pub fn households(blocks: Vec<FilterBlock>) -> Result<Self, ValidationError> {
        Self::new(CriterionDraft {
            household_blocks: blocks,
            ..CriterionDraft::default()
        })
    }

    pub fn individuals(blocks: Vec<FilterBlock>) -> Result<Self, ValidationError> {
        Self::new(CriterionDraft {
            individual_blocks: blocks,
            ..CriterionDraft::default()
        })
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    pub fn matches(&self, record: &HouseholdSnapshot) -> bool {
        self.facets.iter().all(|facet| facet.matches(record))
    }

    fn blocks(&self) -> impl Iterator<Item = &FilterBlock> {
        self.facets.iter().flat_map(Facet::blocks)
    }

    pub fn describe(&self) -> String {
        let facets: Vec<String> = self.facets.iter().map(Facet::describe).collect();
        format!("({})", facets.join(" AND "))
    }
}

impl TryFrom<CriterionDraft> for Criterion {
    type Error = ValidationError;

    fn try_from(draft: CriterionDraft) -> Result<Self, Self::Error> {
        Self::new(draft)
    }
}

impl From<Criterion> for CriterionDraft {
    fn from(criterion: Criterion) -> Self {
        let mut draft = CriterionDraft::default();
        for facet in criterion.facets {
            match facet {
                Facet::Household(blocks) => draft.household_blocks = blocks,
                Facet::Individual(blocks) => draft.individual_blocks = blocks,
                Facet::Collector(blocks) => draft.collector_blocks = blocks,
                Facet::HouseholdIds(ids) => draft.household_ids = ids,
                Facet::IndividualIds(ids) => draft.individual_ids = ids,
            }
        }
        draft
    }
}

/// Outcome of evaluating a household against a criteria set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchVerdict {
    Matched,
    NotMatched,
    ExcludedById,
    ExcludedByAdjudication,
    ExcludedBySanctions,
}

/// A field a criteria set reads, for preloading records before evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRequest {
    pub field: FieldRef,
    pub round: Option<u32>,
}

/// Targeting definition: OR across criteria, minus explicit and flag-driven exclusions.
///
/// A set without criteria is the "not authored yet" state and matches nothing.
/// Editing helpers return a new set; the original and its criteria are left as they were.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CriteriaSetDraft", into = "CriteriaSetDraft")]
pub struct CriteriaSet {
    criteria: Vec<Criterion>,
    excluded_ids: Vec<String>,
    exclusion_reason: String,
    exclude_if_active_adjudication_ticket: bool,
    exclude_if_on_sanction_list: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSetDraft {
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    /// Free text, e.g. "HH-1, IND-7".
    #[serde(default)]
    pub excluded_ids: String,
    #[serde(default)]
    pub exclusion_reason: String,
    #[serde(default)]
    pub exclude_if_active_adjudication_ticket: bool,
    #[serde(default)]
    pub exclude_if_on_sanction_list: bool,
}

impl CriteriaSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self {
            criteria,
            ..Self::default()
        }
    }

    pub fn with_exclusions(
        mut self,
        excluded_ids: &str,
        reason: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let reason = reason.into().trim().to_string();
        let length = reason.chars().count();
        if length > MAX_EXCLUSION_REASON {
            return Err(ValidationError::ExclusionReasonTooLong {
                max: MAX_EXCLUSION_REASON,
                found: length,
            });
        }
        self.excluded_ids = parse_id_list(excluded_ids, IdKind::Any)?;
        self.exclusion_reason = reason;
        Ok(self)
    }

    pub fn excluding_active_adjudication_tickets(mut self, enabled: bool) -> Self {
        self.exclude_if_active_adjudication_ticket = enabled;
        self
    }

    pub fn excluding_sanctioned(mut self, enabled: bool) -> Self {
        self.exclude_if_on_sanction_list = enabled;
        self
    }

    pub fn with_criterion(&self, criterion: Criterion) -> Self {
        let mut next = self.clone();
        next.criteria.push(criterion);
        next
    }

    pub fn replace_criterion(
        &self,
        index: usize,
        criterion: Criterion,
    ) -> Result<Self, ValidationError> {
        self.check_index(index)?;
        let mut next = self.clone();
        next.criteria[index] = criterion;
        Ok(next)
    }

    pub fn remove_criterion(&self, index: usize) -> Result<Self, ValidationError> {
        self.check_index(index)?;
        let mut next = self.clone();
        next.criteria.remove(index);
        Ok(next)
    }

    fn check_index(&self, index: usize) -> Result<(), ValidationError> {
        if index < self.criteria.len() {
            Ok(())
        } else {
            Err(ValidationError::CriterionIndex {
                index,
                len: self.criteria.len(),
            })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn excluded_ids(&self) -> &[String] {
        &self.excluded_ids
    }

    pub fn exclusion_reason(&self) -> &str {
        &self.exclusion_reason
    }

    pub fn excludes_active_adjudication_tickets(&self) -> bool {
        self.exclude_if_active_adjudication_ticket
    }

    pub fn excludes_sanctioned(&self) -> bool {
        self.exclude_if_on_sanction_list
    }

    pub fn verdict<O>(&self, record: &HouseholdSnapshot, oracle: &O) -> MatchVerdict
    where
        O: ExclusionOracle + ?Sized,
    {
        if !self.criteria.iter().any(|criterion| criterion.matches(record)) {
            return MatchVerdict::NotMatched;
        }

        if record
            .identifiers()
            .any(|id| contains_id(&self.excluded_ids, id))
        {
            return MatchVerdict::ExcludedById;
        }

        if self.exclude_if_active_adjudication_ticket
            && record
                .identifiers()
                .any(|id| oracle.has_active_adjudication_ticket(id))
        {
            return MatchVerdict::ExcludedByAdjudication;
        }

        if self.exclude_if_on_sanction_list
            && record.identifiers().any(|id| oracle.is_on_sanction_list(id))
        {
            return MatchVerdict::ExcludedBySanctions;
        }

        MatchVerdict::Matched
    }

    pub fn matches<O>(&self, record: &HouseholdSnapshot, oracle: &O) -> bool
    where
        O: ExclusionOracle + ?Sized,
    {
        ComparisonEngine::evaluate_set(self, record, oracle)
    }

    /// Every distinct field (and round) the criteria read.
    pub fn referenced_fields(&self) -> Vec<FieldRequest> {
        let mut requests: Vec<FieldRequest> = Vec::new();
        for rule in self
            .criteria
            .iter()
            .flat_map(Criterion::blocks)
            .flat_map(|block| block.rules())
        {
            let request = FieldRequest {
                field: rule.field().clone(),
                round: rule.round_number(),
            };
            if !requests.contains(&request) {
                requests.push(request);
            }
        }
        requests
    }

    pub fn describe(&self) -> String {
        if self.criteria.is_empty() {
            return "no criteria authored".to_string();
        }
        let mut text = self
            .criteria
            .iter()
            .map(Criterion::describe)
            .collect::<Vec<_>>()
            .join(" OR ");
        if !self.excluded_ids.is_empty() {
            text.push_str(&format!(" EXCLUDING [{}]", self.excluded_ids.join(", ")));
        }
        if self.exclude_if_active_adjudication_ticket {
            text.push_str(" EXCLUDING active adjudication tickets");
        }
        if self.exclude_if_on_sanction_list {
            text.push_str(" EXCLUDING sanction list");
        }
        text
    }
}

impl TryFrom<CriteriaSetDraft> for CriteriaSet {
    type Error = ValidationError;

    fn try_from(draft: CriteriaSetDraft) -> Result<Self, Self::Error> {
        Ok(CriteriaSet::new(draft.criteria)
            .with_exclusions(&draft.excluded_ids, draft.exclusion_reason)?
            .excluding_active_adjudication_tickets(draft.exclude_if_active_adjudication_ticket)
            .excluding_sanctioned(draft.exclude_if_on_sanction_list))
    }
}

impl From<CriteriaSet> for CriteriaSetDraft {
    fn from(set: CriteriaSet) -> Self {
        Self {
            criteria: set.criteria,
            excluded_ids: set.excluded_ids.join(", "),
            exclusion_reason: set.exclusion_reason,
            exclude_if_active_adjudication_ticket: set.exclude_if_active_adjudication_ticket,
            exclude_if_on_sanction_list: set.exclude_if_on_sanction_list,
        }
    }
}
