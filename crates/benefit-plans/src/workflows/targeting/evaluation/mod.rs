mod compare;

use super::collaborators::ExclusionOracle;
use super::criteria::{CriteriaSet, Criterion, FilterBlock, MatchVerdict};
use super::domain::{EntitySnapshot, FieldValue, HouseholdSnapshot};
use super::rule::Rule;

/// Stateless evaluator for rules and the criteria tree built from them.
///
/// Every entry point is a pure function of its inputs, so results can be cached and
/// evaluations can run on any thread against shared, read-only criteria.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComparisonEngine;

impl ComparisonEngine {
    /// Evaluate a rule against a value looked up ahead of time. `None` means absent.
    pub fn evaluate(rule: &Rule, actual: Option<&FieldValue>) -> bool {
        compare::compare(rule, actual)
    }

    pub fn evaluate_on(rule: &Rule, entity: &EntitySnapshot) -> bool {
        Self::evaluate(rule, entity.value(rule.field(), rule.round_number()))
    }

    pub fn evaluate_block(block: &FilterBlock, entity: &EntitySnapshot) -> bool {
        block.rules().iter().all(|rule| Self::evaluate_on(rule, entity))
    }

    pub fn evaluate_criterion(criterion: &Criterion, record: &HouseholdSnapshot) -> bool {
        criterion.matches(record)
    }

    pub fn evaluate_set<O>(criteria: &CriteriaSet, record: &HouseholdSnapshot, oracle: &O) -> bool
    where
        O: ExclusionOracle + ?Sized,
    {
        criteria.verdict(record, oracle) == MatchVerdict::Matched
    }
}
