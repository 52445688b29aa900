use super::common::*;
use crate::workflows::targeting::{
    ComparisonEngine, ComparisonMethod, CriteriaSet, Criterion, CriterionDraft, EntityKind,
    EntitySnapshot, FilterBlock, HouseholdSnapshot, MatchVerdict, NoExclusions,
};
use crate::workflows::ValidationError;

fn men_block() -> FilterBlock {
    FilterBlock::new(
        EntityKind::Individual,
        vec![rule(sex(), ComparisonMethod::Equals, &["MALE"])],
    )
    .expect("valid block")
}

#[test]
fn empty_block_matches_everything() {
    let block = FilterBlock::empty(EntityKind::Household);
    assert!(block.matches(&EntitySnapshot::new("HH-404")));
}

#[test]
fn block_is_the_conjunction_of_its_rules() {
    let block = FilterBlock::new(
        EntityKind::Individual,
        vec![
            rule(sex(), ComparisonMethod::Equals, &["FEMALE"]),
            rule(age(), ComparisonMethod::GreaterThan, &["18"]),
        ],
    )
    .expect("valid block");

    let adult = person("IND-1", 34.0, "FEMALE");
    let child = person("IND-2", 9.0, "FEMALE");
    let man = person("IND-3", 40.0, "MALE");

    for entity in [&adult, &child, &man] {
        let expected = block
            .rules()
            .iter()
            .all(|rule| ComparisonEngine::evaluate_on(rule, entity));
        assert_eq!(block.matches(entity), expected);
    }
    assert!(block.matches(&adult));
    assert!(!block.matches(&child));
}

#[test]
fn block_rejects_rules_of_another_entity() {
    match FilterBlock::new(
        EntityKind::Household,
        vec![rule(age(), ComparisonMethod::Equals, &["3"])],
    ) {
        Err(ValidationError::MixedEntityKinds {
            expected: EntityKind::Household,
            found: EntityKind::Individual,
            ..
        }) => {}
        other => panic!("expected mixed entity error, got {other:?}"),
    }
}

#[test]
fn criterion_without_facets_is_rejected() {
    match Criterion::new(CriterionDraft::default()) {
        Err(ValidationError::EmptyCriterion) => {}
        other => panic!("expected empty criterion, got {other:?}"),
    }
}

#[test]
fn facets_within_a_criterion_must_all_hold() {
    let criterion = Criterion::new(CriterionDraft {
        household_blocks: vec![FilterBlock::empty(EntityKind::Household)],
        individual_blocks: vec![men_block()],
        ..CriterionDraft::default()
    })
    .expect("valid criterion");

    let household = HouseholdSnapshot::new(EntitySnapshot::new("HH-7"))
        .with_individual(person("IND-71", 30.0, "FEMALE"));

    assert!(!criterion.matches(&household));
    assert!(criterion.matches(&household_two()));
}

#[test]
fn individual_blocks_need_one_member_satisfying_every_rule() {
    let block = FilterBlock::new(
        EntityKind::Individual,
        vec![
            rule(sex(), ComparisonMethod::Equals, &["FEMALE"]),
            rule(age(), ComparisonMethod::LessThan, &["12"]),
        ],
    )
    .expect("valid block");
    let criterion = Criterion::individuals(vec![block]).expect("valid criterion");

    assert!(criterion.matches(&household_one()));

    let split = HouseholdSnapshot::new(EntitySnapshot::new("HH-8"))
        .with_individual(person("IND-81", 9.0, "MALE"))
        .with_individual(person("IND-82", 30.0, "FEMALE"));
    assert!(!criterion.matches(&split));
}

#[test]
fn id_facets_match_household_and_member_identifiers() {
    let by_household = Criterion::new(CriterionDraft {
        household_ids: vec!["hh-2".to_string()],
        ..CriterionDraft::default()
    })
    .expect("valid criterion");
    assert!(by_household.matches(&household_two()));
    assert!(!by_household.matches(&household_one()));

    let by_member = Criterion::new(CriterionDraft {
        individual_ids: vec!["IND-12".to_string()],
        ..CriterionDraft::default()
    })
    .expect("valid criterion");
    assert!(by_member.matches(&household_one()));
    assert!(!by_member.matches(&household_two()));

    match Criterion::new(CriterionDraft {
        household_ids: vec!["IND-12".to_string()],
        ..CriterionDraft::default()
    }) {
        Err(ValidationError::InvalidIdentifier { expected: "HH-", .. }) => {}
        other => panic!("expected invalid identifier, got {other:?}"),
    }
}

#[test]
fn member_id_facet_covers_collectors() {
    let by_collector = Criterion::new(CriterionDraft {
        individual_ids: vec!["IND-77".to_string()],
        ..CriterionDraft::default()
    })
    .expect("valid criterion");

    let collected_for = household_two().with_collector(EntitySnapshot::new("IND-77"));
    assert!(by_collector.matches(&collected_for));
    assert!(!by_collector.matches(&household_two()));

    let household_id_only = HouseholdSnapshot::new(EntitySnapshot::new("IND-77"));
    assert!(!by_collector.matches(&household_id_only));
}

#[test]
fn empty_set_matches_nothing() {
    let set = CriteriaSet::empty();
    assert!(set.is_empty());
    assert_eq!(
        set.verdict(&household_one(), &NoExclusions),
        MatchVerdict::NotMatched
    );
}

#[test]
fn criteria_are_alternatives() {
    let big_households = Criterion::households(vec![FilterBlock::new(
        EntityKind::Household,
        vec![rule(household_size(), ComparisonMethod::GreaterThan, &["4"])],
    )
    .expect("valid block")])
    .expect("valid criterion");
    let set = CriteriaSet::new(vec![big_households, Criterion::individuals(vec![men_block()])
        .expect("valid criterion")]);

    assert!(set.matches(&household_one(), &NoExclusions));
    assert!(set.matches(&household_two(), &NoExclusions));
}

#[test]
fn excluded_ids_cover_household_and_members() {
    let set = child_criteria()
        .with_exclusions("ind-11", "duplicate registration")
        .expect("valid exclusions");

    assert_eq!(set.excluded_ids(), &["IND-11".to_string()]);
    assert_eq!(
        set.verdict(&household_one(), &NoExclusions),
        MatchVerdict::ExcludedById
    );
    for record in [household_one(), household_two()] {
        if set.matches(&record, &NoExclusions) {
            assert!(!set.excluded_ids().iter().any(|id| id == record.id()));
        }
    }
}

#[test]
fn flags_consult_the_oracle_only_when_enabled() {
    let oracle = ListOracle {
        adjudication: vec!["IND-12".to_string()],
        sanctioned: vec!["HH-1".to_string()],
    };

    let plain = child_criteria();
    assert_eq!(plain.verdict(&household_one(), &oracle), MatchVerdict::Matched);

    let adjudicated = plain.clone().excluding_active_adjudication_tickets(true);
    assert_eq!(
        adjudicated.verdict(&household_one(), &oracle),
        MatchVerdict::ExcludedByAdjudication
    );

    let sanctioned = plain.excluding_sanctioned(true);
    assert_eq!(
        sanctioned.verdict(&household_one(), &oracle),
        MatchVerdict::ExcludedBySanctions
    );
}

#[test]
fn exclusion_reason_is_bounded() {
    let reason = "x".repeat(501);
    match CriteriaSet::empty().with_exclusions("HH-1", reason) {
        Err(ValidationError::ExclusionReasonTooLong { max: 500, found: 501 }) => {}
        other => panic!("expected reason too long, got {other:?}"),
    }
}

#[test]
fn editing_returns_a_new_set_and_leaves_siblings_alone() {
    let original = CriteriaSet::new(vec![child_criterion(), Criterion::individuals(vec![
        men_block(),
    ])
    .expect("valid criterion")]);

    let replaced = original
        .replace_criterion(0, Criterion::individuals(vec![men_block()]).expect("valid"))
        .expect("index in range");
    assert_eq!(original.criteria()[0], child_criterion());
    assert_eq!(replaced.criteria()[1], original.criteria()[1]);

    let trimmed = original.remove_criterion(1).expect("index in range");
    assert_eq!(trimmed.criteria().len(), 1);
    assert_eq!(original.criteria().len(), 2);

    match original.remove_criterion(5) {
        Err(ValidationError::CriterionIndex { index: 5, len: 2 }) => {}
        other => panic!("expected index error, got {other:?}"),
    }
}

#[test]
fn evaluation_is_repeatable() {
    let set = child_criteria().excluding_sanctioned(true);
    let record = household_one();
    let oracle = ListOracle::default();

    let first = set.verdict(&record, &oracle);
    let second = set.verdict(&record, &oracle);
    assert_eq!(first, second);
}

#[test]
fn referenced_fields_are_distinct() {
    let set = CriteriaSet::new(vec![child_criterion(), child_criterion()]);
    let fields = set.referenced_fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].field, age());
}

#[test]
fn criteria_sets_survive_json_and_reject_bad_exclusions() {
    let set = child_criteria()
        .with_exclusions("HH-9; IND-4", "moved away")
        .expect("valid exclusions");
    let json = serde_json::to_value(&set).expect("serializes");
    assert_eq!(json["excluded_ids"], "HH-9, IND-4");

    let restored: CriteriaSet = serde_json::from_value(json.clone()).expect("deserializes");
    assert_eq!(restored, set);

    let mut tampered = json;
    tampered["excluded_ids"] = serde_json::Value::String("PP-1".to_string());
    assert!(serde_json::from_value::<CriteriaSet>(tampered).is_err());
}

#[test]
fn describe_summarizes_every_clause() {
    let set = child_criteria()
        .with_exclusions("HH-3", "")
        .expect("valid exclusions")
        .excluding_sanctioned(true);

    assert_eq!(
        set.describe(),
        "(individual where age RANGE [7, 15]) EXCLUDING [HH-3] EXCLUDING sanction list"
    );
    assert_eq!(CriteriaSet::empty().describe(), "no criteria authored");
}
