use std::collections::HashSet;

use crate::workflows::payment_plan::{
    available_actions, lookup, ApprovalStage, Capability, Destination, PlanAction, PlanStatus,
    TRANSITIONS,
};

#[test]
fn table_has_one_entry_per_status_and_action() {
    let mut seen = HashSet::new();
    for transition in TRANSITIONS {
        assert!(
            seen.insert((transition.from, transition.action)),
            "duplicate entry for {:?} / {:?}",
            transition.from,
            transition.action
        );
    }
    assert_eq!(TRANSITIONS.len(), 13);
}

#[test]
fn finished_plans_offer_no_actions() {
    assert!(available_actions(PlanStatus::Finished).is_empty());
    assert!(TRANSITIONS
        .iter()
        .all(|transition| transition.from != PlanStatus::Finished));
}

#[test]
fn rejections_step_back_exactly_one_stage() {
    let expectations = [
        (PlanStatus::InApproval, ApprovalStage::Approval, PlanStatus::LockedFsp),
        (
            PlanStatus::InAuthorization,
            ApprovalStage::Authorization,
            PlanStatus::InApproval,
        ),
        (
            PlanStatus::InReview,
            ApprovalStage::FinanceRelease,
            PlanStatus::InAuthorization,
        ),
    ];

    for (from, stage, to) in expectations {
        let transition = lookup(from, PlanAction::Reject).expect("reject is offered");
        assert_eq!(transition.to, Destination::Demote { stage, to });
        assert_eq!(from.approval_stage(), Some(stage));
    }
}

#[test]
fn set_fsp_reuses_the_lock_capability() {
    let transition = lookup(PlanStatus::Locked, PlanAction::SetFsp).expect("set_fsp offered");
    assert_eq!(transition.guard, Some(Capability::Lock));

    let finalize = lookup(PlanStatus::Accepted, PlanAction::Finalize).expect("finalize offered");
    assert_eq!(finalize.guard, None);
}

#[test]
fn available_actions_follow_table_order() {
    assert_eq!(
        available_actions(PlanStatus::Open),
        vec![PlanAction::Lock, PlanAction::Remove]
    );
    assert_eq!(
        available_actions(PlanStatus::InReview),
        vec![PlanAction::MarkReleased, PlanAction::Reject]
    );
    assert!(lookup(PlanStatus::Open, PlanAction::Approve).is_none());
}
