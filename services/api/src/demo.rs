use crate::infra::{
    age_field, household_size_field, sample_exclusions, sample_registry, signer,
    InProcessBuilds, RoleCapabilities, TargetingState, PROGRAM_OFFICER,
};
use benefit_plans::config::AppConfig;
use benefit_plans::error::AppError;
use benefit_plans::workflows::payment_plan::{
    ApprovalQuorum, ApprovalStage, ApprovalWorkflow, CapabilityCheck, FspId,
    InMemoryPlanRepository, PlanAction, PlanCommand, PlanRepository, WorkflowError,
    PAYMENT_SYSTEM_ACTOR,
};
use benefit_plans::workflows::targeting::{
    BuildPoller, BuildStatusTracker, ComparisonMethod, CriteriaSet, Criterion, EntityKind,
    FilterBlock, Rule, TargetingPreview,
};
use benefit_plans::workflows::{ActorId, PlanId};
use clap::Args;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DEMO_PLAN_ID: &str = "PP-DEMO-0001";
const DEMO_FSP: &str = "FSP-MOBILE-MONEY";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Distinct approvals required in the approval stage (defaults to configuration).
    #[arg(long)]
    pub(crate) approvals: Option<u32>,
    /// Milliseconds between population build polls (defaults to configuration).
    #[arg(long)]
    pub(crate) poll_interval_ms: Option<u64>,
    /// Have the authorizer reject once so the plan steps back to approval.
    #[arg(long)]
    pub(crate) with_rejection: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        approvals,
        poll_interval_ms,
        with_rejection,
    } = args;

    let config = AppConfig::load()?;
    let mut quorum = config.approvals;
    if let Some(approvals) = approvals {
        quorum.approval = approvals;
    }
    let poll_interval = poll_interval_ms
        .map(Duration::from_millis)
        .unwrap_or(config.build.poll_interval);

    println!("Benefit plan demo");
    let targeting = TargetingState::new(sample_registry(), sample_exclusions());
    let criteria = demo_criteria()?;
    println!("Targeting: {}", criteria.describe());

    let preview = targeting
        .service
        .preview(&criteria, &targeting.candidates)?;
    render_preview(&preview);

    let plan_id = PlanId::new(DEMO_PLAN_ID);
    let builds = Arc::new(InProcessBuilds::new(targeting));
    let tracker = Arc::new(Mutex::new(BuildStatusTracker::new(plan_id.clone())));
    let ticket = tracker
        .lock()
        .expect("tracker mutex poisoned")
        .submit_to(&criteria, builds.as_ref())?;
    println!(
        "\nPopulation build v{} submitted (polling every {} ms)",
        ticket.version.0,
        poll_interval.as_millis()
    );

    let outcome = BuildPoller::new(tracker.clone(), builds, poll_interval)
        .run(ticket)
        .await;
    match tracker.lock().expect("tracker mutex poisoned").outcome() {
        Some(Ok(population)) => println!(
            "- Build finished: {} household(s) [{}]",
            population.len(),
            population.household_ids.join(", ")
        ),
        Some(Err(failure)) => {
            println!("- {failure}");
            return Ok(());
        }
        None => {
            println!("- Build did not finish ({outcome:?})");
            return Ok(());
        }
    }

    println!("\nApproval workflow ({})", render_quorum(quorum));
    let workflow = ApprovalWorkflow::new(
        Arc::new(InMemoryPlanRepository::new()),
        Arc::new(RoleCapabilities::for_quorum(quorum)),
        quorum,
    )?;
    workflow.open(plan_id.clone(), &ActorId::new(PROGRAM_OFFICER))?;

    step(&workflow, &plan_id, PROGRAM_OFFICER, PlanAction::Lock)?;
    step_with(
        &workflow,
        &plan_id,
        command(PROGRAM_OFFICER, PlanAction::SetFsp).with_fsp(FspId(DEMO_FSP.to_string())),
    )?;

    let outsider = signer(ApprovalStage::Approval, 1);
    match workflow.apply(&plan_id, command(&outsider, PlanAction::SendForApproval)) {
        Err(err @ WorkflowError::PermissionDenied { .. }) => println!("- refused: {err}"),
        other => println!("- unexpected outcome for {outsider}: {other:?}"),
    }

    step(&workflow, &plan_id, PROGRAM_OFFICER, PlanAction::SendForApproval)?;
    sign_stage(&workflow, &plan_id, quorum, ApprovalStage::Approval)?;

    if with_rejection {
        step_with(
            &workflow,
            &plan_id,
            command(&signer(ApprovalStage::Authorization, 1), PlanAction::Reject)
                .with_comment("delivery window overlaps the rainy season"),
        )?;
        sign_stage(&workflow, &plan_id, quorum, ApprovalStage::Approval)?;
    }

    sign_stage(&workflow, &plan_id, quorum, ApprovalStage::Authorization)?;
    sign_stage(&workflow, &plan_id, quorum, ApprovalStage::FinanceRelease)?;
    let finished = workflow.finalize(&plan_id, None)?;
    println!(
        "- {} by {PAYMENT_SYSTEM_ACTOR}: {} -> {} (v{})",
        finished.action.label(),
        finished.from.label(),
        finished.to().label(),
        finished.plan.version()
    );

    let plan = workflow.get(&plan_id)?;
    println!("\nDecision history");
    for record in plan.history() {
        println!(
            "- {} {:?} by {} at {}{}",
            record.stage.label(),
            record.decision,
            record.actor_id,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record
                .comment
                .as_deref()
                .map(|comment| format!(" ({comment})"))
                .unwrap_or_default()
        );
    }

    match serde_json::to_string_pretty(&plan.status_view()) {
        Ok(json) => println!("\nPublic status payload:\n{json}"),
        Err(err) => println!("\nPublic status payload unavailable: {err}"),
    }

    Ok(())
}

fn demo_criteria() -> Result<CriteriaSet, AppError> {
    let children = FilterBlock::new(
        EntityKind::Individual,
        vec![Rule::new(
            age_field()?,
            ComparisonMethod::Range,
            ["7", "15"],
            None,
        )?],
    )?;
    let large_households = FilterBlock::new(
        EntityKind::Household,
        vec![Rule::new(
            household_size_field()?,
            ComparisonMethod::GreaterThan,
            ["6"],
            None,
        )?],
    )?;

    let criteria = CriteriaSet::new(vec![
        Criterion::individuals(vec![children])?,
        Criterion::households(vec![large_households])?,
    ])
    .with_exclusions("HH-3", "enrolled in the livelihoods programme")?
    .excluding_sanctioned(true);
    Ok(criteria)
}

fn render_preview(preview: &TargetingPreview) {
    println!("Preview");
    let buckets = [
        ("matched", &preview.matched),
        ("not matched", &preview.not_matched),
        ("excluded by id", &preview.excluded_by_id),
        ("excluded by adjudication", &preview.excluded_by_adjudication),
        ("excluded by sanctions", &preview.excluded_by_sanctions),
        ("missing from registry", &preview.missing),
    ];
    for (label, ids) in buckets {
        if !ids.is_empty() {
            println!("- {label}: {}", ids.join(", "));
        }
    }
}

fn render_quorum(quorum: ApprovalQuorum) -> String {
    ApprovalStage::ALL
        .into_iter()
        .map(|stage| format!("{} x{}", stage.label(), quorum.required(stage)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn command(actor: &str, action: PlanAction) -> PlanCommand {
    PlanCommand::new(ActorId::new(actor), action)
}

fn stage_action(stage: ApprovalStage) -> PlanAction {
    match stage {
        ApprovalStage::Approval => PlanAction::Approve,
        ApprovalStage::Authorization => PlanAction::Authorize,
        ApprovalStage::FinanceRelease => PlanAction::MarkReleased,
    }
}

fn sign_stage<R, C>(
    workflow: &ApprovalWorkflow<R, C>,
    plan_id: &PlanId,
    quorum: ApprovalQuorum,
    stage: ApprovalStage,
) -> Result<(), AppError>
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    for seat in 1..=quorum.required(stage) {
        step(workflow, plan_id, &signer(stage, seat), stage_action(stage))?;
    }
    Ok(())
}

fn step<R, C>(
    workflow: &ApprovalWorkflow<R, C>,
    plan_id: &PlanId,
    actor: &str,
    action: PlanAction,
) -> Result<(), AppError>
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    step_with(workflow, plan_id, command(actor, action))
}

fn step_with<R, C>(
    workflow: &ApprovalWorkflow<R, C>,
    plan_id: &PlanId,
    command: PlanCommand,
) -> Result<(), AppError>
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    let actor = command.actor_id.clone();
    let outcome = workflow.apply(plan_id, command)?;
    if outcome.status_changed() {
        println!(
            "- {} by {actor}: {} -> {} (v{})",
            outcome.action.label(),
            outcome.from.label(),
            outcome.to().label(),
            outcome.plan.version()
        );
    } else {
        println!(
            "- {} by {actor}: recorded, still {} (v{})",
            outcome.action.label(),
            outcome.from.label(),
            outcome.plan.version()
        );
    }
    Ok(())
}
