//! Hypertension screening and management workflow.
//!
//! Vitals are taken first; the management state is only due when the day's
//! blood-pressure readings exceed the configured thresholds or the patient
//! is already on antihypertensives, and only when referral routing allows
//! it (an ANC referral takes the patient out of the flow for the day, and a
//! referral to a clinician reserves the state for operators holding the
//! clinician or doctor role).
//!
//! Thresholds are deployment-tunable through global properties; the
//! startup configuration supplies the fallbacks.

use crate::config::{DIASTOLIC_THRESHOLD_PROPERTY, SYSTOLIC_THRESHOLD_PROPERTY};
use crate::engine::ProgramWorkflow;
use crate::error::WorkflowResult;
use crate::graph::WorkflowGraph;
use crate::guard::{self, EvalContext, FnGuard};
use crate::store::DateTimeRange;

/// Program name as registered in the clinical data store.
pub const PROGRAM: &str = "HYPERTENSION PROGRAM";

pub const VITALS: &str = "VITALS";
pub const BP_MANAGEMENT: &str = "HYPERTENSION MANAGEMENT";

const SYSTOLIC: &str = "SYSTOLIC BLOOD PRESSURE";
const DIASTOLIC: &str = "DIASTOLIC BLOOD PRESSURE";
const TREATMENT_STATUS: &str = "TREATMENT STATUS";
const BP_DRUGS_STARTED: &str = "BP Drugs started";
const REFER_TO_ANC: &str = "REFER TO ANC";
const REFER_TO_CLINICIAN: &str = "REFER PATIENT TO CLINICIAN";
const YES: &str = "Yes";

pub fn workflow() -> WorkflowResult<ProgramWorkflow> {
    let graph = WorkflowGraph::builder()
        .path([VITALS, BP_MANAGEMENT])
        .guard(
            BP_MANAGEMENT,
            FnGuard::new("blood pressure requires management", management_needed),
        )
        .guard(
            BP_MANAGEMENT,
            FnGuard::new("referral routing respected", referral_respected),
        )
        .build()?;
    Ok(ProgramWorkflow::new(PROGRAM, graph))
}

/// High reading today, or antihypertensives already started. A missing
/// reading never counts as high.
fn management_needed(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    if bp_exceeds_threshold(ctx)? {
        return Ok(true);
    }
    on_bp_treatment(ctx)
}

fn bp_exceeds_threshold(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    let systolic_limit = guard::numeric_global_property(
        ctx,
        SYSTOLIC_THRESHOLD_PROPERTY,
        ctx.config.systolic_threshold(),
    )?;
    let diastolic_limit = guard::numeric_global_property(
        ctx,
        DIASTOLIC_THRESHOLD_PROPERTY,
        ctx.config.diastolic_threshold(),
    )?;

    let today = DateTimeRange::day_of(ctx.as_of);
    let systolic = guard::latest_numeric_within(ctx, SYSTOLIC, today)?;
    let diastolic = guard::latest_numeric_within(ctx, DIASTOLIC, today)?;

    Ok(systolic.map_or(false, |reading| reading > f64::from(systolic_limit))
        || diastolic.map_or(false, |reading| reading > f64::from(diastolic_limit)))
}

fn on_bp_treatment(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    guard::latest_text_contains(
        ctx,
        TREATMENT_STATUS,
        BP_DRUGS_STARTED,
        DateTimeRange::up_to_day(ctx.as_of),
    )
}

/// An ANC referral removes the management state for the day; a clinician
/// referral reserves it for operators holding the clinician or doctor
/// role.
fn referral_respected(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    let today = DateTimeRange::day_of(ctx.as_of);
    if guard::latest_coded_answer_is(ctx, REFER_TO_ANC, YES, today)? {
        return Ok(false);
    }
    if guard::latest_coded_answer_is(ctx, REFER_TO_CLINICIAN, YES, today)? {
        return Ok(ctx
            .operator
            .map_or(false, |operator| {
                operator.has_role("Clinician") || operator.has_role("Doctor")
            }));
    }
    Ok(true)
}
