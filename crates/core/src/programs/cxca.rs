//! Cervical cancer screening workflow.
//!
//! Reception, VIA testing, results, appointment booking and referral
//! feedback, in that order. The pivotal fact is whether a positive VIA
//! result is already on file from an earlier visit: a positive patient is
//! not re-tested, she goes straight to the screening-results stage where
//! treatment is organised.

use crate::engine::ProgramWorkflow;
use crate::error::WorkflowResult;
use crate::graph::WorkflowGraph;
use crate::guard::{self, EvalContext, FnGuard};
use crate::store::DateTimeRange;

/// Program name as registered in the clinical data store.
pub const PROGRAM: &str = "CxCa";

pub const RECEPTION: &str = "CXCA RECEPTION";
pub const TEST: &str = "CXCA TEST";
pub const SCREENING_RESULTS: &str = "CXCA screening result";
pub const APPOINTMENT: &str = "APPOINTMENT";
pub const REFERRAL_FEEDBACK: &str = "CxCa REFERRAL FEEDBACK";

const VIA_RESULTS: &str = "VIA Results";
const POSITIVE: &str = "Positive";
const CXCA_TREATMENT: &str = "CxCa treatment";
const SAME_DAY_TREATMENT: &str = "Same day treatment";

pub fn workflow() -> WorkflowResult<ProgramWorkflow> {
    let graph = WorkflowGraph::builder()
        .path([RECEPTION, TEST, SCREENING_RESULTS, APPOINTMENT, REFERRAL_FEEDBACK])
        .guard(RECEPTION, FnGuard::new("reception not yet seen today", reception_pending))
        .guard(TEST, FnGuard::new("via test due", test_due))
        .guard(
            SCREENING_RESULTS,
            FnGuard::new("screening results due", screening_results_due),
        )
        .build()?;
    Ok(ProgramWorkflow::new(PROGRAM, graph))
}

fn reception_pending(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    Ok(!guard::encounter_on_day(ctx, RECEPTION)?)
}

/// A VIA test is due unless a positive result is already on file or the
/// patient was tested today.
fn test_due(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    if positive_result_on_file(ctx)? {
        return Ok(false);
    }
    Ok(!guard::encounter_on_day(ctx, TEST)?)
}

/// Results are due for a patient with a prior positive on file, or when
/// today's test selected same-day treatment.
fn screening_results_due(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    if positive_result_on_file(ctx)? {
        return Ok(true);
    }
    same_day_treatment_selected(ctx)
}

/// Positive VIA result in the latest test encounter before the as-of day.
///
/// A patient with no prior test evaluates the same as one who tested
/// negative; only a recorded positive flips this.
fn positive_result_on_file(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    let Some(encounter) =
        guard::latest_encounter(ctx, TEST, DateTimeRange::before_day(ctx.as_of))?
    else {
        return Ok(false);
    };
    guard::encounter_has_coded_answer(ctx, &encounter, VIA_RESULTS, POSITIVE)
}

fn same_day_treatment_selected(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    let Some(encounter) = guard::latest_encounter(ctx, TEST, DateTimeRange::day_of(ctx.as_of))?
    else {
        return Ok(false);
    };
    guard::encounter_has_coded_answer(ctx, &encounter, CXCA_TREATMENT, SAME_DAY_TREATMENT)
}
