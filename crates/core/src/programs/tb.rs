//! Tuberculosis treatment workflow.
//!
//! Adults enter at the initial registration; children are routed through a
//! diagnosis stage first and only proceed once tuberculosis is confirmed.
//! From there the path runs lab orders, programme registration, adherence
//! counselling (only once drugs have actually been issued), vitals,
//! treatment and same-day dispensing.
//!
//! Beyond the engine's completed-today skip, most states here carry a
//! sequencing gate: each is only due once the stage before it appears in
//! the patient's record at all. Without that, a patient who never started
//! the pathway would be offered its middle.

use crate::engine::ProgramWorkflow;
use crate::error::WorkflowResult;
use crate::graph::WorkflowGraph;
use crate::guard::{self, EvalContext, FnGuard};
use crate::store::DateTimeRange;

/// Program name as registered in the clinical data store.
pub const PROGRAM: &str = "TB PROGRAM";

pub const DIAGNOSIS: &str = "DIAGNOSIS";
pub const TB_INITIAL: &str = "TB_INITIAL";
pub const LAB_ORDERS: &str = "LAB ORDERS";
pub const TB_REGISTRATION: &str = "TB REGISTRATION";
pub const TB_ADHERENCE: &str = "TB ADHERENCE";
pub const VITALS: &str = "VITALS";
pub const TREATMENT: &str = "TREATMENT";
pub const DISPENSING: &str = "DISPENSING";

const TB_STATUS: &str = "TB status";
const YES: &str = "Yes";
const AMOUNT_DISPENSED: &str = "Amount dispensed";
const MEDICATION_ORDERS: &str = "Medication orders";

pub fn workflow() -> WorkflowResult<ProgramWorkflow> {
    let graph = WorkflowGraph::builder()
        .path([
            DIAGNOSIS,
            TB_INITIAL,
            LAB_ORDERS,
            TB_REGISTRATION,
            TB_ADHERENCE,
            VITALS,
            TREATMENT,
            DISPENSING,
        ])
        .guard(DIAGNOSIS, FnGuard::new("minor awaiting diagnosis", minor_awaiting_diagnosis))
        .guard(TB_INITIAL, FnGuard::new("not yet past initial visit", not_past_initial_visit))
        .guard(TB_INITIAL, FnGuard::new("adult or confirmed tb", adult_or_confirmed_tb))
        .guard(LAB_ORDERS, FnGuard::new("initial visit on record", initial_visit_on_record))
        .guard(TB_REGISTRATION, FnGuard::new("lab orders on record", lab_orders_on_record))
        .guard(TB_ADHERENCE, FnGuard::new("drugs dispensed", drugs_dispensed))
        .guard(VITALS, FnGuard::new("registered in programme", registration_on_record))
        .guard(TREATMENT, FnGuard::new("vitals on record", vitals_on_record))
        .guard(DISPENSING, FnGuard::new("medication ordered today", medication_ordered_today))
        .build()?;
    Ok(ProgramWorkflow::new(PROGRAM, graph))
}

fn is_minor(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    // Unknown birthdate is treated as adult: missing data never routes a
    // patient into the paediatric arm.
    Ok(guard::patient_age(ctx)?
        .map_or(false, |age| age < ctx.config.minor_age_years()))
}

/// Children without a diagnosis encounter on record are diagnosed first.
fn minor_awaiting_diagnosis(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    if !is_minor(ctx)? {
        return Ok(false);
    }
    Ok(
        guard::latest_encounter(ctx, DIAGNOSIS, DateTimeRange::up_to_day(ctx.as_of))?
            .is_none(),
    )
}

/// The initial visit stops being offered once lab orders exist; at that
/// point the patient is past it regardless of what was recorded when.
fn not_past_initial_visit(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    Ok(
        guard::latest_encounter(ctx, LAB_ORDERS, DateTimeRange::up_to_day(ctx.as_of))?
            .is_none(),
    )
}

fn adult_or_confirmed_tb(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    if !is_minor(ctx)? {
        return Ok(true);
    }
    guard::latest_coded_answer_is(ctx, TB_STATUS, YES, DateTimeRange::up_to_day(ctx.as_of))
}

fn initial_visit_on_record(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    Ok(
        guard::latest_encounter(ctx, TB_INITIAL, DateTimeRange::up_to_day(ctx.as_of))?
            .is_some(),
    )
}

fn lab_orders_on_record(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    Ok(
        guard::latest_encounter(ctx, LAB_ORDERS, DateTimeRange::up_to_day(ctx.as_of))?
            .is_some(),
    )
}

/// Adherence counselling presumes something was dispensed to adhere to.
fn drugs_dispensed(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    guard::observation_within(ctx, AMOUNT_DISPENSED, DateTimeRange::up_to_day(ctx.as_of))
}

fn registration_on_record(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    Ok(
        guard::latest_encounter(ctx, TB_REGISTRATION, DateTimeRange::up_to_day(ctx.as_of))?
            .is_some(),
    )
}

fn vitals_on_record(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    Ok(
        guard::latest_encounter(ctx, VITALS, DateTimeRange::up_to_day(ctx.as_of))?.is_some(),
    )
}

fn medication_ordered_today(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    guard::observation_within(ctx, MEDICATION_ORDERS, DateTimeRange::day_of(ctx.as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinical::Gender;
    use crate::programs::harness::{at, date, today, yesterday, Clinic};

    const RHZ: &str = "Rifampicin isoniazid and pyrazinamide";

    fn clinic() -> Clinic {
        // Fixture patient is born 1990: an adult throughout these dates.
        Clinic::new(
            PROGRAM,
            &[
                DIAGNOSIS,
                TB_INITIAL,
                LAB_ORDERS,
                TB_REGISTRATION,
                TB_ADHERENCE,
                VITALS,
                TREATMENT,
                DISPENSING,
            ],
            &[TB_STATUS, YES, AMOUNT_DISPENSED, MEDICATION_ORDERS, RHZ],
        )
    }

    fn minor_clinic() -> Clinic {
        let mut clinic = clinic();
        clinic.set_patient_born(date(2015, 3, 1), Gender::Female);
        clinic
    }

    #[test]
    fn test_adult_with_no_history_starts_at_initial_visit() {
        let clinic = clinic();
        assert_eq!(clinic.next_name(today()), Some(TB_INITIAL.into()));
    }

    #[test]
    fn test_minor_with_no_history_starts_at_diagnosis() {
        let clinic = minor_clinic();
        assert_eq!(clinic.next_name(today()), Some(DIAGNOSIS.into()));
    }

    #[test]
    fn test_confirmed_minor_proceeds_to_initial_visit() {
        let clinic = minor_clinic();
        let diagnosis = clinic.encounter_today(DIAGNOSIS);
        clinic.coded_obs_at(TB_STATUS, YES, Some(diagnosis), at(today(), 9, 30));
        assert_eq!(clinic.next_name(today()), Some(TB_INITIAL.into()));
    }

    #[test]
    fn test_unconfirmed_minor_has_nothing_further_due() {
        let clinic = minor_clinic();
        clinic.encounter_today(DIAGNOSIS);
        assert_eq!(clinic.next_name(today()), None);
    }

    #[test]
    fn test_confirmed_minor_is_not_rediagnosed_on_a_later_day() {
        let clinic = minor_clinic();
        let diagnosis = clinic.encounter_on(DIAGNOSIS, yesterday());
        clinic.coded_obs_at(TB_STATUS, YES, Some(diagnosis), at(yesterday(), 9, 30));
        assert_eq!(clinic.next_name(today()), Some(TB_INITIAL.into()));
    }

    #[test]
    fn test_after_initial_visit_lab_orders_are_due() {
        let clinic = clinic();
        clinic.encounter_today(TB_INITIAL);
        assert_eq!(clinic.next_name(today()), Some(LAB_ORDERS.into()));
    }

    #[test]
    fn test_lab_orders_on_record_suppress_the_initial_visit() {
        let clinic = clinic();
        clinic.encounter_today(LAB_ORDERS);
        assert_eq!(clinic.next_name(today()), Some(TB_REGISTRATION.into()));
    }

    #[test]
    fn test_adherence_is_due_once_drugs_were_dispensed() {
        let clinic = clinic();
        clinic.encounter_today(LAB_ORDERS);
        clinic.encounter_today(TB_REGISTRATION);
        clinic.numeric_obs_at(AMOUNT_DISPENSED, 30.0, None, at(today(), 10, 0));
        assert_eq!(clinic.next_name(today()), Some(TB_ADHERENCE.into()));
    }

    #[test]
    fn test_without_dispensed_drugs_vitals_come_next() {
        let clinic = clinic();
        clinic.encounter_today(LAB_ORDERS);
        clinic.encounter_today(TB_REGISTRATION);
        assert_eq!(clinic.next_name(today()), Some(VITALS.into()));
    }

    #[test]
    fn test_after_adherence_vitals_are_due() {
        let clinic = clinic();
        clinic.encounter_today(LAB_ORDERS);
        clinic.encounter_today(TB_REGISTRATION);
        clinic.encounter_today(TB_ADHERENCE);
        assert_eq!(clinic.next_name(today()), Some(VITALS.into()));
    }

    #[test]
    fn test_treatment_follows_vitals() {
        let clinic = clinic();
        clinic.encounter_today(LAB_ORDERS);
        clinic.encounter_today(TB_REGISTRATION);
        clinic.encounter_today(VITALS);
        assert_eq!(clinic.next_name(today()), Some(TREATMENT.into()));
    }

    #[test]
    fn test_day_ends_when_treatment_is_done_and_nothing_was_ordered() {
        let clinic = clinic();
        clinic.encounter_today(LAB_ORDERS);
        clinic.encounter_today(TB_REGISTRATION);
        clinic.encounter_today(TB_ADHERENCE);
        clinic.encounter_today(VITALS);
        clinic.encounter_today(TREATMENT);
        assert_eq!(clinic.next_name(today()), None);
    }

    #[test]
    fn test_dispensing_is_due_when_medication_was_ordered_today() {
        let clinic = clinic();
        clinic.encounter_today(LAB_ORDERS);
        clinic.encounter_today(TB_REGISTRATION);
        clinic.encounter_today(TB_ADHERENCE);
        clinic.encounter_today(VITALS);
        let treatment = clinic.encounter_today(TREATMENT);
        clinic.coded_obs_at(MEDICATION_ORDERS, RHZ, Some(treatment), at(today(), 11, 0));
        assert_eq!(clinic.next_name(today()), Some(DISPENSING.into()));
    }
}
