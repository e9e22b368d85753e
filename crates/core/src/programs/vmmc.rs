//! Voluntary medical male circumcision workflow.
//!
//! The longest of the built-in pathways: registration and consent, history
//! taking, vitals, HIV status, examination, assessment, the circumcision
//! itself, post-operative review and follow-up.
//!
//! VMMC is operator-gated: which states an operator may handle is a
//! property of the operator (their permitted activity list), layered on
//! top of the clinical guards. A surgeon and a receptionist walking the
//! same patient's graph can be offered different states.

use crate::engine::ProgramWorkflow;
use crate::error::WorkflowResult;
use crate::graph::WorkflowGraph;
use crate::guard::{self, EvalContext, FnGuard};
use crate::store::DateTimeRange;

/// Program name as registered in the clinical data store.
pub const PROGRAM: &str = "VMMC Program";

pub const REGISTRATION_CONSENT: &str = "REGISTRATION CONSENT";
pub const MEDICAL_HISTORY: &str = "MEDICAL HISTORY";
pub const VITALS: &str = "VITALS";
pub const HIV_STATUS: &str = "UPDATE HIV STATUS";
pub const GENITAL_EXAMINATION: &str = "GENITAL EXAMINATION";
pub const SUMMARY_ASSESSMENT: &str = "SUMMARY ASSESSMENT";
pub const CIRCUMCISION: &str = "CIRCUMCISION";
pub const POST_OP_REVIEW: &str = "POST-OP REVIEW";
pub const APPOINTMENT: &str = "APPOINTMENT";
pub const FOLLOW_UP: &str = "FOLLOW UP";

const CONSENT_CONFIRMATION: &str = "Consent Confirmation";
const READY_FOR_DISCHARGE: &str = "Ready for discharge?";
const YES: &str = "Yes";

pub fn workflow() -> WorkflowResult<ProgramWorkflow> {
    let graph = WorkflowGraph::builder()
        .path([
            REGISTRATION_CONSENT,
            MEDICAL_HISTORY,
            VITALS,
            HIV_STATUS,
            GENITAL_EXAMINATION,
            SUMMARY_ASSESSMENT,
            CIRCUMCISION,
            POST_OP_REVIEW,
            APPOINTMENT,
            FOLLOW_UP,
        ])
        .guard(
            CIRCUMCISION,
            FnGuard::new("patient consented to circumcision", consent_confirmed),
        )
        .guard(
            APPOINTMENT,
            FnGuard::new("patient ready for discharge", ready_for_discharge),
        )
        .guard(
            FOLLOW_UP,
            FnGuard::new("post-op review on record", post_op_review_done),
        )
        .build()?;
    Ok(ProgramWorkflow::new(PROGRAM, graph).with_activity_mapper(map_activity))
}

/// Maps an operator's activity label onto the state it permits. Labels are
/// matched case-insensitively by substring, so "VMMC: Medical History"
/// permits `MEDICAL HISTORY`.
pub(crate) fn map_activity(activity: &str) -> Option<&'static str> {
    const TABLE: &[(&str, &str)] = &[
        ("registration consent", REGISTRATION_CONSENT),
        ("medical history", MEDICAL_HISTORY),
        ("vitals", VITALS),
        ("hiv status", HIV_STATUS),
        ("genital examination", GENITAL_EXAMINATION),
        ("summary assessment", SUMMARY_ASSESSMENT),
        ("circumcision", CIRCUMCISION),
        ("post-op review", POST_OP_REVIEW),
        ("appointment", APPOINTMENT),
        ("follow up", FOLLOW_UP),
    ];

    let needle = activity.trim().to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(label, _)| needle.contains(label))
        .map(|&(_, state)| state)
}

fn consent_confirmed(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    guard::latest_coded_answer_is(
        ctx,
        CONSENT_CONFIRMATION,
        YES,
        DateTimeRange::up_to_day(ctx.as_of),
    )
}

fn ready_for_discharge(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    guard::latest_coded_answer_is(
        ctx,
        READY_FOR_DISCHARGE,
        YES,
        DateTimeRange::up_to_day(ctx.as_of),
    )
}

fn post_op_review_done(ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
    Ok(
        guard::latest_encounter(ctx, POST_OP_REVIEW, DateTimeRange::up_to_day(ctx.as_of))?
            .is_some(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RequestContext;
    use crate::error::WorkflowError;
    use crate::guard::Operator;
    use crate::programs::harness::{at, today, yesterday, Clinic};

    const ALL_ACTIVITIES: &[&str] = &[
        "Registration Consent",
        "Medical History",
        "Vitals",
        "HIV Status",
        "Genital Examination",
        "Summary Assessment",
        "Circumcision",
        "Post-Op Review",
        "Appointment",
        "Follow Up",
    ];

    fn clinic() -> Clinic {
        Clinic::new(
            PROGRAM,
            &[
                REGISTRATION_CONSENT,
                MEDICAL_HISTORY,
                VITALS,
                HIV_STATUS,
                GENITAL_EXAMINATION,
                SUMMARY_ASSESSMENT,
                CIRCUMCISION,
                POST_OP_REVIEW,
                APPOINTMENT,
                FOLLOW_UP,
            ],
            &[CONSENT_CONFIRMATION, READY_FOR_DISCHARGE, YES],
        )
    }

    fn operator(clinic: &Clinic, username: &str, activities: &[&str]) -> RequestContext {
        clinic
            .store
            .set_operator_activities(username, activities)
            .unwrap();
        RequestContext::for_operator(Operator::new(username))
    }

    fn complete_pre_op(clinic: &Clinic) {
        clinic.encounter_today(REGISTRATION_CONSENT);
        clinic.encounter_today(MEDICAL_HISTORY);
        clinic.encounter_today(VITALS);
        clinic.encounter_today(HIV_STATUS);
        clinic.encounter_today(GENITAL_EXAMINATION);
        clinic.encounter_today(SUMMARY_ASSESSMENT);
    }

    #[test]
    fn test_empty_history_starts_at_registration_consent() {
        let clinic = clinic();
        let request = operator(&clinic, "surgeon1", ALL_ACTIVITIES);
        assert_eq!(
            clinic.next_name_as(today(), &request),
            Some(REGISTRATION_CONSENT.into())
        );
    }

    #[test]
    fn test_consent_recorded_moves_to_medical_history() {
        let clinic = clinic();
        let request = operator(&clinic, "surgeon1", ALL_ACTIVITIES);
        clinic.encounter_today(REGISTRATION_CONSENT);
        assert_eq!(
            clinic.next_name_as(today(), &request),
            Some(MEDICAL_HISTORY.into())
        );
    }

    #[test]
    fn test_missing_operator_is_an_error_not_completion() {
        let clinic = clinic();
        let result = clinic.next(today(), &RequestContext::anonymous());
        assert!(matches!(
            result,
            Err(WorkflowError::MissingOperator(program)) if program == PROGRAM
        ));
    }

    #[test]
    fn test_circumcision_needs_consent_confirmation() {
        let clinic = clinic();
        let request = operator(&clinic, "surgeon1", ALL_ACTIVITIES);
        complete_pre_op(&clinic);

        // No consent confirmation: the theatre step is skipped and the
        // post-op review is offered instead.
        assert_eq!(
            clinic.next_name_as(today(), &request),
            Some(POST_OP_REVIEW.into())
        );

        clinic.coded_obs_on(CONSENT_CONFIRMATION, YES, today());
        assert_eq!(
            clinic.next_name_as(today(), &request),
            Some(CIRCUMCISION.into())
        );
    }

    #[test]
    fn test_operator_without_circumcision_activity_skips_the_theatre() {
        let clinic = clinic();
        let limited: Vec<&str> = ALL_ACTIVITIES
            .iter()
            .copied()
            .filter(|activity| *activity != "Circumcision")
            .collect();
        let request = operator(&clinic, "nurse1", &limited);

        complete_pre_op(&clinic);
        clinic.coded_obs_on(CONSENT_CONFIRMATION, YES, today());

        // Consent is in place, but this operator may not circumcise.
        assert_eq!(
            clinic.next_name_as(today(), &request),
            Some(POST_OP_REVIEW.into())
        );
    }

    #[test]
    fn test_unrecognised_activities_are_ignored() {
        let clinic = clinic();
        let request = operator(
            &clinic,
            "clerk1",
            &["Registration Consent", "Sweeping the ward"],
        );
        assert_eq!(
            clinic.next_name_as(today(), &request),
            Some(REGISTRATION_CONSENT.into())
        );
    }

    #[test]
    fn test_appointment_needs_discharge_readiness() {
        let clinic = clinic();
        let request = operator(&clinic, "surgeon1", ALL_ACTIVITIES);
        complete_pre_op(&clinic);
        clinic.coded_obs_on(CONSENT_CONFIRMATION, YES, today());
        clinic.encounter_today(CIRCUMCISION);
        clinic.encounter_today(POST_OP_REVIEW);

        // Not yet ready for discharge: appointment is skipped, and the
        // day's review already satisfies the follow-up gate.
        assert_eq!(clinic.next_name_as(today(), &request), Some(FOLLOW_UP.into()));

        clinic.coded_obs_at(READY_FOR_DISCHARGE, YES, None, at(today(), 13, 0));
        assert_eq!(
            clinic.next_name_as(today(), &request),
            Some(APPOINTMENT.into())
        );
    }

    #[test]
    fn test_follow_up_needs_a_post_op_review_on_record() {
        let clinic = clinic();
        // This operator cannot perform the review, so the review state is
        // skipped outright and only its history gates the follow up.
        let without_review: Vec<&str> = ALL_ACTIVITIES
            .iter()
            .copied()
            .filter(|activity| *activity != "Post-Op Review")
            .collect();
        let request = operator(&clinic, "follow-up-nurse", &without_review);

        complete_pre_op(&clinic);
        clinic.coded_obs_on(CONSENT_CONFIRMATION, YES, today());
        clinic.encounter_today(CIRCUMCISION);
        clinic.encounter_today(APPOINTMENT);

        // No post-op review anywhere in the record: follow up is skipped
        // and the day's workflow is complete.
        assert_eq!(clinic.next_name_as(today(), &request), None);

        clinic.encounter_on(POST_OP_REVIEW, yesterday());
        assert_eq!(clinic.next_name_as(today(), &request), Some(FOLLOW_UP.into()));
    }

    #[test]
    fn test_activity_mapping_is_case_insensitive_substring() {
        assert_eq!(map_activity("Registration Consent"), Some(REGISTRATION_CONSENT));
        assert_eq!(map_activity("VMMC: medical history"), Some(MEDICAL_HISTORY));
        assert_eq!(map_activity("POST-OP REVIEW"), Some(POST_OP_REVIEW));
        assert_eq!(map_activity("hiv status update"), Some(HIV_STATUS));
        assert_eq!(map_activity("Sweeping the ward"), None);
    }
}
