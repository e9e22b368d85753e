//! Guard conditions.
//!
//! A guard answers one clinical yes/no question about a patient as of a
//! date. Guards are pure reads: with unchanged store contents, the same
//! context always produces the same answer, and nothing is ever written.
//!
//! Two failure postures apply, and the distinction is deliberate:
//!
//! - Missing *data* (no matching encounter, no reading recorded) resolves
//!   to "not satisfied" — care never advances without evidence.
//! - Missing *vocabulary* (a concept or encounter-type name the dictionary
//!   does not contain) is a configuration error and aborts the evaluation.
//!
//! The free functions at the bottom are the shared query vocabulary the
//! program modules compose their guards from; each reproduces one of the
//! recurring history-lookup shapes (same-day existence, latest-before,
//! latest coded answer, numeric reading, threshold property).

use chrono::NaiveDate;
use moyo_types::{LocationId, PatientId, ProgramId};

use crate::clinical::Encounter;
use crate::config::EngineConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::store::{ClinicalDataStore, DateTimeRange, EncounterQuery};

/// Identity and roles of the operator driving the evaluation. Passed in
/// explicitly; guards never consult ambient session state.
#[derive(Clone, Debug)]
pub struct Operator {
    username: String,
    roles: Vec<String>,
}

impl Operator {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|role| role.to_string()).collect();
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held.eq_ignore_ascii_case(role))
    }
}

/// Everything a guard may consult. Built once per evaluation and shared by
/// every guard visited during the traversal.
pub struct EvalContext<'a> {
    pub store: &'a dyn ClinicalDataStore,
    pub config: &'a EngineConfig,
    /// The program under evaluation, already resolved through the store.
    pub program: ProgramId,
    pub patient: PatientId,
    pub as_of: NaiveDate,
    pub operator: Option<&'a Operator>,
    pub location: Option<LocationId>,
}

/// A boolean precondition gating whether a workflow state is due.
pub trait Guard: Send + Sync {
    /// Stable name used in logs and configuration errors.
    fn name(&self) -> &str;

    fn evaluate(&self, ctx: &EvalContext<'_>) -> WorkflowResult<bool>;
}

/// Guard backed by a plain function. Program modules register their
/// predicates through this, which keeps each one unit-testable in
/// isolation.
pub struct FnGuard {
    name: &'static str,
    eval: fn(&EvalContext<'_>) -> WorkflowResult<bool>,
}

impl FnGuard {
    pub const fn new(name: &'static str, eval: fn(&EvalContext<'_>) -> WorkflowResult<bool>) -> Self {
        Self { name, eval }
    }
}

impl Guard for FnGuard {
    fn name(&self) -> &str {
        self.name
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
        (self.eval)(ctx)
    }
}

/// True when a non-voided encounter of `type_name` exists on the as-of day.
///
/// Not program-scoped: an encounter recorded under another program still
/// answers "has this happened today".
pub fn encounter_on_day(ctx: &EvalContext<'_>, type_name: &str) -> WorkflowResult<bool> {
    let encounter_type = ctx.store.encounter_type(type_name)?;
    let query = EncounterQuery::for_patient(ctx.patient)
        .of_type(encounter_type.id)
        .within(DateTimeRange::day_of(ctx.as_of));
    Ok(ctx.store.encounter_exists(&query)?)
}

/// The latest encounter of `type_name` within `range`, if any.
pub fn latest_encounter(
    ctx: &EvalContext<'_>,
    type_name: &str,
    range: DateTimeRange,
) -> WorkflowResult<Option<Encounter>> {
    let encounter_type = ctx.store.encounter_type(type_name)?;
    let query = EncounterQuery::for_patient(ctx.patient)
        .of_type(encounter_type.id)
        .within(range);
    Ok(ctx.store.encounters(&query)?.into_iter().next())
}

/// True when `encounter` holds an observation answering `question` with the
/// coded `answer`.
pub fn encounter_has_coded_answer(
    ctx: &EvalContext<'_>,
    encounter: &Encounter,
    question: &str,
    answer: &str,
) -> WorkflowResult<bool> {
    let question = ctx.store.concept_id(question)?;
    let answer = ctx.store.concept_id(answer)?;
    let observations = ctx.store.encounter_observations(encounter.id, question)?;
    Ok(observations.iter().any(|obs| obs.is_coded_as(answer)))
}

/// True when the patient's most recent answer to `question` within `range`
/// is the coded `answer`. No answer on record means not satisfied.
pub fn latest_coded_answer_is(
    ctx: &EvalContext<'_>,
    question: &str,
    answer: &str,
    range: DateTimeRange,
) -> WorkflowResult<bool> {
    let question = ctx.store.concept_id(question)?;
    let answer = ctx.store.concept_id(answer)?;
    let latest = ctx
        .store
        .latest_observation(ctx.patient, question, Some(range))?;
    Ok(latest.map_or(false, |obs| obs.is_coded_as(answer)))
}

/// True when any observation of `question` exists within `range`,
/// regardless of its value.
pub fn observation_within(
    ctx: &EvalContext<'_>,
    question: &str,
    range: DateTimeRange,
) -> WorkflowResult<bool> {
    let question = ctx.store.concept_id(question)?;
    let latest = ctx
        .store
        .latest_observation(ctx.patient, question, Some(range))?;
    Ok(latest.is_some())
}

/// The patient's most recent numeric reading of `question` within `range`.
/// Non-numeric answers to the same question are ignored.
pub fn latest_numeric_within(
    ctx: &EvalContext<'_>,
    question: &str,
    range: DateTimeRange,
) -> WorkflowResult<Option<f64>> {
    let question = ctx.store.concept_id(question)?;
    let latest = ctx
        .store
        .latest_observation(ctx.patient, question, Some(range))?;
    Ok(latest.and_then(|obs| obs.value.as_numeric()))
}

/// True when the patient's most recent text answer to `question` within
/// `range` contains `needle`, case-insensitively.
pub fn latest_text_contains(
    ctx: &EvalContext<'_>,
    question: &str,
    needle: &str,
    range: DateTimeRange,
) -> WorkflowResult<bool> {
    let question = ctx.store.concept_id(question)?;
    let latest = ctx
        .store
        .latest_observation(ctx.patient, question, Some(range))?;
    Ok(latest
        .and_then(|obs| obs.value.as_text().map(|text| text.to_ascii_lowercase()))
        .map_or(false, |text| text.contains(&needle.to_ascii_lowercase())))
}

/// Numeric global property with a startup-configured fallback. An absent
/// property uses `default`; a malformed value is a configuration error.
pub fn numeric_global_property(
    ctx: &EvalContext<'_>,
    key: &str,
    default: i32,
) -> WorkflowResult<i32> {
    match ctx.store.global_property(key)? {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<i32>()
            .map_err(|_| WorkflowError::InvalidGlobalProperty {
                key: key.to_string(),
                value,
            }),
    }
}

/// The patient's age in completed years at the as-of date, if a birthdate
/// is on record.
pub fn patient_age(ctx: &EvalContext<'_>) -> WorkflowResult<Option<i32>> {
    let patient = ctx.store.patient(ctx.patient)?;
    Ok(patient.age_in_years(ctx.as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clinical::Gender;
    use crate::store::memory::InMemoryStore;
    use chrono::NaiveDateTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    struct Fixture {
        store: InMemoryStore,
        config: EngineConfig,
        program: ProgramId,
        patient: PatientId,
    }

    impl Fixture {
        fn new() -> Self {
            let store = InMemoryStore::new();
            let program = store.define_program("TEST PROGRAM").unwrap();
            store.define_encounter_type("VITALS").unwrap();
            store.define_concept("Consent Confirmation").unwrap();
            store.define_concept("Yes").unwrap();
            store.define_concept("No").unwrap();
            store.define_concept("Weight").unwrap();
            store.define_concept("TREATMENT STATUS").unwrap();
            let patient = store
                .add_patient(Some(date(2006, 5, 15)), Some(Gender::Male))
                .unwrap();
            Self {
                store,
                config: EngineConfig::default(),
                program,
                patient,
            }
        }

        fn ctx(&self, as_of: NaiveDate) -> EvalContext<'_> {
            EvalContext {
                store: &self.store,
                config: &self.config,
                program: self.program,
                patient: self.patient,
                as_of,
                operator: None,
                location: None,
            }
        }
    }

    #[test]
    fn test_fn_guard_reports_name_and_delegates() {
        fn always_due(_ctx: &EvalContext<'_>) -> WorkflowResult<bool> {
            Ok(true)
        }

        let fixture = Fixture::new();
        let guard = FnGuard::new("always due", always_due);
        assert_eq!(guard.name(), "always due");
        assert!(guard.evaluate(&fixture.ctx(date(2024, 5, 15))).unwrap());
    }

    #[test]
    fn test_encounter_on_day_honours_day_boundaries() {
        let fixture = Fixture::new();
        fixture
            .store
            .record_encounter(fixture.patient, "VITALS", None, at(2024, 5, 15, 23, 59))
            .unwrap();

        let ctx = fixture.ctx(date(2024, 5, 15));
        assert!(encounter_on_day(&ctx, "VITALS").unwrap());

        let next_day = fixture.ctx(date(2024, 5, 16));
        assert!(!encounter_on_day(&next_day, "VITALS").unwrap());
    }

    #[test]
    fn test_encounter_on_day_rejects_unknown_type() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(date(2024, 5, 15));
        let result = encounter_on_day(&ctx, "NO SUCH TYPE");
        assert!(matches!(
            result,
            Err(WorkflowError::Store(
                crate::store::StoreError::UnknownEncounterType(_)
            ))
        ));
    }

    #[test]
    fn test_latest_coded_answer_uses_most_recent() {
        let fixture = Fixture::new();
        fixture
            .store
            .record_coded_observation(
                fixture.patient,
                "Consent Confirmation",
                "Yes",
                None,
                at(2024, 5, 10, 9, 0),
            )
            .unwrap();
        fixture
            .store
            .record_coded_observation(
                fixture.patient,
                "Consent Confirmation",
                "No",
                None,
                at(2024, 5, 12, 9, 0),
            )
            .unwrap();

        let ctx = fixture.ctx(date(2024, 5, 15));
        let range = DateTimeRange::up_to_day(date(2024, 5, 15));
        assert!(!latest_coded_answer_is(&ctx, "Consent Confirmation", "Yes", range).unwrap());

        // As of the earlier date the Yes answer is still the latest.
        let earlier = fixture.ctx(date(2024, 5, 11));
        let range = DateTimeRange::up_to_day(date(2024, 5, 11));
        assert!(latest_coded_answer_is(&earlier, "Consent Confirmation", "Yes", range).unwrap());
    }

    #[test]
    fn test_latest_coded_answer_missing_data_is_false() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(date(2024, 5, 15));
        let range = DateTimeRange::up_to_day(date(2024, 5, 15));
        assert!(!latest_coded_answer_is(&ctx, "Consent Confirmation", "Yes", range).unwrap());
    }

    #[test]
    fn test_latest_numeric_ignores_non_numeric_answers() {
        let fixture = Fixture::new();
        fixture
            .store
            .record_numeric_observation(fixture.patient, "Weight", 63.5, None, at(2024, 5, 15, 9, 0))
            .unwrap();
        fixture
            .store
            .record_text_observation(
                fixture.patient,
                "Weight",
                "not weighed",
                None,
                at(2024, 5, 15, 10, 0),
            )
            .unwrap();

        let ctx = fixture.ctx(date(2024, 5, 15));
        let range = DateTimeRange::day_of(date(2024, 5, 15));
        assert_eq!(latest_numeric_within(&ctx, "Weight", range).unwrap(), None);

        fixture
            .store
            .record_numeric_observation(fixture.patient, "Weight", 64.0, None, at(2024, 5, 15, 11, 0))
            .unwrap();
        assert_eq!(
            latest_numeric_within(&ctx, "Weight", range).unwrap(),
            Some(64.0)
        );
    }

    #[test]
    fn test_latest_text_contains_is_case_insensitive() {
        let fixture = Fixture::new();
        fixture
            .store
            .record_text_observation(
                fixture.patient,
                "TREATMENT STATUS",
                "BP Drugs Started on review",
                None,
                at(2024, 5, 10, 9, 0),
            )
            .unwrap();

        let ctx = fixture.ctx(date(2024, 5, 15));
        let range = DateTimeRange::up_to_day(date(2024, 5, 15));
        assert!(latest_text_contains(&ctx, "TREATMENT STATUS", "bp drugs started", range).unwrap());
    }

    #[test]
    fn test_numeric_global_property_fallback_and_parse_failure() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(date(2024, 5, 15));
        assert_eq!(
            numeric_global_property(&ctx, "htn.systolic.threshold", 140).unwrap(),
            140
        );

        fixture
            .store
            .set_global_property("htn.systolic.threshold", "160")
            .unwrap();
        assert_eq!(
            numeric_global_property(&ctx, "htn.systolic.threshold", 140).unwrap(),
            160
        );

        fixture
            .store
            .set_global_property("htn.systolic.threshold", "high")
            .unwrap();
        assert!(matches!(
            numeric_global_property(&ctx, "htn.systolic.threshold", 140),
            Err(WorkflowError::InvalidGlobalProperty { .. })
        ));
    }

    #[test]
    fn test_patient_age_is_as_of_sensitive() {
        let fixture = Fixture::new();
        let before_birthday = fixture.ctx(date(2024, 5, 14));
        assert_eq!(patient_age(&before_birthday).unwrap(), Some(17));

        let on_birthday = fixture.ctx(date(2024, 5, 15));
        assert_eq!(patient_age(&on_birthday).unwrap(), Some(18));
    }

    #[test]
    fn test_operator_roles_match_case_insensitively() {
        let operator = Operator::new("doc1").with_roles(&["Clinician"]);
        assert!(operator.has_role("clinician"));
        assert!(!operator.has_role("Doctor"));
    }
}
