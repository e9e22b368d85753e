//! Clinical data-store boundary.
//!
//! The workflow engine consumes patient history exclusively through
//! [`ClinicalDataStore`]; persistence itself lives outside this crate. All
//! queries are read-only, exclude voided rows, and take parameterized query
//! values instead of free-form filters, so a backend can translate them
//! into prepared statements.
//!
//! Name resolution is strict: asking for a concept, encounter type or
//! program the vocabulary does not contain is an error, never a silent
//! default. A misspelt name in workflow configuration must abort the
//! evaluation loudly.

pub mod memory;

use chrono::{NaiveDate, NaiveDateTime};
use moyo_types::{ConceptId, EncounterId, EncounterTypeId, ObsId, PatientId, ProgramId};

use crate::clinical::{Encounter, EncounterType, Observation, Patient};
use crate::time::day_bounds;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown concept name: {0}")]
    UnknownConcept(String),
    #[error("unknown encounter type name: {0}")]
    UnknownEncounterType(String),
    #[error("unknown program name: {0}")]
    UnknownProgram(String),
    #[error("unknown patient: {0}")]
    UnknownPatient(PatientId),
    #[error("unknown encounter: {0}")]
    UnknownEncounter(EncounterId),
    #[error("unknown observation: {0}")]
    UnknownObservation(ObsId),
    #[error("clinical data store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Inclusive datetime window used by history queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateTimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateTimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// The 24-hour window containing `date`, inclusive at both ends.
    pub fn day_of(date: NaiveDate) -> Self {
        let (start, end) = day_bounds(date);
        Self { start, end }
    }

    /// Everything recorded on days strictly before `date`.
    pub fn before_day(date: NaiveDate) -> Self {
        let end = date
            .pred_opt()
            .map(|previous| day_bounds(previous).1)
            .unwrap_or(NaiveDateTime::MIN);
        Self {
            start: NaiveDateTime::MIN,
            end,
        }
    }

    /// Everything recorded on `date` or any earlier day.
    pub fn up_to_day(date: NaiveDate) -> Self {
        Self {
            start: NaiveDateTime::MIN,
            end: day_bounds(date).1,
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, datetime: NaiveDateTime) -> bool {
        self.start <= datetime && datetime <= self.end
    }
}

/// Parameterized encounter lookup.
#[derive(Clone, Debug)]
pub struct EncounterQuery {
    patient: PatientId,
    encounter_type: Option<EncounterTypeId>,
    program: Option<ProgramId>,
    range: Option<DateTimeRange>,
}

impl EncounterQuery {
    pub fn for_patient(patient: PatientId) -> Self {
        Self {
            patient,
            encounter_type: None,
            program: None,
            range: None,
        }
    }

    pub fn of_type(mut self, encounter_type: EncounterTypeId) -> Self {
        self.encounter_type = Some(encounter_type);
        self
    }

    pub fn in_program(mut self, program: ProgramId) -> Self {
        self.program = Some(program);
        self
    }

    pub fn within(mut self, range: DateTimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn patient(&self) -> PatientId {
        self.patient
    }

    pub fn encounter_type(&self) -> Option<EncounterTypeId> {
        self.encounter_type
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn range(&self) -> Option<DateTimeRange> {
        self.range
    }

    /// True when `encounter` satisfies every filter in this query. Voided
    /// encounters never match.
    pub fn matches(&self, encounter: &Encounter) -> bool {
        if encounter.voided || encounter.patient != self.patient {
            return false;
        }
        if let Some(encounter_type) = self.encounter_type {
            if encounter.encounter_type != encounter_type {
                return false;
            }
        }
        if let Some(program) = self.program {
            if encounter.program != Some(program) {
                return false;
            }
        }
        if let Some(range) = self.range {
            if !range.contains(encounter.datetime) {
                return false;
            }
        }
        true
    }
}

/// Read-only access to the clinical record.
///
/// Implementations must be safe to share across concurrent evaluations;
/// the engine never writes through this trait.
pub trait ClinicalDataStore: Send + Sync {
    /// Patient demographics by id.
    fn patient(&self, id: PatientId) -> StoreResult<Patient>;

    /// Non-voided encounters matching `query`, most recent first (by
    /// encounter datetime, then creation order).
    fn encounters(&self, query: &EncounterQuery) -> StoreResult<Vec<Encounter>>;

    /// The latest non-voided observation of `concept` for `person`,
    /// optionally restricted to `range`. "Latest" is by `obs_datetime`
    /// descending, ties broken by creation order.
    fn latest_observation(
        &self,
        person: PatientId,
        concept: ConceptId,
        range: Option<DateTimeRange>,
    ) -> StoreResult<Option<Observation>>;

    /// Non-voided observations of `concept` recorded within `encounter`.
    fn encounter_observations(
        &self,
        encounter: EncounterId,
        concept: ConceptId,
    ) -> StoreResult<Vec<Observation>>;

    /// Resolves a concept name to its id. Unknown names are an error.
    fn concept_id(&self, name: &str) -> StoreResult<ConceptId>;

    /// Resolves an encounter type by its case-sensitive name.
    fn encounter_type(&self, name: &str) -> StoreResult<EncounterType>;

    /// Resolves a program name to its id.
    fn program_id(&self, name: &str) -> StoreResult<ProgramId>;

    /// Activity labels the operator is permitted to perform.
    fn operator_activities(&self, operator: &str) -> StoreResult<Vec<String>>;

    /// Per-deployment configuration value, if set.
    fn global_property(&self, key: &str) -> StoreResult<Option<String>>;

    /// True when at least one non-voided encounter matches `query`.
    fn encounter_exists(&self, query: &EncounterQuery) -> StoreResult<bool> {
        Ok(!self.encounters(query)?.is_empty())
    }
}
