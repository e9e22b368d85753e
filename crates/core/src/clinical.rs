//! Clinical read-model entities.
//!
//! These are the rows the workflow engine reads: patients, encounter types,
//! encounters and observations, as served by the clinical data store. The
//! engine never creates, mutates or voids any of them; creation and voiding
//! happen in the persistence layer, and voided rows are invisible to every
//! query in this crate.

use chrono::{NaiveDate, NaiveDateTime};
use moyo_types::{ConceptId, EncounterId, EncounterTypeId, ObsId, PatientId, ProgramId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::age_in_years;

/// Patient gender as recorded at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "M")]
    Male,
}

/// A person enrolled in zero or more clinical programs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub birthdate: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

impl Patient {
    /// Completed years of age at `as_of`, if a birthdate is on record.
    pub fn age_in_years(&self, as_of: NaiveDate) -> Option<i32> {
        self.birthdate.map(|born| age_in_years(born, as_of))
    }
}

/// A named encounter category. Workflow states join onto encounter types by
/// case-sensitive name; the numeric id never appears in workflow
/// configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterType {
    pub id: EncounterTypeId,
    pub name: String,
}

/// A timestamped clinical event of a given type, belonging to exactly one
/// patient and usually one program. Created once, never mutated; may be
/// voided with a reason.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub uuid: Uuid,
    pub patient: PatientId,
    pub encounter_type: EncounterTypeId,
    pub program: Option<ProgramId>,
    pub datetime: NaiveDateTime,
    pub voided: bool,
    pub void_reason: Option<String>,
}

/// The value of a recorded observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObsValue {
    /// A reference into the concept vocabulary (a coded answer).
    Coded(ConceptId),
    Numeric(f64),
    Text(String),
    Datetime(NaiveDateTime),
}

impl ObsValue {
    pub fn as_coded(&self) -> Option<ConceptId> {
        match self {
            ObsValue::Coded(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            ObsValue::Numeric(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ObsValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A single recorded question/answer datum. The concept is the question;
/// the value is the answer. Immutable once created; may be voided.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObsId,
    pub uuid: Uuid,
    pub person: PatientId,
    pub concept: ConceptId,
    pub encounter: Option<EncounterId>,
    pub obs_datetime: NaiveDateTime,
    pub value: ObsValue,
    pub voided: bool,
    pub void_reason: Option<String>,
}

impl Observation {
    /// True when this observation answers with the given coded concept.
    pub fn is_coded_as(&self, answer: ConceptId) -> bool {
        self.value.as_coded() == Some(answer)
    }
}
