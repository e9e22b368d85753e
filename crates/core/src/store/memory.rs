//! In-memory clinical data store.
//!
//! Reference backend used by the test suites and for embedding the engine
//! without a database. Mutators exist only to seed vocabulary and history;
//! the engine itself reads through [`ClinicalDataStore`] and never writes.
//!
//! Definition methods are idempotent per name so fixtures can re-declare
//! shared vocabulary freely.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, NaiveDateTime};
use moyo_types::{ConceptId, EncounterId, EncounterTypeId, ObsId, PatientId, ProgramId};
use uuid::Uuid;

use crate::clinical::{Encounter, EncounterType, Gender, ObsValue, Observation, Patient};
use crate::store::{ClinicalDataStore, DateTimeRange, EncounterQuery, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    concepts: HashMap<String, ConceptId>,
    encounter_types: HashMap<String, EncounterType>,
    programs: HashMap<String, ProgramId>,
    patients: HashMap<PatientId, Patient>,
    encounters: Vec<Encounter>,
    observations: Vec<Observation>,
    operator_activities: HashMap<String, Vec<String>>,
    global_properties: HashMap<String, String>,
    next_concept: i32,
    next_encounter_type: i32,
    next_program: i32,
    next_patient: i32,
    next_encounter: i32,
    next_obs: i64,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    pub fn add_patient(
        &self,
        birthdate: Option<NaiveDate>,
        gender: Option<Gender>,
    ) -> StoreResult<PatientId> {
        let mut inner = self.write()?;
        inner.next_patient += 1;
        let id = PatientId::new(inner.next_patient);
        inner.patients.insert(
            id,
            Patient {
                id,
                birthdate,
                gender,
            },
        );
        Ok(id)
    }

    pub fn define_concept(&self, name: &str) -> StoreResult<ConceptId> {
        let mut inner = self.write()?;
        if let Some(id) = inner.concepts.get(name) {
            return Ok(*id);
        }
        inner.next_concept += 1;
        let id = ConceptId::new(inner.next_concept);
        inner.concepts.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn define_encounter_type(&self, name: &str) -> StoreResult<EncounterTypeId> {
        let mut inner = self.write()?;
        if let Some(encounter_type) = inner.encounter_types.get(name) {
            return Ok(encounter_type.id);
        }
        inner.next_encounter_type += 1;
        let id = EncounterTypeId::new(inner.next_encounter_type);
        inner.encounter_types.insert(
            name.to_string(),
            EncounterType {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    pub fn define_program(&self, name: &str) -> StoreResult<ProgramId> {
        let mut inner = self.write()?;
        if let Some(id) = inner.programs.get(name) {
            return Ok(*id);
        }
        inner.next_program += 1;
        let id = ProgramId::new(inner.next_program);
        inner.programs.insert(name.to_string(), id);
        Ok(id)
    }

    /// Records an encounter of the named type. The type must already be
    /// defined; unknown names fail like any other vocabulary miss.
    pub fn record_encounter(
        &self,
        patient: PatientId,
        type_name: &str,
        program: Option<ProgramId>,
        datetime: NaiveDateTime,
    ) -> StoreResult<EncounterId> {
        let mut inner = self.write()?;
        let encounter_type = inner
            .encounter_types
            .get(type_name)
            .ok_or_else(|| StoreError::UnknownEncounterType(type_name.to_string()))?
            .id;
        inner.next_encounter += 1;
        let id = EncounterId::new(inner.next_encounter);
        inner.encounters.push(Encounter {
            id,
            uuid: Uuid::new_v4(),
            patient,
            encounter_type,
            program,
            datetime,
            voided: false,
            void_reason: None,
        });
        Ok(id)
    }

    pub fn record_coded_observation(
        &self,
        person: PatientId,
        question: &str,
        answer: &str,
        encounter: Option<EncounterId>,
        obs_datetime: NaiveDateTime,
    ) -> StoreResult<ObsId> {
        let answer = {
            let inner = self.read()?;
            *inner
                .concepts
                .get(answer)
                .ok_or_else(|| StoreError::UnknownConcept(answer.to_string()))?
        };
        self.record_observation(person, question, ObsValue::Coded(answer), encounter, obs_datetime)
    }

    pub fn record_numeric_observation(
        &self,
        person: PatientId,
        question: &str,
        value: f64,
        encounter: Option<EncounterId>,
        obs_datetime: NaiveDateTime,
    ) -> StoreResult<ObsId> {
        self.record_observation(person, question, ObsValue::Numeric(value), encounter, obs_datetime)
    }

    pub fn record_text_observation(
        &self,
        person: PatientId,
        question: &str,
        text: &str,
        encounter: Option<EncounterId>,
        obs_datetime: NaiveDateTime,
    ) -> StoreResult<ObsId> {
        self.record_observation(
            person,
            question,
            ObsValue::Text(text.to_string()),
            encounter,
            obs_datetime,
        )
    }

    fn record_observation(
        &self,
        person: PatientId,
        question: &str,
        value: ObsValue,
        encounter: Option<EncounterId>,
        obs_datetime: NaiveDateTime,
    ) -> StoreResult<ObsId> {
        let mut inner = self.write()?;
        let concept = *inner
            .concepts
            .get(question)
            .ok_or_else(|| StoreError::UnknownConcept(question.to_string()))?;
        inner.next_obs += 1;
        let id = ObsId::new(inner.next_obs);
        inner.observations.push(Observation {
            id,
            uuid: Uuid::new_v4(),
            person,
            concept,
            encounter,
            obs_datetime,
            value,
            voided: false,
            void_reason: None,
        });
        Ok(id)
    }

    pub fn void_encounter(&self, id: EncounterId, reason: &str) -> StoreResult<()> {
        let mut inner = self.write()?;
        let encounter = inner
            .encounters
            .iter_mut()
            .find(|encounter| encounter.id == id)
            .ok_or(StoreError::UnknownEncounter(id))?;
        encounter.voided = true;
        encounter.void_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn void_observation(&self, id: ObsId, reason: &str) -> StoreResult<()> {
        let mut inner = self.write()?;
        let observation = inner
            .observations
            .iter_mut()
            .find(|observation| observation.id == id)
            .ok_or(StoreError::UnknownObservation(id))?;
        observation.voided = true;
        observation.void_reason = Some(reason.to_string());
        Ok(())
    }

    pub fn set_operator_activities(&self, operator: &str, activities: &[&str]) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner.operator_activities.insert(
            operator.to_string(),
            activities.iter().map(|activity| activity.to_string()).collect(),
        );
        Ok(())
    }

    pub fn set_global_property(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner
            .global_properties
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl ClinicalDataStore for InMemoryStore {
    fn patient(&self, id: PatientId) -> StoreResult<Patient> {
        let inner = self.read()?;
        inner
            .patients
            .get(&id)
            .cloned()
            .ok_or(StoreError::UnknownPatient(id))
    }

    fn encounters(&self, query: &EncounterQuery) -> StoreResult<Vec<Encounter>> {
        let inner = self.read()?;
        let mut matched: Vec<Encounter> = inner
            .encounters
            .iter()
            .filter(|encounter| query.matches(encounter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| (b.datetime, b.id).cmp(&(a.datetime, a.id)));
        Ok(matched)
    }

    fn latest_observation(
        &self,
        person: PatientId,
        concept: ConceptId,
        range: Option<DateTimeRange>,
    ) -> StoreResult<Option<Observation>> {
        let inner = self.read()?;
        Ok(inner
            .observations
            .iter()
            .filter(|obs| {
                !obs.voided
                    && obs.person == person
                    && obs.concept == concept
                    && range.map_or(true, |range| range.contains(obs.obs_datetime))
            })
            .max_by_key(|obs| (obs.obs_datetime, obs.id))
            .cloned())
    }

    fn encounter_observations(
        &self,
        encounter: EncounterId,
        concept: ConceptId,
    ) -> StoreResult<Vec<Observation>> {
        let inner = self.read()?;
        Ok(inner
            .observations
            .iter()
            .filter(|obs| {
                !obs.voided && obs.encounter == Some(encounter) && obs.concept == concept
            })
            .cloned()
            .collect())
    }

    fn concept_id(&self, name: &str) -> StoreResult<ConceptId> {
        let inner = self.read()?;
        inner
            .concepts
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::UnknownConcept(name.to_string()))
    }

    fn encounter_type(&self, name: &str) -> StoreResult<EncounterType> {
        let inner = self.read()?;
        inner
            .encounter_types
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownEncounterType(name.to_string()))
    }

    fn program_id(&self, name: &str) -> StoreResult<ProgramId> {
        let inner = self.read()?;
        inner
            .programs
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::UnknownProgram(name.to_string()))
    }

    fn operator_activities(&self, operator: &str) -> StoreResult<Vec<String>> {
        let inner = self.read()?;
        Ok(inner
            .operator_activities
            .get(operator)
            .cloned()
            .unwrap_or_default())
    }

    fn global_property(&self, key: &str) -> StoreResult<Option<String>> {
        let inner = self.read()?;
        Ok(inner.global_properties.get(key).cloned())
    }
}
