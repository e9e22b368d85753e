//! # Moyo Core
//!
//! Clinical workflow engine for program-based encounter scheduling.
//!
//! Clinics running HIV, TB, cervical-cancer-screening and circumcision
//! programmes need one question answered at every touchpoint: *which
//! encounter should this patient be offered next?* This crate answers it by
//! walking a per-program graph of encounter-type states, skipping states
//! already completed on the day, and testing the remainder against guard
//! conditions evaluated over the patient's observation history — all as of
//! an arbitrary date, so historical visits can be reconstructed.
//!
//! The crate is a library with no I/O surface of its own:
//! - Persistence is consumed through the [`store::ClinicalDataStore`]
//!   trait; [`store::memory::InMemoryStore`] is the bundled reference
//!   backend.
//! - HTTP routing, rendering and authentication belong to the embedding
//!   service. The engine receives an explicit [`engine::RequestContext`]
//!   (operator, location) instead of reading any session state.
//!
//! Evaluation is a pure read: [`engine::WorkflowEngine::next_encounter`]
//! never writes, holds no mutable state between calls, and is safe to run
//! concurrently for any mix of patients.

pub mod clinical;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod guard;
pub mod programs;
pub mod store;
pub mod time;

pub use clinical::{Encounter, EncounterType, Gender, ObsValue, Observation, Patient};
pub use config::EngineConfig;
pub use engine::{ProgramWorkflow, RequestContext, WorkflowEngine, WorkflowRegistry};
pub use error::{WorkflowError, WorkflowResult};
pub use graph::{State, WorkflowGraph};
pub use guard::{EvalContext, FnGuard, Guard, Operator};
pub use store::{ClinicalDataStore, DateTimeRange, EncounterQuery, StoreError, StoreResult};
