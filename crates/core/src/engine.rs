//! Workflow evaluation.
//!
//! [`WorkflowEngine::next_encounter`] walks a program's graph from the
//! start terminal and returns the first state that is due for the patient
//! on the as-of date, or `None` once the end terminal is reached. A state
//! is skipped when an encounter of its type was already recorded for the
//! patient within the as-of day (scoped to the program), when it falls
//! outside the operator's permitted activity set (operator-gated programs
//! only), or when any of its guards is not satisfied.
//!
//! The call is a pure read: it never creates, updates or voids anything,
//! so evaluations for any mix of patients may run concurrently. The
//! traversal is capped at (graph size + 1) transitions as a backstop
//! against a corrupted graph; hitting the cap is a configuration error,
//! never a hang.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use moyo_types::{LocationId, PatientId};

use crate::clinical::EncounterType;
use crate::config::EngineConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::graph::{State, WorkflowGraph};
use crate::guard::{EvalContext, Operator};
use crate::store::{ClinicalDataStore, DateTimeRange, EncounterQuery};

/// Maps one of an operator's activity labels onto the workflow state it
/// permits, or `None` when the label is not recognised.
pub type ActivityMapper = fn(&str) -> Option<&'static str>;

/// One program's workflow: its graph plus how (if at all) operator
/// activities restrict it.
pub struct ProgramWorkflow {
    name: String,
    graph: WorkflowGraph,
    activity_mapper: Option<ActivityMapper>,
}

impl ProgramWorkflow {
    /// `name` must match the program's name in the clinical data store.
    pub fn new(name: impl Into<String>, graph: WorkflowGraph) -> Self {
        Self {
            name: name.into(),
            graph,
            activity_mapper: None,
        }
    }

    /// Restricts evaluation to states in the operator's permitted activity
    /// set. Evaluating such a program without an operator in the request is
    /// an error.
    pub fn with_activity_mapper(mut self, mapper: ActivityMapper) -> Self {
        self.activity_mapper = Some(mapper);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn is_operator_gated(&self) -> bool {
        self.activity_mapper.is_some()
    }

    fn activity_mapper(&self) -> Option<ActivityMapper> {
        self.activity_mapper
    }
}

/// All registered program workflows, keyed by program name. Built once at
/// startup and shared read-only.
#[derive(Default)]
pub struct WorkflowRegistry {
    programs: HashMap<String, Arc<ProgramWorkflow>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `workflow` under its program name, replacing any previous
    /// registration of the same name.
    pub fn register(&mut self, workflow: ProgramWorkflow) {
        self.programs
            .insert(workflow.name().to_string(), Arc::new(workflow));
    }

    pub fn get(&self, program: &str) -> Option<Arc<ProgramWorkflow>> {
        self.programs.get(program).cloned()
    }

    pub fn program_names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }
}

/// Who and where is asking. The engine reads this instead of any ambient
/// session state, which keeps evaluation deterministic and testable.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub operator: Option<Operator>,
    pub location: Option<LocationId>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_operator(operator: Operator) -> Self {
        Self {
            operator: Some(operator),
            location: None,
        }
    }

    pub fn at_location(mut self, location: LocationId) -> Self {
        self.location = Some(location);
        self
    }
}

/// The workflow engine: stateless orchestration over the registry, the
/// configuration and the clinical data store.
pub struct WorkflowEngine {
    store: Arc<dyn ClinicalDataStore>,
    registry: Arc<WorkflowRegistry>,
    config: Arc<EngineConfig>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn ClinicalDataStore>,
        registry: Arc<WorkflowRegistry>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// The next encounter type due for `patient` in `program` as of
    /// `as_of`, or `None` when the patient has completed the program's
    /// workflow for that date.
    pub fn next_encounter(
        &self,
        program: &str,
        patient: PatientId,
        as_of: NaiveDate,
        request: &RequestContext,
    ) -> WorkflowResult<Option<EncounterType>> {
        let workflow = self
            .registry
            .get(program)
            .ok_or_else(|| WorkflowError::UnknownProgram(program.to_string()))?;
        let program_id = self.store.program_id(workflow.name())?;
        let permitted = self.permitted_states(&workflow, request)?;

        let ctx = EvalContext {
            store: self.store.as_ref(),
            config: &self.config,
            program: program_id,
            patient,
            as_of,
            operator: request.operator.as_ref(),
            location: request.location,
        };

        let graph = workflow.graph();
        let limit = graph.len() + 1;
        let mut state = State::Initial;

        for _ in 0..limit {
            state = graph.successor(&state)?.clone();
            let step = match &state {
                State::End => return Ok(None),
                State::Step(name) => name.clone(),
                // The builder rejects INITIAL as a transition target.
                State::Initial => return Err(WorkflowError::UnknownState(state.to_string())),
            };

            tracing::debug!(program = workflow.name(), state = %step, "evaluating workflow state");
            let encounter_type = self.store.encounter_type(&step)?;

            let completed_today = self.store.encounter_exists(
                &EncounterQuery::for_patient(patient)
                    .of_type(encounter_type.id)
                    .in_program(program_id)
                    .within(DateTimeRange::day_of(as_of)),
            )?;
            if completed_today {
                continue;
            }

            if let Some(permitted) = &permitted {
                if !permitted.contains(step.as_str()) {
                    continue;
                }
            }

            if self.guards_satisfied(graph, &step, &ctx)? {
                return Ok(Some(encounter_type));
            }
        }

        Err(WorkflowError::TraversalLimitExceeded {
            program: workflow.name().to_string(),
            limit,
        })
    }

    /// Resolves the operator's permitted activity labels into workflow
    /// state names. `None` means the program is not operator-gated.
    fn permitted_states(
        &self,
        workflow: &ProgramWorkflow,
        request: &RequestContext,
    ) -> WorkflowResult<Option<HashSet<&'static str>>> {
        let Some(mapper) = workflow.activity_mapper() else {
            return Ok(None);
        };
        let operator = request
            .operator
            .as_ref()
            .ok_or_else(|| WorkflowError::MissingOperator(workflow.name().to_string()))?;

        let mut permitted = HashSet::new();
        for activity in self.store.operator_activities(operator.username())? {
            match mapper(&activity) {
                Some(state) => {
                    permitted.insert(state);
                }
                None => tracing::warn!(
                    program = workflow.name(),
                    activity = %activity,
                    "ignoring unrecognised operator activity"
                ),
            }
        }
        Ok(Some(permitted))
    }

    fn guards_satisfied(
        &self,
        graph: &WorkflowGraph,
        step: &str,
        ctx: &EvalContext<'_>,
    ) -> WorkflowResult<bool> {
        for guard in graph.guards_for(step) {
            if !guard.evaluate(ctx)? {
                tracing::debug!(state = %step, guard = guard.name(), "guard not satisfied");
                return Ok(false);
            }
        }
        Ok(true)
    }
}
