//! Program workflow graphs.
//!
//! A graph maps each state to its unique successor, from the virtual
//! INITIAL terminal to the virtual END terminal; the states in between are
//! named after the encounter types they represent. Graphs are static
//! configuration: assembled once at startup, validated eagerly, and shared
//! read-only across concurrent evaluations.
//!
//! [`GraphBuilder::build`] rejects every malformed shape up front — cycles,
//! duplicate transitions, steps with no successor, steps unreachable from
//! INITIAL, and guards bound to unregistered steps — so that evaluation
//! only ever walks a graph known to terminate.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{WorkflowError, WorkflowResult};
use crate::guard::Guard;

/// A node in a program's encounter graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Virtual start terminal; never a real encounter type.
    Initial,
    /// A workflow step, named after the encounter type it maps onto
    /// (case-sensitive).
    Step(String),
    /// Virtual completion terminal.
    End,
}

impl State {
    pub fn step(name: impl Into<String>) -> Self {
        State::Step(name.into())
    }

    /// The encounter-type name for a step; terminals have none.
    pub fn name(&self) -> Option<&str> {
        match self {
            State::Step(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Initial | State::End)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Initial => write!(f, "INITIAL"),
            State::Step(name) => write!(f, "{name}"),
            State::End => write!(f, "END"),
        }
    }
}

/// Validated, immutable workflow graph for one program.
pub struct WorkflowGraph {
    transitions: HashMap<State, State>,
    guards: HashMap<String, Vec<Arc<dyn Guard>>>,
    /// Step names in traversal order from INITIAL.
    order: Vec<String>,
}

impl WorkflowGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// The unique successor of `state`. Asking about a state the graph does
    /// not know is a configuration error.
    pub fn successor(&self, state: &State) -> WorkflowResult<&State> {
        self.transitions
            .get(state)
            .ok_or_else(|| WorkflowError::UnknownState(state.to_string()))
    }

    /// Guards gating `step`; an empty slice means the step is due whenever
    /// it has not already been completed on the day.
    pub fn guards_for(&self, step: &str) -> &[Arc<dyn Guard>] {
        self.guards.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of steps between the terminals.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Step names in traversal order.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Assembles a graph without validation. Only the traversal-cap tests
    /// use this; everything else must go through the builder.
    pub(crate) fn from_transitions_unchecked(
        transitions: HashMap<State, State>,
        order: Vec<String>,
    ) -> Self {
        Self {
            transitions,
            guards: HashMap::new(),
            order,
        }
    }
}

/// Builder for [`WorkflowGraph`]; all validation happens in [`build`].
///
/// [`build`]: GraphBuilder::build
pub struct GraphBuilder {
    edges: Vec<(State, State)>,
    guards: Vec<(String, Arc<dyn Guard>)>,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            edges: Vec::new(),
            guards: Vec::new(),
        }
    }

    /// Chains INITIAL through every step in order, ending at END. Most
    /// programs are a simple path and need nothing else.
    pub fn path<I>(mut self, steps: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut previous = State::Initial;
        for step in steps {
            let state = State::step(step);
            self.edges.push((previous, state.clone()));
            previous = state;
        }
        self.edges.push((previous, State::End));
        self
    }

    /// Adds a single transition.
    pub fn edge(mut self, from: State, to: State) -> Self {
        self.edges.push((from, to));
        self
    }

    /// Registers a guard on `step`. Guards are evaluated in registration
    /// order; all must hold for the step to be due.
    pub fn guard(mut self, step: impl Into<String>, guard: impl Guard + 'static) -> Self {
        let guard: Arc<dyn Guard> = Arc::new(guard);
        self.guards.push((step.into(), guard));
        self
    }

    pub fn build(self) -> WorkflowResult<WorkflowGraph> {
        if self.edges.is_empty() {
            return Err(WorkflowError::EmptyGraph);
        }

        let mut transitions: HashMap<State, State> = HashMap::new();
        for (from, to) in self.edges {
            if from == State::End {
                return Err(WorkflowError::EndHasSuccessor);
            }
            if transitions.insert(from.clone(), to).is_some() {
                return Err(WorkflowError::DuplicateTransition(from.to_string()));
            }
        }

        // Walk from INITIAL; a graph whose every state has a unique
        // successor terminates iff the walk reaches END without revisiting.
        let mut order = Vec::new();
        let mut visited = std::collections::HashSet::new();
        visited.insert(State::Initial);
        let mut current = State::Initial;
        loop {
            let next = transitions
                .get(&current)
                .ok_or_else(|| WorkflowError::UnknownState(current.to_string()))?
                .clone();
            if next == State::End {
                break;
            }
            if !visited.insert(next.clone()) {
                return Err(WorkflowError::CyclicGraph(next.to_string()));
            }
            if let Some(name) = next.name() {
                order.push(name.to_string());
            }
            current = next;
        }

        for from in transitions.keys() {
            if !visited.contains(from) {
                return Err(WorkflowError::UnreachableState(from.to_string()));
            }
        }

        let mut guards: HashMap<String, Vec<Arc<dyn Guard>>> = HashMap::new();
        for (step, guard) in self.guards {
            if !order.iter().any(|known| known == &step) {
                return Err(WorkflowError::GuardOnUnknownState {
                    guard: guard.name().to_string(),
                    state: step,
                });
            }
            guards.entry(step).or_default().push(guard);
        }

        Ok(WorkflowGraph {
            transitions,
            guards,
            order,
        })
    }
}
