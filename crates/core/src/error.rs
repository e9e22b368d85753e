//! Workflow evaluation errors.
//!
//! Two failure families matter at the boundary: configuration errors (a
//! graph, guard or vocabulary name that can never work, regardless of
//! patient data) and data-store failures (the backend could not answer).
//! Both abort the evaluation; neither is ever collapsed into a `None`
//! result, because "no further action due" is a legitimate answer with its
//! own meaning.

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("unknown program: {0}")]
    UnknownProgram(String),
    #[error("workflow state {0} has no registered successor")]
    UnknownState(String),
    #[error("workflow graph has no transitions")]
    EmptyGraph,
    #[error("workflow graph revisits state {0}")]
    CyclicGraph(String),
    #[error("duplicate transition out of state {0}")]
    DuplicateTransition(String),
    #[error("the end terminal cannot have a successor")]
    EndHasSuccessor,
    #[error("workflow state {0} is not reachable from the start terminal")]
    UnreachableState(String),
    #[error("guard '{guard}' is bound to unregistered state {state}")]
    GuardOnUnknownState { guard: String, state: String },
    #[error("workflow for {program} did not reach the end terminal within {limit} transitions")]
    TraversalLimitExceeded { program: String, limit: usize },
    #[error("no operator in context for operator-gated program {0}")]
    MissingOperator(String),
    #[error("global property {key} has non-numeric value '{value}'")]
    InvalidGlobalProperty { key: String, value: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// True for errors caused by bad static configuration (graphs, guard
    /// registrations, vocabulary names) as opposed to the data store being
    /// unreachable. Unknown concept and encounter-type names count as
    /// configuration errors even though the store reports them.
    pub fn is_configuration(&self) -> bool {
        match self {
            WorkflowError::Store(err) => !matches!(err, StoreError::Unavailable(_)),
            _ => true,
        }
    }
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
