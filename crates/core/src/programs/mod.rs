//! Built-in clinical program workflows.
//!
//! Each submodule declares one program's encounter graph and guard table.
//! The graphs are data; all four share the same engine.

pub mod cxca;
pub mod htn;
pub mod tb;
pub mod vmmc;

use crate::engine::WorkflowRegistry;
use crate::error::WorkflowResult;

/// Registry holding every built-in program, ready to hand to
/// [`crate::engine::WorkflowEngine`].
pub fn standard_registry() -> WorkflowResult<WorkflowRegistry> {
    let mut registry = WorkflowRegistry::new();
    registry.register(cxca::workflow()?);
    registry.register(vmmc::workflow()?);
    registry.register(tb::workflow()?);
    registry.register(htn::workflow()?);
    Ok(registry)
}
