// crates/mergegate-orchestrator/src/lib.rs
// ============================================================================
// Crate: mergegate-orchestrator
// Description: Wires plan validation, scheduling, eligibility, and
//              deliverables writing into a single run entry point.
// Purpose: The crate a host application actually depends on.
// ============================================================================

//! The merge train's top-level entry point: validate, schedule, evaluate
//! eligibility, write deliverables.

pub mod orchestrator;

pub use orchestrator::OrchestratorError;
pub use orchestrator::RunOptions;
pub use orchestrator::Summary;
pub use orchestrator::run;
