// crates/mergegate-core/src/lib.rs
// ============================================================================
// Crate: mergegate-core
// Description: Plan schema, validation, dependency resolution, execution
//              state, error classification, and merge eligibility.
// Purpose: The deterministic, host-agnostic core of a merge train: no
//          subprocesses, no filesystem, no clock reads.
// ============================================================================

//! Deterministic plan validation, dependency resolution, execution state
//! tracking, and merge eligibility for a merge train.
//!
//! This crate has no I/O: gate execution lives in `mergegate-exec`,
//! scheduling lives in `mergegate-sched`, and deliverable writing lives in
//! `mergegate-artifacts`. Everything here is a pure function or an in-memory
//! data structure, which is what makes the properties in the workspace's
//! design documentation (determinism, replayability) provable by test rather
//! than merely intended.

pub mod classifier;
pub mod eligibility;
pub mod errors;
pub mod hashing;
pub mod identifiers;
pub mod interfaces;
pub mod plan;
pub mod resolver;
pub mod results;
pub mod state;
pub mod time;

pub use classifier::Classification;
pub use classifier::Disposition;
pub use classifier::Severity;
pub use classifier::classify;
pub use eligibility::OverrideError;
pub use eligibility::apply_admin_green_override;
pub use eligibility::evaluate as evaluate_eligibility;
pub use eligibility::ready_for_merge;
pub use errors::SchemaIssue;
pub use errors::ValidationError;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::EncodeError;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::encode;
pub use hashing::encode_with_limit;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical;
pub use identifiers::GateName;
pub use identifiers::IdentifierError;
pub use identifiers::ItemName;
pub use interfaces::CodeForgeClient;
pub use interfaces::CodeForgeError;
pub use interfaces::PlanSource;
pub use interfaces::PlanSourceError;
pub use interfaces::VersionControlDriver;
pub use interfaces::VersionControlError;
pub use plan::AdminGreenOverride;
pub use plan::DEFAULT_GATE_TIMEOUT_MS;
pub use plan::Gate;
pub use plan::GateRuntime;
pub use plan::Item;
pub use plan::MergeRule;
pub use plan::Overrides;
pub use plan::Plan;
pub use plan::Policy;
pub use plan::RetryConfig;
pub use plan::load_plan;
pub use resolver::Levels;
pub use resolver::levelize;
pub use results::GateResult;
pub use results::GateStatus;
pub use results::MergeDecision;
pub use results::NodeResult;
pub use results::NodeStatus;
pub use state::ExecutionState;
pub use time::Clock;
pub use time::FixedClock;
pub use time::SystemClock;
pub use time::TimestampError;
pub use time::format_iso8601;
pub use time::parse_iso8601;
