// crates/mergegate-core/src/interfaces.rs
// ============================================================================
// Module: External Collaborator Interfaces
// Description: Trait boundaries for hosts embedding the engine.
// Purpose: Name the seams between plan execution and the outside world
//          (version control, code forges, plan sources) without the engine
//          itself depending on any concrete implementation.
// Dependencies: crate::identifiers, crate::plan
// ============================================================================

//! ## Overview
//! These traits are defined so host applications have a stable contract to
//! implement, but the engine in this crate never calls them: merge execution
//! (checking out branches, pushing merge commits, opening or updating pull
//! requests) is explicitly out of scope, left to whatever embeds the
//! scheduler and eligibility evaluator. Keeping the traits here, uncalled,
//! documents the boundary instead of leaving it implicit.

use crate::identifiers::ItemName;
use crate::plan::Plan;

/// Errors a [`VersionControlDriver`] implementation may raise.
#[derive(Debug, thiserror::Error)]
pub enum VersionControlError {
    /// The requested ref does not exist.
    #[error("ref not found: {0}")]
    RefNotFound(String),
    /// The underlying version-control operation failed.
    #[error("version control operation failed: {0}")]
    OperationFailed(String),
}

/// Host-supplied access to the underlying version control system.
///
/// # Invariants
/// - Implementations must not be called by this crate's orchestrator; they
///   exist purely as a contract for embedding hosts.
pub trait VersionControlDriver: Send + Sync {
    /// Returns the current commit hash of `item`'s branch, if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`VersionControlError`] when the branch cannot be resolved.
    fn resolve_branch_head(&self, item: &ItemName) -> Result<String, VersionControlError>;

    /// Merges `item`'s branch into the plan's target branch.
    ///
    /// # Errors
    ///
    /// Returns [`VersionControlError`] when the merge cannot be performed.
    fn merge_into_target(&self, item: &ItemName, plan: &Plan) -> Result<String, VersionControlError>;
}

/// Errors a [`CodeForgeClient`] implementation may raise.
#[derive(Debug, thiserror::Error)]
pub enum CodeForgeError {
    /// The forge API returned an error response.
    #[error("code forge request failed: {0}")]
    RequestFailed(String),
    /// The referenced pull request or check does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Host-supplied access to a code forge (pull request status, checks,
/// comments).
///
/// # Invariants
/// - Implementations must not be called by this crate's orchestrator; they
///   exist purely as a contract for embedding hosts.
pub trait CodeForgeClient: Send + Sync {
    /// Posts a status summary comment for `item`.
    ///
    /// # Errors
    ///
    /// Returns [`CodeForgeError`] when the comment cannot be posted.
    fn post_status_comment(&self, item: &ItemName, summary: &str) -> Result<(), CodeForgeError>;

    /// Returns whether `item`'s associated pull request is currently
    /// mergeable according to the forge's own checks.
    ///
    /// # Errors
    ///
    /// Returns [`CodeForgeError`] when the pull request cannot be located.
    fn is_pull_request_mergeable(&self, item: &ItemName) -> Result<bool, CodeForgeError>;
}

/// Errors a [`PlanSource`] implementation may raise.
#[derive(Debug, thiserror::Error)]
pub enum PlanSourceError {
    /// The plan could not be read from the source.
    #[error("failed to read plan: {0}")]
    ReadFailed(String),
}

/// Host-supplied source of plan bytes (a file, a generated manifest, a
/// remote API). The engine only ever consumes the bytes this produces
/// through [`crate::plan::load_plan`]; it never calls this trait directly.
pub trait PlanSource: Send + Sync {
    /// Returns the raw plan document bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PlanSourceError`] when the bytes cannot be read.
    fn read_plan_bytes(&self) -> Result<Vec<u8>, PlanSourceError>;
}
