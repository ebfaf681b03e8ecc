// crates/mergegate-core/src/results.rs
// ============================================================================
// Module: Result Types
// Description: Gate and node outcome records, and merge eligibility
//              decisions.
// Purpose: Give every downstream consumer (scheduler, state, eligibility,
//          deliverables writer, CLI) one shared vocabulary for "what
//          happened".
// Dependencies: crate::identifiers, serde
// ============================================================================

//! ## Overview
//! Every failure after plan validation is captured here rather than raised as
//! a Rust error: a failing gate is a [`GateResult`] with
//! [`GateStatus::Failed`], not a panic or an `Err`. This is what lets the
//! scheduler keep running the rest of the graph after one item fails.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::GateName;
use crate::identifiers::ItemName;

/// Outcome of a single gate attempt (after retries are exhausted or a pass
/// is reached).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    /// The gate exited successfully.
    #[serde(rename = "pass")]
    Passed,
    /// The gate exited unsuccessfully after exhausting its retry budget.
    #[serde(rename = "fail")]
    Failed,
    /// The gate was not run because its `runtime` is not locally executable.
    #[serde(rename = "skipped")]
    Skipped,
    /// The gate was administratively blocked by `policy.blockOn` before
    /// executing.
    #[serde(rename = "blocked")]
    Blocked,
    /// An attempt failed with a transient disposition and another attempt
    /// is queued after backoff. Never a gate's final recorded status.
    #[serde(rename = "retrying")]
    Retrying,
}

/// The record of one gate's execution, including retry history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    /// Gate name.
    pub gate: GateName,
    /// Final status after all attempts.
    pub status: GateStatus,
    /// Number of attempts made, at least 1 unless blocked or skipped.
    pub attempts: u32,
    /// ISO-8601 UTC timestamp of the first attempt's start.
    pub started_at: String,
    /// ISO-8601 UTC timestamp of the last attempt's completion.
    pub finished_at: String,
    /// Wall-clock duration across all attempts, in milliseconds.
    pub duration_ms: u64,
    /// Process exit code of the final attempt, when one ran.
    pub exit_code: Option<i32>,
    /// Final attempt's captured stdout, possibly truncated.
    pub stdout_tail: String,
    /// Final attempt's captured stderr, possibly truncated.
    pub stderr_tail: String,
    /// Relative artifact paths collected for this gate.
    pub artifacts: Vec<String>,
}

/// Aggregated status of an item, derived from its own gates and the status
/// of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// No gate has run yet and no dependency has failed or been blocked.
    Pending,
    /// At least one gate is executing.
    Running,
    /// At least one gate's current attempt failed transiently and is
    /// queued to retry after backoff, with no gate yet in its final
    /// failed state.
    Retrying,
    /// Every required gate passed (or was skipped/optional) and no
    /// dependency is failed or blocked.
    Passed,
    /// A required gate failed.
    Failed,
    /// A dependency is failed or blocked, so this item was never attempted.
    Blocked,
}

/// The full execution record of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    /// Item name.
    pub item: ItemName,
    /// Aggregated node status.
    pub status: NodeStatus,
    /// Per-gate results, keyed by gate name, in declared gate order.
    pub gates: BTreeMap<GateName, GateResult>,
    /// Dependencies whose failure or blocked status caused this node to be
    /// blocked. Empty unless `status == NodeStatus::Blocked`.
    pub blocked_by: Vec<ItemName>,
}

impl NodeResult {
    /// Creates a fresh, unstarted node result.
    #[must_use]
    pub fn pending(item: ItemName) -> Self {
        Self { item, status: NodeStatus::Pending, gates: BTreeMap::new(), blocked_by: Vec::new() }
    }

    /// Returns true when every recorded gate is [`GateStatus::Passed`] or
    /// [`GateStatus::Skipped`].
    #[must_use]
    pub fn all_gates_clean(&self) -> bool {
        self.gates.values().all(|result| matches!(result.status, GateStatus::Passed | GateStatus::Skipped))
    }

    /// Returns true when any recorded gate is [`GateStatus::Failed`] or
    /// [`GateStatus::Blocked`].
    #[must_use]
    pub fn has_blocking_gate(&self) -> bool {
        self.gates.values().any(|result| matches!(result.status, GateStatus::Failed | GateStatus::Blocked))
    }

    /// Returns true when any recorded gate is [`GateStatus::Retrying`].
    #[must_use]
    pub fn has_retrying_gate(&self) -> bool {
        self.gates.values().any(|result| matches!(result.status, GateStatus::Retrying))
    }
}

/// Merge eligibility decision for a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeDecision {
    /// Item this decision covers.
    pub item: ItemName,
    /// Whether the item is eligible to merge.
    pub eligible: bool,
    /// Human-readable reasons supporting the decision, most significant
    /// first.
    pub reasons: Vec<String>,
    /// Whether an authorized administrative-green override could make this
    /// item eligible. Never set for items that are merely pending.
    pub requires_override: bool,
    /// Dependencies that caused this item to be blocked, mirroring
    /// [`NodeResult::blocked_by`]. Empty unless the underlying node is
    /// blocked.
    pub blocked_by: Vec<ItemName>,
}

impl MergeDecision {
    /// Builds an eligible decision with no blocking reasons.
    #[must_use]
    pub fn eligible(item: ItemName) -> Self {
        Self { item, eligible: true, reasons: Vec::new(), requires_override: false, blocked_by: Vec::new() }
    }

    /// Builds an ineligible decision carrying `reasons`, optionally
    /// overrideable and/or naming the dependencies that block it.
    #[must_use]
    pub fn ineligible(item: ItemName, reasons: Vec<String>, requires_override: bool, blocked_by: Vec<ItemName>) -> Self {
        Self { item, eligible: false, reasons, requires_override, blocked_by }
    }
}
