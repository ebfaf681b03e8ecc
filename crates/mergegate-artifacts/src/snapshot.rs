// crates/mergegate-artifacts/src/snapshot.rs
// ============================================================================
// Module: Snapshot
// Description: Renders a human-readable Markdown summary of one run.
// Purpose: Give a human glancing at the artifact directory a readable
//          summary without having to parse the manifest or raw state.
// Dependencies: mergegate-core
// ============================================================================

//! ## Overview
//! The snapshot is derived entirely from [`mergegate_core::ExecutionState`]
//! and [`mergegate_core::MergeDecision`] values already computed elsewhere;
//! this module only formats them, plus a level assignment recomputed from
//! the plan itself since neither of those carry it. It is not canonically
//! encoded and is not meant to be parsed back.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use mergegate_core::ExecutionState;
use mergegate_core::GateStatus;
use mergegate_core::ItemName;
use mergegate_core::MergeDecision;
use mergegate_core::NodeStatus;
use mergegate_core::Plan;

/// Renders a Markdown snapshot of `plan`'s run state and merge decisions.
#[must_use]
pub fn render(plan: &Plan, state: &ExecutionState, decisions: &BTreeMap<ItemName, MergeDecision>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Merge Train Snapshot");
    let _ = writeln!(out);
    let _ = writeln!(out, "Target branch: `{}`", plan.target);
    let _ = writeln!(out);
    let _ = writeln!(out, "| Item | Status | Eligible | Notes |");
    let _ = writeln!(out, "|---|---|---|---|");

    for item in &plan.items {
        let status = state.get_node_result(&item.name).map_or(NodeStatus::Pending, |node| node.status);
        let decision = decisions.get(&item.name);
        let eligible = decision.is_some_and(|decision| decision.eligible);
        let notes = decision.map(|decision| decision.reasons.join("; ")).unwrap_or_default();
        let _ = writeln!(out, "| {} | {status:?} | {} | {notes} |", item.name, if eligible { "yes" } else { "no" });
    }

    let _ = writeln!(out);
    let ready: Vec<&str> =
        decisions.values().filter(|decision| decision.eligible).map(|decision| decision.item.as_str()).collect();
    if ready.is_empty() {
        let _ = writeln!(out, "No items are currently eligible to merge.");
    } else {
        let _ = writeln!(out, "Ready to merge: {}", ready.join(", "));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Dependency levels");
    match mergegate_core::levelize(plan) {
        Ok(levels) => {
            for (index, level) in levels.as_slice().iter().enumerate() {
                let names = level.iter().map(ItemName::as_str).collect::<Vec<_>>().join(", ");
                let _ = writeln!(out);
                let _ = writeln!(out, "- Level {index}: {names}");
            }
        }
        Err(err) => {
            let _ = writeln!(out, "- unavailable: {err}");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Per-item gate summary");
    for item in &plan.items {
        let _ = writeln!(out);
        let _ = writeln!(out, "### {}", item.name);
        let Some(node) = state.get_node_result(&item.name) else {
            let _ = writeln!(out, "- no gates have run");
            continue;
        };
        if node.gates.is_empty() {
            let _ = writeln!(out, "- no gates declared");
            continue;
        }
        for gate in &item.gates {
            let Some(result) = node.gates.get(&gate.name) else {
                let _ = writeln!(out, "- `{}`: not yet run", gate.name);
                continue;
            };
            let marker = gate_marker(result.status);
            let _ = writeln!(out, "- `{}`: {marker} ({} attempt(s), {}ms)", gate.name, result.attempts, result.duration_ms);
        }
    }

    out
}

fn gate_marker(status: GateStatus) -> &'static str {
    match status {
        GateStatus::Passed => "pass",
        GateStatus::Failed => "fail",
        GateStatus::Skipped => "skipped",
        GateStatus::Blocked => "blocked",
        GateStatus::Retrying => "retrying",
    }
}
