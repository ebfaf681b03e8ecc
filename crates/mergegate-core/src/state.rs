// crates/mergegate-core/src/state.rs
// ============================================================================
// Module: Execution State
// Description: The mutable, in-memory record of a single run: per-item node
//              results and blocked-status propagation.
// Purpose: Give the scheduler a single place to record gate outcomes and ask
//          "is this item still worth attempting".
// Dependencies: crate::identifiers, crate::plan, crate::results
// ============================================================================

//! ## Overview
//! `ExecutionState` owns one [`NodeResult`] per item and nothing else; it has
//! no knowledge of subprocesses, retries, or wall-clock time. The scheduler
//! drives it by calling [`ExecutionState::update_gate_result`] as gates
//! complete and [`ExecutionState::propagate_blocked_status`] after each
//! round, so that an item whose dependency just failed is marked
//! [`NodeStatus::Blocked`] before the scheduler ever considers starting it.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::identifiers::GateName;
use crate::identifiers::ItemName;
use crate::plan::Plan;
use crate::results::GateResult;
use crate::results::GateStatus;
use crate::results::NodeResult;
use crate::results::NodeStatus;

/// The mutable execution record for one run over a validated plan.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    nodes: BTreeMap<ItemName, NodeResult>,
    required_gates: BTreeMap<ItemName, BTreeSet<GateName>>,
    expected_gate_counts: BTreeMap<ItemName, usize>,
    deps: BTreeMap<ItemName, BTreeSet<ItemName>>,
    dependents: BTreeMap<ItemName, Vec<ItemName>>,
}

impl ExecutionState {
    /// Builds a fresh, all-pending execution state for `plan`.
    #[must_use]
    pub fn new(plan: &Plan) -> Self {
        let mut nodes = BTreeMap::new();
        let mut required_gates = BTreeMap::new();
        let mut expected_gate_counts = BTreeMap::new();
        let mut deps: BTreeMap<ItemName, BTreeSet<ItemName>> = BTreeMap::new();
        let mut dependents: BTreeMap<ItemName, Vec<ItemName>> = BTreeMap::new();

        let optional: BTreeSet<&str> = plan.policy.optional_gates.iter().map(String::as_str).collect();
        let global_required: BTreeSet<GateName> =
            plan.policy.required_gates.iter().filter_map(|name| GateName::new(name).ok()).collect();

        for item in &plan.items {
            nodes.insert(item.name.clone(), NodeResult::pending(item.name.clone()));
            expected_gate_counts.insert(item.name.clone(), item.gates.len());

            // required(item) = policy.requiredGates (global) ∪ declared gate names,
            // with optionalGates excluded since their failure never blocks the node.
            let required: BTreeSet<GateName> = item
                .gates
                .iter()
                .map(|gate| gate.name.clone())
                .chain(global_required.iter().cloned())
                .filter(|name| !optional.contains(name.as_str()))
                .collect();
            required_gates.insert(item.name.clone(), required);

            let item_deps: BTreeSet<ItemName> = item
                .deps
                .iter()
                .filter_map(|dep| plan.items.iter().find(|other| other.name.as_str() == dep).map(|other| other.name.clone()))
                .collect();
            for dep in &item_deps {
                dependents.entry(dep.clone()).or_default().push(item.name.clone());
            }
            deps.insert(item.name.clone(), item_deps);
        }

        Self { nodes, required_gates, expected_gate_counts, deps, dependents }
    }

    /// Marks an item as running. A no-op if the item is already running or
    /// terminal.
    pub fn mark_running(&mut self, item: &ItemName) {
        if let Some(node) = self.nodes.get_mut(item) {
            if matches!(node.status, NodeStatus::Pending) {
                node.status = NodeStatus::Running;
            }
        }
    }

    /// Records a gate's outcome for `item` and recomputes that item's
    /// aggregated status.
    pub fn update_gate_result(&mut self, item: &ItemName, result: GateResult) {
        let Some(node) = self.nodes.get_mut(item) else {
            return;
        };
        node.gates.insert(result.gate.clone(), result);
        self.recompute_status(item);
    }

    fn recompute_status(&mut self, item: &ItemName) {
        let Some(node) = self.nodes.get(item) else {
            return;
        };
        if matches!(node.status, NodeStatus::Blocked) {
            return;
        }

        let required = self.required_gates.get(item).cloned().unwrap_or_default();
        let expected = self.expected_gate_counts.get(item).copied().unwrap_or(0);

        let any_required_failed = required.iter().any(|gate_name| {
            node.gates
                .get(gate_name)
                .is_some_and(|result| matches!(result.status, GateStatus::Failed | GateStatus::Blocked))
        });
        // Every gate in `required` has a recorded, non-blocking terminal result. A
        // required gate this item never declares (only reachable through
        // policy.requiredGates) has no entry in `node.gates` and so is never
        // satisfied here, keeping the node non-terminal rather than falsely Passed.
        let required_satisfied = required.iter().all(|gate_name| {
            node.gates.get(gate_name).is_some_and(|result| matches!(result.status, GateStatus::Passed | GateStatus::Skipped))
        });

        let new_status = if any_required_failed {
            NodeStatus::Failed
        } else if node.gates.len() >= expected && required_satisfied {
            NodeStatus::Passed
        } else if node.gates.is_empty() {
            NodeStatus::Pending
        } else if node.has_retrying_gate() {
            NodeStatus::Retrying
        } else {
            NodeStatus::Running
        };

        if let Some(node) = self.nodes.get_mut(item) {
            node.status = new_status;
        }
    }

    /// Propagates [`NodeStatus::Blocked`] to every item whose dependency is
    /// [`NodeStatus::Failed`] or already [`NodeStatus::Blocked`]. Runs to a
    /// fixed point so that blocked status cascades transitively.
    pub fn propagate_blocked_status(&mut self) {
        loop {
            let mut changed = false;
            let blocking: BTreeSet<ItemName> = self
                .nodes
                .iter()
                .filter(|(_, node)| matches!(node.status, NodeStatus::Failed | NodeStatus::Blocked))
                .map(|(name, _)| name.clone())
                .collect();

            for (item, item_deps) in &self.deps {
                let blocking_deps: Vec<ItemName> = item_deps.iter().filter(|dep| blocking.contains(*dep)).cloned().collect();
                if !blocking_deps.is_empty() {
                    if let Some(node) = self.nodes.get_mut(item) {
                        if matches!(node.status, NodeStatus::Pending | NodeStatus::Running) {
                            node.status = NodeStatus::Blocked;
                            node.blocked_by = blocking_deps;
                            changed = true;
                        }
                    }
                }
            }

            if !changed {
                break;
            }
        }
    }

    /// Returns the node result for `item`, if it exists in this run.
    #[must_use]
    pub fn get_node_result(&self, item: &ItemName) -> Option<&NodeResult> {
        self.nodes.get(item)
    }

    /// Returns every node result, keyed by item name.
    #[must_use]
    pub fn get_results(&self) -> &BTreeMap<ItemName, NodeResult> {
        &self.nodes
    }

    /// Returns true once every item has reached a terminal status (`Passed`,
    /// `Failed`, or `Blocked`).
    #[must_use]
    pub fn is_execution_complete(&self) -> bool {
        self.nodes.values().all(|node| !matches!(node.status, NodeStatus::Pending | NodeStatus::Running | NodeStatus::Retrying))
    }

    /// Returns the direct dependents of `item`, used by the scheduler to
    /// decide which items to re-evaluate after one completes.
    #[must_use]
    pub fn dependents_of(&self, item: &ItemName) -> &[ItemName] {
        self.dependents.get(item).map_or(&[], Vec::as_slice)
    }

    /// Returns the direct dependencies of `item`.
    #[must_use]
    pub fn deps_of(&self, item: &ItemName) -> &BTreeSet<ItemName> {
        static EMPTY: BTreeSet<ItemName> = BTreeSet::new();
        self.deps.get(item).unwrap_or(&EMPTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::load_plan;

    fn gate_result(name: &str, status: GateStatus) -> GateResult {
        GateResult {
            gate: GateName::new(name).expect("valid"),
            status,
            attempts: 1,
            started_at: "2026-01-01T00:00:00Z".to_string(),
            finished_at: "2026-01-01T00:00:01Z".to_string(),
            duration_ms: 1000,
            exit_code: Some(0),
            stdout_tail: String::new(),
            stderr_tail: String::new(),
            artifacts: Vec::new(),
        }
    }

    fn diamond_plan() -> Plan {
        let json = r#"{"items":[
            {"deps":[],"gates":[{"name":"tests","run":"true"}],"name":"a"},
            {"deps":["a"],"gates":[{"name":"tests","run":"true"}],"name":"b"},
            {"deps":["a"],"gates":[{"name":"tests","run":"true"}],"name":"c"},
            {"deps":["b","c"],"gates":[{"name":"tests","run":"true"}],"name":"d"}
        ],"schemaVersion":"1.0.0","target":"main"}"#;
        load_plan(json.as_bytes()).expect("valid plan")
    }

    #[test]
    fn fresh_state_is_all_pending_and_incomplete() {
        let plan = diamond_plan();
        let state = ExecutionState::new(&plan);
        assert!(!state.is_execution_complete());
        for item in &plan.items {
            assert_eq!(state.get_node_result(&item.name).expect("exists").status, NodeStatus::Pending);
        }
    }

    #[test]
    fn passing_gate_marks_node_passed() {
        let plan = diamond_plan();
        let mut state = ExecutionState::new(&plan);
        let a = ItemName::new("a").expect("valid");
        state.update_gate_result(&a, gate_result("tests", GateStatus::Passed));
        assert_eq!(state.get_node_result(&a).expect("exists").status, NodeStatus::Passed);
    }

    #[test]
    fn failing_gate_blocks_dependents_transitively() {
        let plan = diamond_plan();
        let mut state = ExecutionState::new(&plan);
        let a = ItemName::new("a").expect("valid");
        state.update_gate_result(&a, gate_result("tests", GateStatus::Failed));
        assert_eq!(state.get_node_result(&a).expect("exists").status, NodeStatus::Failed);

        state.propagate_blocked_status();

        let b = ItemName::new("b").expect("valid");
        let c = ItemName::new("c").expect("valid");
        let d = ItemName::new("d").expect("valid");
        assert_eq!(state.get_node_result(&b).expect("exists").status, NodeStatus::Blocked);
        assert_eq!(state.get_node_result(&c).expect("exists").status, NodeStatus::Blocked);
        assert_eq!(state.get_node_result(&d).expect("exists").status, NodeStatus::Blocked);
        assert_eq!(state.get_node_result(&b).expect("exists").blocked_by, vec![a.clone()]);
        assert_eq!(state.get_node_result(&c).expect("exists").blocked_by, vec![a]);
        let mut d_blocked_by = state.get_node_result(&d).expect("exists").blocked_by.clone();
        d_blocked_by.sort();
        assert_eq!(d_blocked_by, vec![b, c]);
        assert!(state.is_execution_complete());
    }

    #[test]
    fn s2_diamond_with_one_failure_blocks_only_through_the_failing_edge() {
        let plan = diamond_plan();
        let mut state = ExecutionState::new(&plan);
        let a = ItemName::new("a").expect("valid");
        let b = ItemName::new("b").expect("valid");
        let c = ItemName::new("c").expect("valid");
        let d = ItemName::new("d").expect("valid");

        state.update_gate_result(&a, gate_result("tests", GateStatus::Passed));
        state.update_gate_result(&c, gate_result("tests", GateStatus::Passed));
        state.update_gate_result(&b, gate_result("tests", GateStatus::Failed));
        state.propagate_blocked_status();

        assert_eq!(state.get_node_result(&a).expect("exists").status, NodeStatus::Passed);
        assert_eq!(state.get_node_result(&c).expect("exists").status, NodeStatus::Passed);
        assert_eq!(state.get_node_result(&b).expect("exists").status, NodeStatus::Failed);
        assert_eq!(state.get_node_result(&d).expect("exists").status, NodeStatus::Blocked);
        assert_eq!(state.get_node_result(&d).expect("exists").blocked_by, vec![b]);
    }

    #[test]
    fn all_nodes_passing_completes_execution() {
        let plan = diamond_plan();
        let mut state = ExecutionState::new(&plan);
        for item in &plan.items {
            state.update_gate_result(&item.name, gate_result("tests", GateStatus::Passed));
        }
        state.propagate_blocked_status();
        assert!(state.is_execution_complete());
        assert!(state.get_results().values().all(|node| node.status == NodeStatus::Passed));
    }

    #[test]
    fn failing_optional_gate_still_reaches_a_terminal_status() {
        let json = r#"{"items":[
            {"deps":[],"gates":[{"name":"tests","run":"true"},{"name":"lint","run":"true"}],"name":"a"}
        ],"policy":{"optionalGates":["lint"]},"schemaVersion":"1.0.0","target":"main"}"#;
        let plan = load_plan(json.as_bytes()).expect("valid plan");
        let mut state = ExecutionState::new(&plan);
        let a = ItemName::new("a").expect("valid");

        state.update_gate_result(&a, gate_result("tests", GateStatus::Passed));
        state.update_gate_result(&a, gate_result("lint", GateStatus::Failed));

        let status = state.get_node_result(&a).expect("exists").status;
        assert_eq!(status, NodeStatus::Passed);
        assert!(state.is_execution_complete());
    }

    #[test]
    fn missing_global_required_gate_keeps_node_non_terminal() {
        let json = r#"{"items":[
            {"deps":[],"gates":[{"name":"tests","run":"true"}],"name":"a"}
        ],"policy":{"requiredGates":["security-scan"]},"schemaVersion":"1.0.0","target":"main"}"#;
        let plan = load_plan(json.as_bytes()).expect("valid plan");
        let mut state = ExecutionState::new(&plan);
        let a = ItemName::new("a").expect("valid");

        state.update_gate_result(&a, gate_result("tests", GateStatus::Passed));

        let status = state.get_node_result(&a).expect("exists").status;
        assert_ne!(status, NodeStatus::Passed);
        assert!(!state.is_execution_complete());
    }
}
