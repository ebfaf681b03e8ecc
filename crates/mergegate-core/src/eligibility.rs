// crates/mergegate-core/src/eligibility.rs
// ============================================================================
// Module: Merge Eligibility
// Description: Turns execution state into per-item merge decisions, and
//              implements the administrative-green override protocol.
// Purpose: Answer "which items may merge" without ever mutating execution
//          state itself.
// Dependencies: crate::identifiers, crate::plan, crate::results, crate::state
// ============================================================================

//! ## Overview
//! Eligibility is evaluated, never stored: [`evaluate`] is a pure function of
//! an [`ExecutionState`] and a [`Plan`]'s policy. The only currently defined
//! merge rule is `strict-required`: an item is eligible when every
//! policy-required gate it carries passed, none of its own gates failed or
//! were administratively blocked, and every dependency is itself eligible.
//! An administrative-green override can force an otherwise-ineligible item
//! eligible, but only through [`apply_admin_green_override`], which enforces
//! the requester allowlist and reason requirements declared in policy.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::identifiers::ItemName;
use crate::plan::Plan;
use crate::results::MergeDecision;
use crate::results::NodeStatus;
use crate::state::ExecutionState;

/// Errors raised while applying an administrative-green override request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverrideError {
    /// The plan's policy does not configure an `adminGreen` override at all.
    #[error("plan policy does not permit administrative-green overrides")]
    NotConfigured,
    /// The requester is not on the configured allowlist.
    #[error("requester {requester} is not authorized to request an override")]
    Unauthorized {
        /// The rejected requester.
        requester: String,
    },
    /// Policy requires a non-empty reason and none was supplied.
    #[error("an override reason is required")]
    ReasonRequired,
    /// The named item does not exist in this run.
    #[error("item {item} is not part of this run")]
    UnknownItem {
        /// The unrecognized item name.
        item: String,
    },
}

/// Evaluates merge eligibility for every item in `state` under `plan`'s
/// policy. Items whose dependencies are themselves ineligible are always
/// ineligible, regardless of their own gate results.
#[must_use]
pub fn evaluate(plan: &Plan, state: &ExecutionState) -> BTreeMap<ItemName, MergeDecision> {
    let mut decisions = BTreeMap::new();
    for item in &plan.items {
        let decision = evaluate_one(plan, state, &item.name, &decisions);
        decisions.insert(item.name.clone(), decision);
    }
    decisions
}

fn evaluate_one(
    plan: &Plan,
    state: &ExecutionState,
    item_name: &ItemName,
    already_decided: &BTreeMap<ItemName, MergeDecision>,
) -> MergeDecision {
    let mut reasons = Vec::new();

    let Some(node) = state.get_node_result(item_name) else {
        return MergeDecision::ineligible(item_name.clone(), vec!["item has no execution record".to_string()], false, Vec::new());
    };

    if matches!(node.status, NodeStatus::Blocked) {
        return MergeDecision::ineligible(
            item_name.clone(),
            vec![format!("blocked by: {}", node.blocked_by.iter().map(ItemName::as_str).collect::<Vec<_>>().join(", "))],
            true,
            node.blocked_by.clone(),
        );
    }

    if matches!(node.status, NodeStatus::Failed) {
        let failed_gates: Vec<&str> = node
            .gates
            .values()
            .filter(|result| matches!(result.status, crate::results::GateStatus::Failed))
            .map(|result| result.gate.as_str())
            .collect();
        reasons.push(if failed_gates.is_empty() {
            "a required gate failed".to_string()
        } else {
            format!("failed gates: {}", failed_gates.join(", "))
        });
    }

    if node.status != NodeStatus::Passed && !matches!(node.status, NodeStatus::Failed | NodeStatus::Blocked) {
        reasons.push(format!("node status is {status:?}, not passed", status = node.status));
    }

    if let Some(item) = plan.items.iter().find(|item| &item.name == item_name) {
        for required_gate in &plan.policy.required_gates {
            let declared = item.gates.iter().any(|gate| gate.name.as_str() == required_gate);
            if !declared {
                reasons.push(format!("missing required gate {required_gate:?}"));
                continue;
            }
            let passed = node
                .gates
                .get(required_gate.as_str())
                .is_some_and(|result| result.status == crate::results::GateStatus::Passed);
            if !passed {
                reasons.push(format!("required gate {required_gate:?} did not pass"));
            }
        }
    }

    for dep in state.deps_of(item_name) {
        let dep_eligible = already_decided.get(dep).is_some_and(|decision| decision.eligible);
        if !dep_eligible {
            reasons.push(format!("dependency {dep} is not eligible"));
        }
    }

    if reasons.is_empty() {
        MergeDecision::eligible(item_name.clone())
    } else {
        let requires_override = matches!(node.status, NodeStatus::Failed);
        MergeDecision::ineligible(item_name.clone(), reasons, requires_override, Vec::new())
    }
}

/// Applies an administrative-green override request to an existing
/// decision, forcing it eligible when the request is authorized.
///
/// # Errors
///
/// Returns [`OverrideError`] when the policy does not configure overrides,
/// the requester is unauthorized, a required reason is missing, or the item
/// does not exist in `decisions`.
pub fn apply_admin_green_override(
    plan: &Plan,
    decisions: &mut BTreeMap<ItemName, MergeDecision>,
    item_name: &ItemName,
    requester: &str,
    reason: Option<&str>,
) -> Result<(), OverrideError> {
    let Some(admin_green) = &plan.policy.overrides.admin_green else {
        return Err(OverrideError::NotConfigured);
    };

    if let Some(allowed_users) = &admin_green.allowed_users {
        if !allowed_users.iter().any(|user| user == requester) {
            return Err(OverrideError::Unauthorized { requester: requester.to_string() });
        }
    }

    if admin_green.require_reason && reason.is_none_or(|reason| reason.trim().is_empty()) {
        return Err(OverrideError::ReasonRequired);
    }

    let Some(decision) = decisions.get_mut(item_name) else {
        return Err(OverrideError::UnknownItem { item: item_name.to_string() });
    };

    decision.eligible = true;
    decision.requires_override = false;
    decision.blocked_by = Vec::new();
    decision.reasons = vec![format!(
        "administrative-green override by {requester}{reason_suffix}",
        reason_suffix = reason.map(|reason| format!(": {reason}")).unwrap_or_default()
    )];
    Ok(())
}

/// Returns the subset of `decisions` that are eligible, preserving plan
/// order.
#[must_use]
pub fn ready_for_merge(plan: &Plan, decisions: &BTreeMap<ItemName, MergeDecision>) -> Vec<ItemName> {
    plan.items
        .iter()
        .map(|item| &item.name)
        .filter(|name| decisions.get(*name).is_some_and(|decision| decision.eligible))
        .cloned()
        .collect()
}
