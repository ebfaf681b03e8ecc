// crates/mergegate-core/src/errors.rs
// ============================================================================
// Module: Validation Errors
// Description: Schema, cycle, and unknown-dependency errors raised before
//              execution begins.
// Purpose: Give loaders and the dependency resolver a shared, structured
//          vocabulary for "this plan cannot be executed" failures.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! `ValidationError` is the sole error variant the engine may raise *before*
//! scheduling begins; every failure after that point is captured into a
//! result structure instead (see the propagation policy in the
//! specification's error handling section). Validation errors map to exit
//! class `2` for hosts that wrap the engine.

use crate::identifiers::ItemName;

/// A single structural or semantic issue found while loading a plan.
///
/// # Invariants
/// - `path` is a JSON-pointer-style location (e.g. `items[2].gates[0].name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// Location of the issue within the plan document.
    pub path: String,
    /// Human-readable description of the issue.
    pub message: String,
}

impl SchemaIssue {
    /// Creates a new schema issue.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

/// Errors raised while validating a plan, before execution begins.
///
/// # Invariants
/// - This is the only error the engine surfaces by returning `Err` rather
///   than capturing into a result structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The plan document violated the schema (missing fields, unknown enum
    /// values, negative durations/attempts, duplicate item names, ...).
    #[error("plan schema violation: {} issue(s)", .issues.len())]
    Schema {
        /// Ordered list of issues found.
        issues: Vec<SchemaIssue>,
    },
    /// An item's `deps` entry did not resolve to another item in the plan.
    #[error("item {item} depends on unknown item {dependency}")]
    UnknownDependency {
        /// Item whose dependency could not be resolved.
        item: ItemName,
        /// The unresolved dependency name.
        dependency: String,
    },
    /// The dependency graph contains a cycle.
    #[error("dependency graph contains a cycle among: {}", format_cycle(.members))]
    Cycle {
        /// Items that remained unresolved (positive in-degree) after
        /// levelization, in ascending name order.
        members: Vec<ItemName>,
    },
}

fn format_cycle(members: &[ItemName]) -> String {
    members.iter().map(ItemName::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_reports_issue_count() {
        let err = ValidationError::Schema { issues: vec![SchemaIssue::new("items[0].name", "must not be empty")] };
        assert_eq!(err.to_string(), "plan schema violation: 1 issue(s)");
    }
}
