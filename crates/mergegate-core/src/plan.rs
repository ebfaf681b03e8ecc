// crates/mergegate-core/src/plan.rs
// ============================================================================
// Module: Plan Schema & Loader
// Description: Plan, Item, Gate, and Policy types plus structural/semantic
//              validation of plan bytes.
// Purpose: Turn untrusted plan JSON into a validated, immutable plan value.
// Dependencies: crate::errors, crate::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Plan`] is the engine's sole input. It is parsed once, validated once,
//! and never mutated for the duration of a run. Validation happens in two
//! stages: structural/semantic checks live here ([`load_plan`]); cycle
//! detection lives in [`crate::resolver`] since it requires the full
//! dependency graph. Both stages raise [`ValidationError`], the only error
//! variant the engine returns rather than captures into a result structure.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::errors::SchemaIssue;
use crate::errors::ValidationError;
use crate::identifiers::GateName;
use crate::identifiers::ItemName;

/// Current schema version this loader accepts.
pub const SCHEMA_VERSION: &str = "1.0.0";

// ============================================================================
// SECTION: Plan
// ============================================================================

/// A fully validated, immutable plan: the engine's sole input.
///
/// # Invariants
/// - `items` names are unique.
/// - Every `dep` in every item resolves to another item in `items`.
/// - The dependency graph formed by `deps` is acyclic (checked by
///   [`crate::resolver::levelize`], not by this type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Semver-like schema version, currently `"1.0.0"`.
    pub schema_version: String,
    /// Target branch name. Opaque to the engine.
    pub target: String,
    /// Ordered sequence of items.
    pub items: Vec<Item>,
    /// Policy governing required gates, concurrency, retries, and overrides.
    #[serde(default)]
    pub policy: Policy,
}

/// A unit of work (a change-set) named uniquely within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique name within the plan.
    pub name: ItemName,
    /// Names of items this item depends on.
    #[serde(default)]
    pub deps: BTreeSet<String>,
    /// Verification gates, in declared order.
    #[serde(default)]
    pub gates: Vec<Gate>,
}

/// Runtime backend a gate is declared to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateRuntime {
    /// Runs via a local shell subprocess. Fully implemented.
    Local,
    /// Degrades to `local` with a recorded warning.
    Container,
    /// Degrades to `status=skipped` with an informative stderr line.
    CiService,
}

/// A verification command attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gate {
    /// Name, unique within the item.
    pub name: GateName,
    /// Shell-invocable command string.
    pub run: String,
    /// Working directory. Defaults to the engine's process working directory.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Environment overlay merged on top of the inherited process environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Declared runtime backend.
    #[serde(default = "default_runtime")]
    pub runtime: GateRuntime,
    /// Timeout in milliseconds. `None` defers to the engine-wide default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Filesystem paths to collect as artifacts after execution.
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl Gate {
    /// Returns the effective timeout, falling back to `default_timeout_ms`
    /// when the gate does not declare its own.
    #[must_use]
    pub fn effective_timeout_ms(&self, default_timeout_ms: u64) -> u64 {
        self.timeout_ms.unwrap_or(default_timeout_ms)
    }
}

const fn default_runtime() -> GateRuntime {
    GateRuntime::Local
}

/// Engine-wide default gate timeout, used when neither the gate nor the
/// orchestrator caller supplies one.
pub const DEFAULT_GATE_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Retry configuration for a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum attempts, at least 1.
    pub max_attempts: u32,
    /// Backoff between attempts, in wall-clock seconds. No jitter.
    pub backoff_seconds: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 1, backoff_seconds: 0.0 }
    }
}

/// Administrative-green override configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminGreenOverride {
    /// Users authorized to request an override. `None` permits any requester.
    #[serde(default)]
    pub allowed_users: Option<Vec<String>>,
    /// Whether a non-empty reason is required to accept an override request.
    #[serde(default)]
    pub require_reason: bool,
}

/// Override configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    /// Administrative-green override, when configured.
    #[serde(default)]
    pub admin_green: Option<AdminGreenOverride>,
}

/// Merge rule. Only `strict-required` is currently defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MergeRule {
    /// All required gates must pass and no dependency may be failed/blocked.
    StrictRequired,
}

impl Default for MergeRule {
    fn default() -> Self {
        Self::StrictRequired
    }
}

/// Policy governing required gates, concurrency, retries, and eligibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Gate names that must pass globally, in addition to any gate an item
    /// declares on itself.
    #[serde(default)]
    pub required_gates: Vec<String>,
    /// Gate names whose failure does not block the node.
    #[serde(default)]
    pub optional_gates: Vec<String>,
    /// Maximum number of gates in flight across the whole run.
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
    /// Per-gate retry configuration, keyed by gate name.
    #[serde(default)]
    pub retries: BTreeMap<String, RetryConfig>,
    /// Override configuration.
    #[serde(default)]
    pub overrides: Overrides,
    /// Substrings that administratively block a gate before execution.
    #[serde(default)]
    pub block_on: Vec<String>,
    /// Merge eligibility rule.
    #[serde(default)]
    pub merge_rule: MergeRule,
}

const fn default_max_workers() -> u32 {
    1
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            required_gates: Vec::new(),
            optional_gates: Vec::new(),
            max_workers: default_max_workers(),
            retries: BTreeMap::new(),
            overrides: Overrides::default(),
            block_on: Vec::new(),
            merge_rule: MergeRule::default(),
        }
    }
}

impl Policy {
    /// Returns the retry configuration for `gate_name`, or the default
    /// (single attempt, no backoff) when none is configured.
    #[must_use]
    pub fn retry_for(&self, gate_name: &str) -> RetryConfig {
        self.retries.get(gate_name).copied().unwrap_or_default()
    }

    /// Returns true when `gate_name` is administratively blocked.
    #[must_use]
    pub fn is_blocked(&self, gate_name: &str) -> bool {
        self.block_on.iter().any(|substring| gate_name.contains(substring.as_str()))
    }
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Parses and structurally/semantically validates plan bytes.
///
/// This performs every check in the specification's loader contract except
/// cycle detection, which requires the full dependency graph and is
/// performed by [`crate::resolver::levelize`].
///
/// # Errors
///
/// Returns [`ValidationError::Schema`] when the document is malformed or
/// fails structural/semantic checks, or [`ValidationError::UnknownDependency`]
/// when an item's `deps` entry does not resolve.
pub fn load_plan(bytes: &[u8]) -> Result<Plan, ValidationError> {
    let plan: Plan = serde_json::from_slice(bytes)
        .map_err(|err| ValidationError::Schema { issues: vec![SchemaIssue::new("$", err.to_string())] })?;

    let issues = structural_issues(&plan);
    if !issues.is_empty() {
        return Err(ValidationError::Schema { issues });
    }

    check_unknown_dependencies(&plan)?;
    Ok(plan)
}

fn structural_issues(plan: &Plan) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    if plan.schema_version != SCHEMA_VERSION {
        issues.push(SchemaIssue::new(
            "schemaVersion",
            format!("unsupported schema version {:?}, expected {SCHEMA_VERSION:?}", plan.schema_version),
        ));
    }
    if plan.items.is_empty() {
        issues.push(SchemaIssue::new("items", "plan must declare at least one item"));
    }

    let mut seen_names = BTreeSet::new();
    for (item_index, item) in plan.items.iter().enumerate() {
        let item_path = format!("items[{item_index}]");
        if !seen_names.insert(item.name.as_str()) {
            issues.push(SchemaIssue::new(format!("{item_path}.name"), format!("duplicate item name {}", item.name)));
        }

        let mut seen_gate_names = BTreeSet::new();
        for (gate_index, gate) in item.gates.iter().enumerate() {
            let gate_path = format!("{item_path}.gates[{gate_index}]");
            if !seen_gate_names.insert(gate.name.as_str()) {
                issues.push(SchemaIssue::new(format!("{gate_path}.name"), format!("duplicate gate name {}", gate.name)));
            }
            if gate.run.trim().is_empty() {
                issues.push(SchemaIssue::new(format!("{gate_path}.run"), "gate run command must not be empty"));
            }
            if let Some(timeout_ms) = gate.timeout_ms {
                if timeout_ms == 0 {
                    issues.push(SchemaIssue::new(format!("{gate_path}.timeoutMs"), "timeoutMs must be positive"));
                }
            }
        }
    }

    if plan.policy.max_workers == 0 {
        issues.push(SchemaIssue::new("policy.maxWorkers", "maxWorkers must be >= 1"));
    }
    for (gate_name, retry) in &plan.policy.retries {
        let path = format!("policy.retries[{gate_name:?}]");
        if retry.max_attempts == 0 {
            issues.push(SchemaIssue::new(format!("{path}.maxAttempts"), "maxAttempts must be >= 1"));
        }
        if retry.backoff_seconds < 0.0 {
            issues.push(SchemaIssue::new(format!("{path}.backoffSeconds"), "backoffSeconds must be >= 0"));
        }
    }
    issues
}

fn check_unknown_dependencies(plan: &Plan) -> Result<(), ValidationError> {
    let known: BTreeSet<&str> = plan.items.iter().map(|item| item.name.as_str()).collect();
    for item in &plan.items {
        for dep in &item.deps {
            if !known.contains(dep.as_str()) {
                return Err(ValidationError::UnknownDependency { item: item.name.clone(), dependency: dep.clone() });
            }
        }
    }
    Ok(())
}
