// crates/mergegate-orchestrator/src/orchestrator.rs
// ============================================================================
// Module: Orchestrator
// Description: Wires validation, dependency resolution, scheduling,
//              eligibility, and deliverables writing into one run.
// Purpose: The single entry point a host calls with a validated plan and
//          gets back a finished summary.
// Dependencies: mergegate-core, mergegate-exec, mergegate-sched,
//               mergegate-artifacts, tokio-util
// ============================================================================

//! ## Overview
//! [`run`] performs, in order: cycle detection (deferred from plan loading),
//! execution-state initialization, bounded scheduling of every item's gates,
//! eligibility evaluation under the plan's merge rule, and collection of
//! declared artifacts into the configured artifact directory. Nothing here
//! touches version control or a code forge; that boundary is documented,
//! not enforced, by [`mergegate_core::interfaces`].

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use mergegate_artifacts::DeliverablesWriter;
use mergegate_artifacts::Environment;
use mergegate_artifacts::ExecutionContext;
use mergegate_artifacts::Manifest;
use mergegate_artifacts::WriterError;
use mergegate_core::Clock;
use mergegate_core::DEFAULT_GATE_TIMEOUT_MS;
use mergegate_core::ExecutionState;
use mergegate_core::ItemName;
use mergegate_core::MergeDecision;
use mergegate_core::NodeResult;
use mergegate_core::Plan;
use mergegate_core::SystemClock;
use mergegate_core::ValidationError;
use mergegate_core::format_iso8601;
use mergegate_sched::RunMetrics;
use mergegate_sched::RunOutcome;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Version string recorded in every run's manifest, taken from this crate's
/// own package version at compile time.
const RUNNER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors raised while running a validated plan to completion.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The plan's dependency graph contains a cycle.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A deliverable could not be written.
    #[error(transparent)]
    Writer(#[from] WriterError),
}

/// Per-run configuration supplied by the host.
pub struct RunOptions {
    /// Working directory gates execute in when they do not declare their
    /// own `cwd`, and the root that declared artifact paths are resolved
    /// against.
    pub working_dir: PathBuf,
    /// Root directory deliverables (manifest, snapshot, collected
    /// artifacts) are written under.
    pub artifact_dir: PathBuf,
    /// Timeout applied to a gate when it does not declare its own.
    pub default_timeout_ms: u64,
    /// Cooperative cancellation token. Cancelling it stops new gates from
    /// starting and gives in-flight ones a bounded grace period to finish.
    pub cancel: CancellationToken,
    /// Source of the current time, injected so runs remain replayable.
    pub clock: Arc<dyn Clock>,
    /// The human or service account that initiated this run, when known.
    pub actor: Option<String>,
    /// An opaque identifier correlating this run with an upstream request.
    pub correlation_id: Option<String>,
    /// Path to the profile the host resolved before invoking this run, when
    /// one applies. Carried through to the manifest verbatim; the engine
    /// never resolves or interprets profiles itself.
    pub profile_path: Option<String>,
}

impl RunOptions {
    /// Builds run options rooted at `working_dir`, with an artifact
    /// directory of `working_dir/.mergegate`, the default gate timeout, a
    /// fresh cancellation token, and the system clock. The execution
    /// environment is inferred from the presence of a `CI` environment
    /// variable.
    #[must_use]
    pub fn new(working_dir: PathBuf) -> Self {
        let artifact_dir = working_dir.join(".mergegate");
        Self {
            working_dir,
            artifact_dir,
            default_timeout_ms: DEFAULT_GATE_TIMEOUT_MS,
            cancel: CancellationToken::new(),
            clock: Arc::new(SystemClock),
            actor: None,
            correlation_id: None,
            profile_path: None,
        }
    }

    fn environment(&self) -> Environment {
        if std::env::var_os("CI").is_some() { Environment::Ci } else { Environment::Local }
    }
}

/// The finished state of one run: per-item results, merge decisions, and
/// the deliverables manifest.
#[derive(Debug, Clone)]
pub struct Summary {
    /// Final per-item execution results.
    pub node_results: BTreeMap<ItemName, NodeResult>,
    /// Merge eligibility decision per item.
    pub decisions: BTreeMap<ItemName, MergeDecision>,
    /// Items eligible to merge, in plan order.
    pub ready_to_merge: Vec<ItemName>,
    /// Deliverables manifest written for this run.
    pub manifest: Manifest,
    /// Id of the timestamped run directory this run's deliverables were
    /// written under, and that `latest` now points at.
    pub run_id: String,
    /// True when the run stopped early due to cancellation rather than
    /// every item reaching a terminal status.
    pub cancelled: bool,
    /// Scheduling counters and timings collected over this run.
    pub metrics: RunMetrics,
}

/// Runs every item in `plan` to completion and writes its deliverables.
///
/// # Errors
///
/// Returns [`OrchestratorError::Validation`] when the plan's dependency
/// graph contains a cycle, or [`OrchestratorError::Writer`] when
/// deliverables cannot be written.
pub async fn run(plan: &Plan, options: RunOptions) -> Result<Summary, OrchestratorError> {
    let levels = mergegate_core::levelize(plan)?;
    let level_executed = u32::try_from(levels.as_slice().len()).unwrap_or(u32::MAX);

    let mut state = ExecutionState::new(plan);
    let working_dir = options.working_dir.to_string_lossy().into_owned();

    let (outcome, metrics) = mergegate_sched::run(
        plan,
        &mut state,
        Arc::clone(&options.clock),
        &working_dir,
        options.default_timeout_ms,
        options.cancel.clone(),
    )
    .await;
    tracing::info!(
        items_started = metrics.items_started,
        items_passed = metrics.items_passed,
        items_failed = metrics.items_failed,
        items_blocked = metrics.items_blocked,
        wall_time_ms = metrics.wall_time_ms,
        "scheduling pass finished"
    );

    let decisions = mergegate_core::evaluate_eligibility(plan, &state);
    let ready_to_merge = mergegate_core::ready_for_merge(plan, &decisions);

    let run_id = format_iso8601(options.clock.now()).unwrap_or_default().replace([':', '.'], "-");
    let mut writer = DeliverablesWriter::open(&options.artifact_dir, &run_id)?;

    let plan_hash = writer.write_plan(plan)?;
    let collected_artifacts = collect_declared_artifacts(plan, &state, &options.working_dir, &mut writer);
    for ((item_name, gate_name), paths) in &collected_artifacts {
        if let Some(mut result) = state.get_node_result(item_name).and_then(|node| node.gates.get(gate_name)).cloned() {
            result.artifacts = paths.clone();
            state.update_gate_result(item_name, result);
        }
    }
    for (item_name, node) in state.get_results() {
        for result in node.gates.values() {
            writer.write_gate_result(item_name, result)?;
        }
    }

    let snapshot = mergegate_artifacts::render_snapshot(plan, &state, &decisions);
    writer.write_snapshot(&snapshot)?;

    let execution_context = ExecutionContext {
        working_directory: working_dir,
        environment: options.environment(),
        actor: options.actor.clone(),
        correlation_id: options.correlation_id.clone(),
    };
    let timestamp = format_iso8601(options.clock.now()).unwrap_or_default();
    let manifest = writer.write_manifest(
        timestamp,
        plan_hash,
        RUNNER_VERSION.to_string(),
        level_executed,
        options.profile_path.clone(),
        execution_context,
    )?;
    let run_id = writer.run_id().to_string();
    writer.finalize()?;

    Ok(Summary {
        node_results: state.get_results().clone(),
        decisions,
        ready_to_merge,
        manifest,
        run_id,
        cancelled: matches!(outcome, RunOutcome::Cancelled),
        metrics,
    })
}

/// Copies every gate's declared artifact paths into the run's artifact
/// sandbox, returning the absolute destination path of each file actually
/// collected, keyed by `(item, gate)`. Missing source paths are skipped with
/// a warning rather than failing the run, per the gate executor's contract.
fn collect_declared_artifacts(
    plan: &Plan,
    state: &ExecutionState,
    working_dir: &Path,
    writer: &mut DeliverablesWriter,
) -> BTreeMap<(ItemName, mergegate_core::GateName), Vec<String>> {
    let mut collected: BTreeMap<(ItemName, mergegate_core::GateName), Vec<String>> = BTreeMap::new();
    for item in &plan.items {
        let Some(node) = state.get_node_result(&item.name) else {
            continue;
        };
        for gate in &item.gates {
            if gate.artifacts.is_empty() {
                continue;
            }
            if !node.gates.contains_key(&gate.name) {
                continue;
            }
            for declared_path in &gate.artifacts {
                let source = working_dir.join(declared_path);
                let Ok(bytes) = std::fs::read(&source) else {
                    tracing::warn!(item = %item.name, gate = %gate.name, path = %declared_path, "declared artifact not found, skipping");
                    continue;
                };
                let destination = format!("artifacts/{}/{}/{declared_path}", item.name, gate.name);
                if let Err(err) = writer.write_artifact(&item.name, &gate.name, &destination, &bytes) {
                    tracing::warn!(item = %item.name, gate = %gate.name, error = %err, "failed to collect artifact");
                    continue;
                }
                let absolute = writer.run_root().join(&destination).to_string_lossy().into_owned();
                collected.entry((item.name.clone(), gate.name.clone())).or_default().push(absolute);
            }
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_artifact(tempdir: &Path) -> Plan {
        std::fs::write(tempdir.join("report.txt"), b"ok").expect("write fixture artifact");
        let json = format!(
            r#"{{"items":[{{"deps":[],"gates":[{{"artifacts":["report.txt"],"name":"tests","run":"exit 0"}}],"name":"a"}}],"schemaVersion":"1.0.0","target":"main"}}"#
        );
        mergegate_core::load_plan(json.as_bytes()).expect("valid plan")
    }

    #[tokio::test]
    async fn runs_plan_and_writes_deliverables() {
        let working = tempfile::tempdir().expect("tempdir");
        let plan = plan_with_artifact(working.path());
        let mut options = RunOptions::new(working.path().to_path_buf());
        options.artifact_dir = working.path().join("artifacts");

        let summary = run(&plan, options).await.expect("run succeeds");
        assert!(!summary.cancelled);
        assert_eq!(summary.ready_to_merge.len(), 1);
        assert_eq!(summary.metrics.items_started, 1);
        assert_eq!(summary.metrics.items_passed, 1);
        // plan.json + one gate result + one collected artifact + snapshot.md
        assert_eq!(summary.manifest.artifacts.len(), 4);

        let run_dir = working.path().join("artifacts").join(&summary.run_id);
        assert!(run_dir.join("plan.json").exists());
        assert!(run_dir.join("results/a/tests.json").exists());
        assert!(run_dir.join("manifest.json").exists());
        assert!(run_dir.join("snapshot.md").exists());

        let gate_result_json = std::fs::read_to_string(run_dir.join("results/a/tests.json")).expect("read gate result");
        assert!(gate_result_json.contains("report.txt"), "collected artifact path should be recorded on the gate result");
        let a = ItemName::new("a").expect("valid");
        let recorded = &summary.node_results[&a].gates[&mergegate_core::GateName::new("tests").expect("valid")];
        assert_eq!(recorded.artifacts.len(), 1);
        assert!(Path::new(&recorded.artifacts[0]).is_absolute());

        let latest = std::fs::read_to_string(working.path().join("artifacts/latest")).expect("read latest");
        assert_eq!(latest, summary.run_id);
    }

    #[tokio::test]
    async fn cyclic_plan_is_rejected_before_scheduling() {
        let json = r#"{"items":[
            {"deps":["b"],"gates":[],"name":"a"},
            {"deps":["a"],"gates":[],"name":"b"}
        ],"schemaVersion":"1.0.0","target":"main"}"#;
        let plan = mergegate_core::load_plan(json.as_bytes()).expect("valid plan");
        let working = tempfile::tempdir().expect("tempdir");
        let mut options = RunOptions::new(working.path().to_path_buf());
        options.artifact_dir = working.path().join("artifacts");

        let err = run(&plan, options).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(ValidationError::Cycle { .. })));
    }
}
