// crates/mergegate-sched/src/scheduler.rs
// ============================================================================
// Module: Bounded Worker-Pool Scheduler
// Description: Drives execution state forward by running ready items under a
//              fixed concurrency cap, with cooperative cancellation.
// Purpose: Keep at most `policy.maxWorkers` gates in flight across the whole
//          run while respecting the dependency graph and propagating
//          blocked status as items fail.
// Dependencies: mergegate-core, mergegate-exec, tokio, tokio-util, tracing
// ============================================================================

//! ## Overview
//! The scheduler never computes levels itself; it repeatedly asks
//! [`mergegate_core::ExecutionState`] which items are ready (pending, with
//! every dependency already `Passed`) and spawns one task per ready item,
//! bounded by a [`tokio::sync::Semaphore`] sized to `policy.maxWorkers`.
//! Completions flow back over an [`tokio::sync::mpsc`] channel so the main
//! loop can update state and re-evaluate readiness without any task holding
//! a lock on it. Cancellation is cooperative: once the supplied
//! [`tokio_util::sync::CancellationToken`] fires, no new items are started
//! and in-flight ones are given a bounded grace period to finish before the
//! run is reported incomplete.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use mergegate_core::Clock;
use mergegate_core::ExecutionState;
use mergegate_core::GateResult;
use mergegate_core::GateStatus;
use mergegate_core::ItemName;
use mergegate_core::NodeStatus;
use mergegate_core::Plan;
use tokio::sync::Semaphore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How long the scheduler waits for in-flight work to drain after
/// cancellation before giving up on it.
const CANCELLATION_DRAIN: Duration = Duration::from_secs(10);

/// Outcome of a completed scheduling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every item reached a terminal status.
    Completed,
    /// The cancellation token fired before every item reached a terminal
    /// status, and the drain grace period elapsed with work still pending.
    Cancelled,
}

/// Dependency-light counters and timings collected over one scheduling run.
///
/// This intentionally stays a plain struct rather than pulling in a metrics
/// crate: callers that want a Prometheus/OpenTelemetry surface can export
/// these fields however they like, the same way the wider system keeps
/// telemetry decoupled from any specific backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunMetrics {
    /// Number of items the scheduler started (spawned a worker task for).
    pub items_started: u32,
    /// Number of items that reached `Passed`.
    pub items_passed: u32,
    /// Number of items that reached `Failed`.
    pub items_failed: u32,
    /// Number of items that reached `Blocked`.
    pub items_blocked: u32,
    /// Wall-clock duration of the scheduling loop, in milliseconds.
    pub wall_time_ms: u64,
}

/// Runs every item in `plan` to a terminal status, mutating `state` in
/// place, under a concurrency cap of `plan.policy.maxWorkers`.
pub async fn run(
    plan: &Plan,
    state: &mut ExecutionState,
    clock: Arc<dyn Clock>,
    cwd: &str,
    default_timeout_ms: u64,
    cancel: CancellationToken,
) -> (RunOutcome, RunMetrics) {
    let semaphore = Arc::new(Semaphore::new(usize::try_from(plan.policy.max_workers).unwrap_or(1).max(1)));
    let (tx, mut rx) = mpsc::channel::<(ItemName, Vec<GateResult>)>(plan.items.len().max(1));
    let mut in_flight: BTreeSet<ItemName> = BTreeSet::new();
    let mut metrics = RunMetrics::default();
    let loop_started = std::time::Instant::now();

    let outcome = loop {
        if !cancel.is_cancelled() {
            let spawned = spawn_ready_items(plan, state, &semaphore, &clock, cwd, default_timeout_ms, &cancel, &tx, &mut in_flight);
            metrics.items_started += spawned;
        }

        if state.is_execution_complete() {
            break RunOutcome::Completed;
        }

        if cancel.is_cancelled() && in_flight.is_empty() {
            tracing::info!(in_flight = 0, "scheduler cancelled with nothing left to drain");
            break RunOutcome::Cancelled;
        }

        let received = if cancel.is_cancelled() {
            match tokio::time::timeout(CANCELLATION_DRAIN, rx.recv()).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(in_flight = in_flight.len(), "cancellation drain window elapsed with work still pending");
                    break RunOutcome::Cancelled;
                }
            }
        } else {
            rx.recv().await
        };

        match received {
            Some((item, gate_results)) => {
                in_flight.remove(&item);
                for gate_result in gate_results {
                    state.update_gate_result(&item, gate_result);
                }
                state.propagate_blocked_status();
                if let Some(node) = state.get_node_result(&item) {
                    tracing::info!(item = %item, status = ?node.status, "item reached a terminal status");
                }
            }
            None => {
                break if state.is_execution_complete() { RunOutcome::Completed } else { RunOutcome::Cancelled };
            }
        }
    };

    for node in state.get_results().values() {
        match node.status {
            NodeStatus::Passed => metrics.items_passed += 1,
            NodeStatus::Failed => metrics.items_failed += 1,
            NodeStatus::Blocked => metrics.items_blocked += 1,
            NodeStatus::Pending | NodeStatus::Running | NodeStatus::Retrying => {}
        }
    }
    metrics.wall_time_ms = u64::try_from(loop_started.elapsed().as_millis()).unwrap_or(u64::MAX);
    (outcome, metrics)
}

#[allow(clippy::too_many_arguments, reason = "internal helper threading the scheduler's full context through one spawn site")]
fn spawn_ready_items(
    plan: &Plan,
    state: &mut ExecutionState,
    semaphore: &Arc<Semaphore>,
    clock: &Arc<dyn Clock>,
    cwd: &str,
    default_timeout_ms: u64,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<(ItemName, Vec<GateResult>)>,
    in_flight: &mut BTreeSet<ItemName>,
) -> u32 {
    let ready: Vec<ItemName> = plan
        .items
        .iter()
        .map(|item| &item.name)
        .filter(|name| is_ready(state, name, in_flight))
        .cloned()
        .collect();

    let mut spawned = 0u32;

    for name in ready {
        let Some(item) = plan.items.iter().find(|item| item.name == name) else {
            continue;
        };

        in_flight.insert(name.clone());
        state.mark_running(&name);
        tracing::info!(item = %name, gate_count = item.gates.len(), "spawning item for execution");
        spawned += 1;

        let gates = item.gates.clone();
        let policy = plan.policy.clone();
        let cwd = cwd.to_string();
        let permit = Arc::clone(semaphore);
        let clock = Arc::clone(clock);
        let cancel = cancel.clone();
        let tx = tx.clone();
        let item_name = name.clone();

        tokio::spawn(async move {
            let Ok(_permit) = permit.acquire_owned().await else {
                return;
            };

            let mut results = Vec::with_capacity(gates.len());
            for gate in &gates {
                if cancel.is_cancelled() {
                    break;
                }
                let result = mergegate_exec::run_gate(gate, &policy, &cwd, default_timeout_ms, clock.as_ref(), &cancel).await;
                let failed = matches!(result.status, GateStatus::Failed | GateStatus::Blocked);
                results.push(result);
                if failed {
                    break;
                }
            }

            let _ = tx.send((item_name, results)).await;
        });
    }

    spawned
}

fn is_ready(state: &ExecutionState, name: &ItemName, in_flight: &BTreeSet<ItemName>) -> bool {
    if in_flight.contains(name) {
        return false;
    }
    let Some(node) = state.get_node_result(name) else {
        return false;
    };
    if node.status != NodeStatus::Pending {
        return false;
    }
    state.deps_of(name).iter().all(|dep| state.get_node_result(dep).is_some_and(|dep_node| dep_node.status == NodeStatus::Passed))
}
