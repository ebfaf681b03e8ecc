// crates/mergegate-exec/src/retry.rs
// ============================================================================
// Module: Retry / Policy Wrapper
// Description: Wraps a single gate attempt with administrative blocking,
//              retry-with-backoff, and failure classification.
// Purpose: Turn policy-level retry configuration into a finished
//          `GateResult`.
// Dependencies: mergegate-core, crate::executor, tokio, tracing
// ============================================================================

//! ## Overview
//! [`run_gate`] is the only entry point the scheduler calls. It applies,
//! in order: the administrative block list (`policy.blockOn`), then repeated
//! attempts via [`crate::executor::execute_once`] governed by the gate's
//! configured [`RetryConfig`], classifying each failure with
//! [`mergegate_core::classify`] and stopping early on a disposition the
//! classifier marks as permanent.

use mergegate_core::Clock;
use mergegate_core::Disposition;
use mergegate_core::Gate;
use mergegate_core::GateResult;
use mergegate_core::GateStatus;
use mergegate_core::Policy;
use mergegate_core::classify;
use mergegate_core::format_iso8601;
use tokio_util::sync::CancellationToken;

use crate::executor::GateOutcome;
use crate::executor::execute_once;

/// Runs `gate` to completion, applying administrative blocking and the
/// policy's retry configuration, and returns the finished [`GateResult`].
/// `cancel` is forwarded to every attempt and also short-circuits the
/// between-attempt backoff sleep.
pub async fn run_gate(
    gate: &Gate,
    policy: &Policy,
    cwd: &str,
    default_timeout_ms: u64,
    clock: &dyn Clock,
    cancel: &CancellationToken,
) -> GateResult {
    let started_at_instant = clock.now();
    let started_at = format_iso8601(started_at_instant).unwrap_or_default();

    if policy.is_blocked(gate.name.as_str()) {
        tracing::warn!(gate = %gate.name, "gate administratively blocked by policy.blockOn");
        let finished_at = format_iso8601(clock.now()).unwrap_or_default();
        return GateResult {
            gate: gate.name.clone(),
            status: GateStatus::Blocked,
            attempts: 0,
            started_at,
            finished_at,
            duration_ms: 0,
            exit_code: None,
            stdout_tail: String::new(),
            stderr_tail: "gate blocked by administrative policy".to_string(),
            artifacts: Vec::new(),
        };
    }

    let retry = policy.retry_for(gate.name.as_str());
    let max_attempts = retry.max_attempts.max(1);

    let mut last_outcome: Option<GateOutcome> = None;
    let mut attempts_made = 0;

    for attempt in 1..=max_attempts {
        attempts_made = attempt;
        let outcome = execute_once(gate, cwd, default_timeout_ms, cancel).await;

        if matches!(outcome.status, GateStatus::Passed) {
            last_outcome = Some(outcome);
            break;
        }

        if cancel.is_cancelled() {
            last_outcome = Some(outcome);
            break;
        }

        let classification = classify(&outcome.stderr_tail, gate.name.as_str());
        tracing::info!(
            gate = %gate.name,
            attempt,
            max_attempts,
            disposition = ?classification.kind,
            severity = ?classification.severity,
            code = %classification.code,
            "gate attempt failed"
        );

        let will_retry = attempt < max_attempts && !matches!(classification.kind, Disposition::Permanent);
        last_outcome = Some(outcome);

        if !will_retry {
            break;
        }

        if retry.backoff_seconds > 0.0 {
            tokio::select! {
                () = tokio::time::sleep(std::time::Duration::from_secs_f64(retry.backoff_seconds)) => {}
                () = cancel.cancelled() => break,
            }
        }
    }

    let outcome = last_outcome.unwrap_or(GateOutcome {
        status: GateStatus::Failed,
        exit_code: None,
        stdout_tail: String::new(),
        stderr_tail: "gate never attempted".to_string(),
        duration: std::time::Duration::ZERO,
        notices: Vec::new(),
    });

    let finished_at = format_iso8601(clock.now()).unwrap_or_default();

    GateResult {
        gate: gate.name.clone(),
        status: outcome.status,
        attempts: attempts_made,
        started_at,
        finished_at,
        duration_ms: u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX),
        exit_code: outcome.exit_code,
        stdout_tail: outcome.stdout_tail,
        stderr_tail: outcome.stderr_tail,
        artifacts: gate.artifacts.clone(),
    }
}

#[cfg(test)]
mod tests {
    use mergegate_core::GateName;
    use mergegate_core::GateRuntime;
    use mergegate_core::SystemClock;
    use std::collections::BTreeMap;

    use super::*;

    fn gate(run: &str, name: &str) -> Gate {
        Gate {
            name: GateName::new(name).expect("valid"),
            run: run.to_string(),
            cwd: None,
            env: BTreeMap::new(),
            runtime: GateRuntime::Local,
            timeout_ms: None,
            artifacts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn passing_gate_uses_one_attempt() {
        let policy = Policy::default();
        let clock = SystemClock;
        let cancel = CancellationToken::new();
        let result = run_gate(&gate("exit 0", "tests"), &policy, ".", 5_000, &clock, &cancel).await;
        assert_eq!(result.status, GateStatus::Passed);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn permanent_failure_does_not_retry() {
        let mut policy = Policy::default();
        policy.retries.insert("tests".to_string(), mergegate_core::RetryConfig { max_attempts: 3, backoff_seconds: 0.0 });
        let clock = SystemClock;
        let cancel = CancellationToken::new();
        let result = run_gate(&gate("echo 'syntax error' 1>&2; exit 1", "tests"), &policy, ".", 5_000, &clock, &cancel).await;
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn transient_failure_retries_until_budget_exhausted() {
        let mut policy = Policy::default();
        policy.retries.insert("tests".to_string(), mergegate_core::RetryConfig { max_attempts: 3, backoff_seconds: 0.0 });
        let clock = SystemClock;
        let cancel = CancellationToken::new();
        let result = run_gate(&gate("echo 'connection reset' 1>&2; exit 1", "tests"), &policy, ".", 5_000, &clock, &cancel).await;
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn unknown_failure_still_retries() {
        let mut policy = Policy::default();
        policy.retries.insert("tests".to_string(), mergegate_core::RetryConfig { max_attempts: 3, backoff_seconds: 0.0 });
        let clock = SystemClock;
        let cancel = CancellationToken::new();
        let result = run_gate(&gate("echo 'gremlins ate the build' 1>&2; exit 1", "tests"), &policy, ".", 5_000, &clock, &cancel).await;
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn blocked_gate_never_executes() {
        let mut policy = Policy::default();
        policy.block_on.push("tests".to_string());
        let clock = SystemClock;
        let cancel = CancellationToken::new();
        let result = run_gate(&gate("exit 0", "tests"), &policy, ".", 5_000, &clock, &cancel).await;
        assert_eq!(result.status, GateStatus::Blocked);
        assert_eq!(result.attempts, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_the_retry_loop_without_a_further_attempt() {
        let mut policy = Policy::default();
        policy.retries.insert("tests".to_string(), mergegate_core::RetryConfig { max_attempts: 5, backoff_seconds: 5.0 });
        let clock = SystemClock;
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            child.cancel();
        });
        let result = run_gate(&gate("echo 'connection reset' 1>&2; exit 1", "tests"), &policy, ".", 5_000, &clock, &cancel).await;
        assert_eq!(result.status, GateStatus::Failed);
        assert!(result.attempts < 5);
    }
}
