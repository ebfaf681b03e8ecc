// crates/mergegate-exec/src/executor.rs
// ============================================================================
// Module: Gate Executor
// Description: Runs a single gate attempt as a subprocess with a bounded
//              timeout and output capture.
// Purpose: Turn a `Gate` declaration into one concrete pass/fail outcome.
// Dependencies: mergegate-core, tokio, tracing
// ============================================================================

//! ## Overview
//! [`execute_once`] runs exactly one attempt of one gate and never retries;
//! retry orchestration and administrative blocking live in
//! [`crate::retry`]. A `container` gate degrades to running locally with a
//! recorded notice rather than failing outright, since this workspace does
//! not carry a container runtime dependency. A `ci-service` gate never
//! spawns a subprocess at all; it is reported skipped immediately.

use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use mergegate_core::Gate;
use mergegate_core::GateRuntime;
use mergegate_core::GateStatus;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Maximum number of trailing bytes retained from a stream.
const MAX_OUTPUT_TAIL_BYTES: usize = 8192;

/// Outcome of a single gate execution attempt.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Resulting status. Never [`GateStatus::Blocked`]; that is assigned by
    /// the retry wrapper before an attempt is ever made.
    pub status: GateStatus,
    /// Process exit code, when the subprocess actually ran.
    pub exit_code: Option<i32>,
    /// Trailing captured stdout, truncated to [`MAX_OUTPUT_TAIL_BYTES`].
    pub stdout_tail: String,
    /// Trailing captured stderr, truncated to [`MAX_OUTPUT_TAIL_BYTES`].
    pub stderr_tail: String,
    /// Wall-clock duration of the attempt.
    pub duration: Duration,
    /// Non-fatal notices (for example, a `container` gate degrading to
    /// local execution).
    pub notices: Vec<String>,
}

/// Runs one attempt of `gate`, honoring its declared or inherited timeout.
///
/// `cwd` is the working directory to run in when the gate does not declare
/// its own. `default_timeout_ms` is used when the gate declares none.
/// `cancel` is checked for the life of the subprocess; firing it terminates
/// the child immediately rather than waiting on the gate's own timeout.
pub async fn execute_once(gate: &Gate, cwd: &str, default_timeout_ms: u64, cancel: &CancellationToken) -> GateOutcome {
    match gate.runtime {
        GateRuntime::CiService => {
            tracing::info!(gate = %gate.name, "gate declares ci-service runtime; skipping local execution");
            return GateOutcome {
                status: GateStatus::Skipped,
                exit_code: None,
                stdout_tail: String::new(),
                stderr_tail: "skipped: gate runtime \"ci-service\" has no local executor".to_string(),
                duration: Duration::ZERO,
                notices: vec!["runtime ci-service is not locally executable".to_string()],
            };
        }
        GateRuntime::Container => {
            tracing::warn!(gate = %gate.name, "gate declares container runtime; degrading to local execution");
            run_subprocess(gate, cwd, default_timeout_ms, vec!["runtime container degraded to local execution".to_string()], cancel).await
        }
        GateRuntime::Local => run_subprocess(gate, cwd, default_timeout_ms, Vec::new(), cancel).await,
    }
}

/// What interrupted the subprocess wait, if anything.
enum WaitOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

async fn run_subprocess(
    gate: &Gate,
    cwd: &str,
    default_timeout_ms: u64,
    notices: Vec<String>,
    cancel: &CancellationToken,
) -> GateOutcome {
    let timeout = Duration::from_millis(gate.effective_timeout_ms(default_timeout_ms));
    let started = Instant::now();

    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&gate.run)
        .current_dir(gate.cwd.as_deref().unwrap_or(cwd))
        .envs(&gate.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return GateOutcome {
                status: GateStatus::Failed,
                exit_code: None,
                stdout_tail: String::new(),
                stderr_tail: format!("failed to spawn gate process: {err}"),
                duration: started.elapsed(),
                notices,
            };
        }
    };

    let mut stdout_handle = child.stdout.take();
    let mut stderr_handle = child.stderr.take();

    let wait_outcome = tokio::select! {
        result = tokio::time::timeout(timeout, child.wait()) => {
            result.map_or(WaitOutcome::TimedOut, WaitOutcome::Exited)
        }
        () = cancel.cancelled() => WaitOutcome::Cancelled,
    };

    let (status, exit_code, annotation) = match wait_outcome {
        WaitOutcome::Exited(Ok(exit_status)) => (
            if exit_status.success() { GateStatus::Passed } else { GateStatus::Failed },
            exit_status.code(),
            None,
        ),
        WaitOutcome::Exited(Err(err)) => {
            tracing::error!(gate = %gate.name, error = %err, "gate subprocess wait failed");
            (GateStatus::Failed, None, None)
        }
        WaitOutcome::TimedOut => {
            tracing::warn!(gate = %gate.name, timeout_ms = timeout.as_millis(), "gate exceeded timeout; terminating");
            let _ = child.start_kill();
            let _ = child.wait().await;
            (GateStatus::Failed, None, Some(format!("gate killed after exceeding {}ms timeout", timeout.as_millis())))
        }
        WaitOutcome::Cancelled => {
            tracing::warn!(gate = %gate.name, "run cancelled; terminating gate subprocess");
            let _ = child.start_kill();
            let _ = child.wait().await;
            (GateStatus::Failed, None, Some("gate killed: run was cancelled".to_string()))
        }
    };

    let stdout_tail = read_tail(stdout_handle.as_mut()).await;
    let mut stderr_tail = read_tail(stderr_handle.as_mut()).await;
    if let Some(note) = annotation {
        stderr_tail.push('\n');
        stderr_tail.push_str(&note);
    }

    GateOutcome { status, exit_code, stdout_tail, stderr_tail, duration: started.elapsed(), notices }
}

async fn read_tail(handle: Option<&mut (impl AsyncReadExt + Unpin)>) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    let mut buffer = Vec::new();
    if handle.read_to_end(&mut buffer).await.is_err() {
        return String::new();
    }
    let start = buffer.len().saturating_sub(MAX_OUTPUT_TAIL_BYTES);
    String::from_utf8_lossy(&buffer[start..]).into_owned()
}

#[cfg(test)]
mod tests {
    use mergegate_core::GateName;

    use super::*;

    fn gate(run: &str) -> Gate {
        Gate {
            name: GateName::new("test").expect("valid"),
            run: run.to_string(),
            cwd: None,
            env: std::collections::BTreeMap::new(),
            runtime: GateRuntime::Local,
            timeout_ms: None,
            artifacts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn passing_command_reports_passed() {
        let cancel = CancellationToken::new();
        let outcome = execute_once(&gate("exit 0"), ".", 5_000, &cancel).await;
        assert_eq!(outcome.status, GateStatus::Passed);
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[tokio::test]
    async fn failing_command_reports_failed_with_captured_stderr() {
        let cancel = CancellationToken::new();
        let outcome = execute_once(&gate("echo boom 1>&2; exit 1"), ".", 5_000, &cancel).await;
        assert_eq!(outcome.status, GateStatus::Failed);
        assert_eq!(outcome.exit_code, Some(1));
        assert!(outcome.stderr_tail.contains("boom"));
    }

    #[tokio::test]
    async fn timeout_terminates_the_process() {
        let mut slow = gate("sleep 5");
        slow.timeout_ms = Some(50);
        let cancel = CancellationToken::new();
        let outcome = execute_once(&slow, ".", 5_000, &cancel).await;
        assert_eq!(outcome.status, GateStatus::Failed);
        assert!(outcome.stderr_tail.contains("timeout"));
    }

    #[tokio::test]
    async fn cancellation_terminates_the_process_before_its_timeout() {
        let slow = gate("sleep 5");
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            child.cancel();
        });
        let outcome = execute_once(&slow, ".", 5_000, &cancel).await;
        assert_eq!(outcome.status, GateStatus::Failed);
        assert!(outcome.stderr_tail.contains("cancelled"));
        assert!(outcome.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn ci_service_gate_is_skipped_without_running() {
        let mut gate = gate("exit 1");
        gate.runtime = GateRuntime::CiService;
        let cancel = CancellationToken::new();
        let outcome = execute_once(&gate, ".", 5_000, &cancel).await;
        assert_eq!(outcome.status, GateStatus::Skipped);
    }

    #[tokio::test]
    async fn container_gate_degrades_to_local_with_notice() {
        let mut gate = gate("exit 0");
        gate.runtime = GateRuntime::Container;
        let cancel = CancellationToken::new();
        let outcome = execute_once(&gate, ".", 5_000, &cancel).await;
        assert_eq!(outcome.status, GateStatus::Passed);
        assert!(outcome.notices.iter().any(|notice| notice.contains("container")));
    }
}
