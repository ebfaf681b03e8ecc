// crates/mergegate-cli/src/main.rs
// ============================================================================
// Module: Merge-Train CLI Entry Point
// Description: Thin command dispatcher that runs a plan file end to end
//              through `mergegate-orchestrator` and maps the result onto the
//              engine's exit-code taxonomy.
// Purpose: Exercise the library as a real host would, without itself being
//          the tested surface.
// Dependencies: clap, mergegate-core, mergegate-orchestrator, tokio, tracing.
// ============================================================================

//! ## Overview
//! This binary is deliberately thin: it parses arguments, loads a plan file
//! from disk, hands it to [`mergegate_orchestrator::run`], prints the
//! resulting snapshot location, and exits with the class `0`/`1`/`2` the
//! engine's error taxonomy defines. It is not itself part of the engine's
//! tested surface; `mergegate-orchestrator` and the crates below it carry
//! the behavior under test.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mergegate_core::NodeStatus;
use mergegate_orchestrator::OrchestratorError;
use mergegate_orchestrator::RunOptions;
use thiserror::Error;

/// Runs a merge-train plan file to completion.
#[derive(Parser, Debug)]
#[command(name = "mergegate", about = "Run a merge-train plan to completion")]
struct Cli {
    /// Path to the plan JSON file.
    plan: PathBuf,
    /// Working directory gates execute in. Defaults to the plan file's
    /// parent directory.
    #[arg(long, value_name = "PATH")]
    working_dir: Option<PathBuf>,
    /// Directory deliverables are written under. Defaults to
    /// `<working-dir>/.mergegate`.
    #[arg(long, value_name = "PATH")]
    artifact_dir: Option<PathBuf>,
    /// Path to a profile file resolved by the caller, recorded on the
    /// manifest for audit. This binary does not read or interpret it.
    #[arg(long, value_name = "PATH")]
    profile: Option<PathBuf>,
}

/// Errors this binary can exit on, distinct from the library's own error
/// types so the exit-code mapping stays local to the binary.
#[derive(Debug, Error)]
enum CliError {
    /// The plan file could not be read from disk.
    #[error("failed to read plan file {path}: {source}")]
    PlanUnreadable {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The orchestrator returned a validation or writer error.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// Outcome class a completed run falls into, independent of `ExitCode`
/// (which carries no equality or inspection) so tests can assert on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    /// No node failed or was blocked, and the run was not cancelled.
    Clean,
    /// At least one node failed or was blocked, or the run was cancelled.
    HasFailure,
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Clean => ExitCode::SUCCESS,
            RunStatus::HasFailure => ExitCode::from(1),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(status) => status.into(),
        Err(CliError::Orchestrator(OrchestratorError::Validation(err))) => {
            tracing::error!(error = %err, "plan validation failed");
            ExitCode::from(2)
        }
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<RunStatus, CliError> {
    let bytes =
        std::fs::read(&cli.plan).map_err(|source| CliError::PlanUnreadable { path: cli.plan.display().to_string(), source })?;
    let plan = mergegate_core::load_plan(&bytes).map_err(OrchestratorError::from)?;

    let working_dir = cli.working_dir.unwrap_or_else(|| cli.plan.parent().map_or_else(|| PathBuf::from("."), PathBuf::from));
    let mut options = RunOptions::new(working_dir);
    if let Some(artifact_dir) = cli.artifact_dir {
        options.artifact_dir = artifact_dir;
    }
    options.profile_path = cli.profile.map(|path| path.display().to_string());

    let summary = mergegate_orchestrator::run(&plan, options).await?;

    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "run {} wrote {} artifact(s)", summary.run_id, summary.manifest.artifacts.len());
    let _ = writeln!(
        stdout,
        "{} passed, {} failed, {} blocked ({}ms)",
        summary.metrics.items_passed, summary.metrics.items_failed, summary.metrics.items_blocked, summary.metrics.wall_time_ms
    );
    for item in &plan.items {
        if let Some(node) = summary.node_results.get(&item.name) {
            let _ = writeln!(stdout, "  {} -> {:?}", item.name, node.status);
        }
    }
    if summary.ready_to_merge.is_empty() {
        let _ = writeln!(stdout, "no items ready to merge");
    } else {
        let _ = writeln!(
            stdout,
            "ready to merge: {}",
            summary.ready_to_merge.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
    }

    let has_failure_or_block =
        summary.node_results.values().any(|node| matches!(node.status, NodeStatus::Failed | NodeStatus::Blocked));

    Ok(if summary.cancelled || has_failure_or_block { RunStatus::HasFailure } else { RunStatus::Clean })
}
