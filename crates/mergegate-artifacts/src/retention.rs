// crates/mergegate-artifacts/src/retention.rs
// ============================================================================
// Module: Retention
// Description: Prunes old run directories under an artifact root according
//              to a caller-supplied age/count/keep-latest policy.
// Purpose: Keep the artifact directory bounded across many merge-train runs
//          without deleting anything a caller didn't explicitly ask to
//          prune.
// Dependencies: cap-std, mergegate-core, time
// ============================================================================

//! ## Overview
//! Retention operates on run subdirectories directly beneath the artifact
//! root, one per run id. Names sort lexicographically by construction
//! (callers are expected to name run directories with a sortable id, such as
//! an ISO-8601 timestamp or monotonically increasing counter), so "newest
//! first" is a plain reverse sort rather than anything requiring parsed
//! timestamps. Age, however, genuinely needs a timestamp: [`apply_retention`]
//! reads each run directory's filesystem modification time and compares it
//! against a caller-supplied `now`, the same injected-clock discipline the
//! rest of the engine uses, so a retention pass is reproducible in tests
//! without depending on wall-clock time.

use std::collections::BTreeSet;
use std::path::Path;

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised while applying retention.
#[derive(Debug, Error)]
pub enum RetentionError {
    /// The artifact root could not be opened.
    #[error("failed to open artifact root {path}: {source}")]
    RootUnavailable {
        /// Configured root path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A run directory could not be removed.
    #[error("failed to remove run directory {name}: {source}")]
    RemoveFailed {
        /// Name of the run directory.
        name: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Caller-supplied retention policy: how many runs to keep, how old a run
/// may get before it is pruned, and whether the newest run is always
/// exempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Maximum age, in days, a run directory may reach before it becomes
    /// eligible for removal. `None` means no age-based pruning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,
    /// Maximum number of run directories to keep, newest first. `None`
    /// means no count-based pruning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<usize>,
    /// When true, the single newest run directory is always kept even if
    /// it would otherwise be pruned by age or count.
    #[serde(default)]
    pub keep_latest: bool,
}

/// Report describing what a retention pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionReport {
    /// Run directory names removed, oldest first.
    pub removed: Vec<String>,
    /// Run directory names kept, newest first.
    pub kept: Vec<String>,
    /// Total bytes freed by removal.
    pub freed_bytes: u64,
}

/// Applies `policy` to every run directory under `artifact_root`, removing
/// whichever directories the policy excludes from the keep-set and
/// returning a report of what was removed and kept.
///
/// The keep-set is computed as: sort run directories newest-first, trim to
/// `max_count` if set, drop any directory older than `max_age_days` if set,
/// then re-admit the single newest directory if `keep_latest` is true and
/// it would otherwise have been dropped.
///
/// # Errors
///
/// Returns [`RetentionError::RootUnavailable`] when the root cannot be
/// opened, or [`RetentionError::RemoveFailed`] when a directory cannot be
/// removed.
pub fn apply_retention(artifact_root: &Path, policy: RetentionPolicy, now: OffsetDateTime) -> Result<RetentionReport, RetentionError> {
    let root = Dir::open_ambient_dir(artifact_root, ambient_authority())
        .map_err(|source| RetentionError::RootUnavailable { path: artifact_root.display().to_string(), source })?;

    let mut run_dirs: Vec<String> = root
        .entries()
        .map_err(|source| RetentionError::RootUnavailable { path: artifact_root.display().to_string(), source })?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|file_type| file_type.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    run_dirs.sort();

    let newest_first: Vec<&String> = run_dirs.iter().rev().collect();
    let mut keep: BTreeSet<&str> = newest_first.iter().map(|name| name.as_str()).collect();

    if let Some(max_count) = policy.max_count {
        for name in newest_first.iter().skip(max_count) {
            keep.remove(name.as_str());
        }
    }

    if let Some(max_age_days) = policy.max_age_days {
        let cutoff = now - time::Duration::days(i64::from(max_age_days));
        for name in &newest_first {
            if age_cutoff_exceeded(&root, name, cutoff) {
                keep.remove(name.as_str());
            }
        }
    }

    if policy.keep_latest {
        if let Some(newest) = newest_first.first() {
            keep.insert(newest.as_str());
        }
    }

    let mut freed_bytes = 0u64;
    let mut removed = Vec::new();
    for name in &run_dirs {
        if keep.contains(name.as_str()) {
            continue;
        }
        freed_bytes = freed_bytes.saturating_add(directory_size(&root, name));
        root.remove_dir_all(name).map_err(|source| RetentionError::RemoveFailed { name: name.clone(), source })?;
        removed.push(name.clone());
    }

    let kept: Vec<String> = newest_first.iter().filter(|name| keep.contains(name.as_str())).map(|name| (*name).clone()).collect();

    Ok(RetentionReport { removed, kept, freed_bytes })
}

/// Returns true when the run directory `name`'s modification time is older
/// than `cutoff`. A directory whose modification time cannot be read is
/// treated as not exceeding the cutoff, so a transient metadata failure
/// prunes nothing rather than everything.
fn age_cutoff_exceeded(root: &Dir, name: &str, cutoff: OffsetDateTime) -> bool {
    let Ok(metadata) = root.metadata(name) else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    OffsetDateTime::from(modified) < cutoff
}

fn directory_size(root: &Dir, name: &str) -> u64 {
    let Ok(sub_dir) = root.open_dir(name) else {
        return 0;
    };
    directory_size_recursive(&sub_dir)
}

fn directory_size_recursive(dir: &Dir) -> u64 {
    let Ok(entries) = dir.entries() else {
        return 0;
    };
    let mut total = 0u64;
    for entry in entries.filter_map(Result::ok) {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if let Ok(name) = entry.file_name().into_string() {
                if let Ok(sub_dir) = dir.open_dir(&name) {
                    total = total.saturating_add(directory_size_recursive(&sub_dir));
                }
            }
        } else if let Ok(metadata) = entry.metadata() {
            total = total.saturating_add(metadata.len());
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
    }

    #[test]
    fn keeps_most_recent_n_run_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["run-0001", "run-0002", "run-0003"] {
            std::fs::create_dir(dir.path().join(name)).expect("create run dir");
            std::fs::write(dir.path().join(name).join("artifact.log"), b"data").expect("write artifact");
        }

        let policy = RetentionPolicy { max_count: Some(1), ..RetentionPolicy::default() };
        let report = apply_retention(dir.path(), policy, reference_now()).expect("apply retention");
        assert_eq!(report.removed, vec!["run-0001".to_string(), "run-0002".to_string()]);
        assert_eq!(report.kept, vec!["run-0003".to_string()]);
        assert!(report.freed_bytes > 0);
        assert!(!dir.path().join("run-0001").exists());
        assert!(dir.path().join("run-0003").exists());
    }

    #[test]
    fn directory_size_counts_nested_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("run-0001/results/a")).expect("create nested dir");
        std::fs::write(dir.path().join("run-0001/plan.json"), b"top-level").expect("write top-level");
        std::fs::write(dir.path().join("run-0001/results/a/tests.json"), b"nested").expect("write nested");
        std::fs::create_dir(dir.path().join("run-0002")).expect("create run dir");

        let policy = RetentionPolicy { max_count: Some(1), ..RetentionPolicy::default() };
        let report = apply_retention(dir.path(), policy, reference_now()).expect("apply retention");
        assert_eq!(report.removed, vec!["run-0001".to_string()]);
        assert_eq!(report.freed_bytes, "top-level".len() as u64 + "nested".len() as u64);
    }

    #[test]
    fn keeping_more_than_exist_removes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("run-0001")).expect("create run dir");

        let policy = RetentionPolicy { max_count: Some(5), ..RetentionPolicy::default() };
        let report = apply_retention(dir.path(), policy, reference_now()).expect("apply retention");
        assert!(report.removed.is_empty());
        assert_eq!(report.kept, vec!["run-0001".to_string()]);
    }

    #[test]
    fn keep_latest_overrides_count_and_age() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("run-0001")).expect("create run dir");

        let policy = RetentionPolicy { max_count: Some(0), max_age_days: Some(0), keep_latest: true };
        let report = apply_retention(dir.path(), policy, reference_now()).expect("apply retention");
        assert!(report.removed.is_empty());
        assert_eq!(report.kept, vec!["run-0001".to_string()]);
    }

    #[test]
    fn no_policy_keeps_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("run-0001")).expect("create run dir");
        std::fs::create_dir(dir.path().join("run-0002")).expect("create run dir");

        let report = apply_retention(dir.path(), RetentionPolicy::default(), reference_now()).expect("apply retention");
        assert!(report.removed.is_empty());
        assert_eq!(report.kept, vec!["run-0002".to_string(), "run-0001".to_string()]);
    }
}
