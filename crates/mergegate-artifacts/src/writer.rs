// crates/mergegate-artifacts/src/writer.rs
// ============================================================================
// Module: Deliverables Writer
// Description: Sandboxed, path-traversal-safe writes of one run's
//              deliverables (plan, per-gate results, collected artifacts,
//              manifest, snapshot) under a timestamped run directory, with a
//              `latest` indirection pointer.
// Purpose: Guarantee that nothing a gate declares as an artifact path can
//          escape the configured artifact directory, and that every run's
//          deliverables live at a stable, discoverable location.
// Dependencies: cap-std, cap-primitives, mergegate-core
// ============================================================================

//! ## Overview
//! Every write goes through a [`cap_std::fs::Dir`] opened once against the
//! artifact directory root via `ambient_authority()`; all paths handed to it
//! are relative and rejected outright if they contain `..` or an absolute
//! root, so a gate cannot declare an artifact path that writes outside the
//! sandbox regardless of what it reports.
//!
//! Each run gets its own subdirectory named `run_id` directly under the
//! artifact root (callers should pass a sortable id, such as an ISO-8601
//! timestamp, so [`crate::retention::apply_retention`] can prune by name
//! order). After a run's deliverables are written, [`DeliverablesWriter::finalize`]
//! rewrites `latest`, a plain text pointer file at the artifact root holding
//! the current run id, so hosts that only care about "the most recent run"
//! never need to list the root directory.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use mergegate_core::DEFAULT_HASH_ALGORITHM;
use mergegate_core::GateName;
use mergegate_core::GateResult;
use mergegate_core::HashDigest;
use mergegate_core::ItemName;
use mergegate_core::Plan;
use mergegate_core::hash_bytes;
use thiserror::Error;

use crate::manifest::ArtifactType;
use crate::manifest::ExecutionContext;
use crate::manifest::Manifest;
use crate::manifest::ManifestEntry;

/// Errors raised while writing deliverables.
#[derive(Debug, Error)]
pub enum WriterError {
    /// The artifact directory root could not be opened.
    #[error("failed to open artifact directory {path}: {source}")]
    RootUnavailable {
        /// The configured root path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A declared artifact path escaped the artifact directory.
    #[error("artifact path {path:?} escapes the artifact directory")]
    PathEscapesRoot {
        /// The offending relative path.
        path: String,
    },
    /// A write failed after the path was accepted.
    #[error("failed to write artifact {path}: {source}")]
    WriteFailed {
        /// The relative path being written.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The document could not be canonically encoded.
    #[error("failed to encode {path}: {source}")]
    EncodeFailed {
        /// The relative path that was being encoded for.
        path: String,
        /// Underlying encoding error.
        source: mergegate_core::EncodeError,
    },
}

/// Writes one run's deliverables (plan, gate results, collected artifacts,
/// manifest, snapshot) into a timestamped run directory under a sandboxed
/// artifact root, and maintains the `latest` pointer.
pub struct DeliverablesWriter {
    artifact_root: PathBuf,
    root: Dir,
    run_id: String,
    run_dir: Dir,
    entries: Vec<ManifestEntry>,
}

impl DeliverablesWriter {
    /// Opens (creating if necessary) `artifact_dir` as the sandbox root and
    /// creates a fresh run directory named `run_id` beneath it.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::RootUnavailable`] when either directory cannot
    /// be created or opened.
    pub fn open(artifact_dir: &Path, run_id: &str) -> Result<Self, WriterError> {
        std::fs::create_dir_all(artifact_dir)
            .map_err(|source| WriterError::RootUnavailable { path: artifact_dir.display().to_string(), source })?;
        let root = Dir::open_ambient_dir(artifact_dir, ambient_authority())
            .map_err(|source| WriterError::RootUnavailable { path: artifact_dir.display().to_string(), source })?;
        root.create_dir_all(run_id)
            .map_err(|source| WriterError::RootUnavailable { path: artifact_dir.join(run_id).display().to_string(), source })?;
        let run_dir = root
            .open_dir(run_id)
            .map_err(|source| WriterError::RootUnavailable { path: artifact_dir.join(run_id).display().to_string(), source })?;
        Ok(Self { artifact_root: artifact_dir.to_path_buf(), root, run_id: run_id.to_string(), run_dir, entries: Vec::new() })
    }

    /// The run directory's id, as passed to [`DeliverablesWriter::open`].
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The absolute filesystem path of this run's directory, for callers
    /// (such as [`GateResult::artifacts`](mergegate_core::GateResult)) that
    /// must record where a collected artifact landed.
    #[must_use]
    pub fn run_root(&self) -> PathBuf {
        self.artifact_root.join(&self.run_id)
    }

    /// Canonically encodes and writes `plan.json`, returning its hash so the
    /// caller can seed [`Manifest::plan_hash`].
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::EncodeFailed`] or [`WriterError::WriteFailed`].
    pub fn write_plan(&mut self, plan: &Plan) -> Result<HashDigest, WriterError> {
        let bytes = mergegate_core::encode(plan).map_err(|source| WriterError::EncodeFailed { path: "plan.json".to_string(), source })?;
        self.write_run_file("plan.json", &bytes, ArtifactType::Json, "plan")?;
        Ok(hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes))
    }

    /// Canonically encodes and writes one item's gate result at
    /// `results/<item>/<gate>.json`.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::EncodeFailed`] or [`WriterError::WriteFailed`].
    pub fn write_gate_result(&mut self, item: &ItemName, result: &GateResult) -> Result<(), WriterError> {
        let relative = format!("results/{item}/{gate}.json", gate = result.gate);
        let bytes =
            mergegate_core::encode(result).map_err(|source| WriterError::EncodeFailed { path: relative.clone(), source })?;
        self.write_run_file(&relative, &bytes, ArtifactType::Json, &format!("{item}/{gate}", gate = result.gate))?;
        Ok(())
    }

    /// Writes one artifact's bytes for `item`/`gate` at `declared_path`
    /// (relative to the run directory) and records it in the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::PathEscapesRoot`] when `declared_path` is
    /// absolute or contains a `..` component, or [`WriterError::WriteFailed`]
    /// when the write itself fails.
    pub fn write_artifact(
        &mut self,
        item: &ItemName,
        gate: &GateName,
        declared_path: &str,
        bytes: &[u8],
    ) -> Result<(), WriterError> {
        let kind = artifact_type_for(declared_path);
        self.write_run_file(declared_path, bytes, kind, &format!("{item}/{gate}"))
    }

    /// Writes the accumulated manifest as canonical JSON at
    /// `manifest.json`, under the run directory.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::EncodeFailed`] or [`WriterError::WriteFailed`].
    pub fn write_manifest(
        &mut self,
        timestamp: String,
        plan_hash: HashDigest,
        runner_version: String,
        level_executed: u32,
        profile_path: Option<String>,
        execution_context: ExecutionContext,
    ) -> Result<Manifest, WriterError> {
        let mut manifest = Manifest::new(timestamp, plan_hash, runner_version, level_executed, profile_path, execution_context);
        for entry in &self.entries {
            manifest.push(entry.clone());
        }
        let bytes = mergegate_core::encode(&manifest)
            .map_err(|source| WriterError::EncodeFailed { path: "manifest.json".to_string(), source })?;
        self.run_dir
            .write("manifest.json", &bytes)
            .map_err(|source| WriterError::WriteFailed { path: "manifest.json".to_string(), source })?;
        Ok(manifest)
    }

    /// Writes a pre-rendered snapshot document at `snapshot.md`.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::WriteFailed`] when the write fails.
    pub fn write_snapshot(&mut self, snapshot_markdown: &str) -> Result<(), WriterError> {
        self.write_run_file("snapshot.md", snapshot_markdown.as_bytes(), ArtifactType::Markdown, "snapshot")
    }

    /// Repoints `latest`, a plain text file at the artifact root, at this
    /// writer's run id.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::WriteFailed`] when the write fails.
    pub fn finalize(&self) -> Result<(), WriterError> {
        self.root
            .write("latest", self.run_id.as_bytes())
            .map_err(|source| WriterError::WriteFailed { path: format!("{}/latest", self.artifact_root.display()), source })
    }

    /// Entries recorded so far, in write order.
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    fn write_run_file(&mut self, relative_path: &str, bytes: &[u8], kind: ArtifactType, name: &str) -> Result<(), WriterError> {
        let relative = sanitize_relative_path(relative_path)?;
        if let Some(parent) = relative.parent() {
            if !parent.as_os_str().is_empty() {
                self.run_dir
                    .create_dir_all(parent)
                    .map_err(|source| WriterError::WriteFailed { path: relative_path.to_string(), source })?;
            }
        }
        self.run_dir
            .write(&relative, bytes)
            .map_err(|source| WriterError::WriteFailed { path: relative_path.to_string(), source })?;

        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, bytes);
        self.entries.push(ManifestEntry {
            name: name.to_string(),
            relative_path: relative.display().to_string(),
            kind,
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            sha256: digest.value,
        });
        Ok(())
    }
}

fn artifact_type_for(declared_path: &str) -> ArtifactType {
    match Path::new(declared_path).extension().and_then(std::ffi::OsStr::to_str) {
        Some("json") => ArtifactType::Json,
        Some("md") => ArtifactType::Markdown,
        _ => ArtifactType::Log,
    }
}

/// Rejects absolute paths and `..`/root components, returning a clean
/// relative path safe to hand to [`cap_std::fs::Dir`].
fn sanitize_relative_path(declared_path: &str) -> Result<PathBuf, WriterError> {
    let path = Path::new(declared_path);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => clean.push(segment),
            Component::CurDir => {}
            _ => return Err(WriterError::PathEscapesRoot { path: declared_path.to_string() }),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(WriterError::PathEscapesRoot { path: declared_path.to_string() });
    }
    Ok(clean)
}
