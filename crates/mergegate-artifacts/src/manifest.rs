// crates/mergegate-artifacts/src/manifest.rs
// ============================================================================
// Module: Manifest
// Description: The canonical index of one run's deliverables: plan hash,
//              execution context, and every artifact written.
// Purpose: Give hosts and the CLI a single canonical-hashable record of what
//          was produced, instead of having to re-walk the artifact
//          directory.
// Dependencies: mergegate-core, serde
// ============================================================================

//! ## Overview
//! A [`Manifest`] is itself written through [`mergegate_core::encode`], so
//! two runs over an identical plan and identical gate outcomes produce
//! byte-identical manifests.

use mergegate_core::HashDigest;
use serde::Deserialize;
use serde::Serialize;

/// Schema version this writer emits.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0.0";

/// Kind of file an artifact entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    /// A canonically-encoded JSON document (`plan.json`, a gate report,
    /// `manifest.json` itself).
    Json,
    /// A human-readable Markdown document (`snapshot.md`).
    Markdown,
    /// A captured log file collected from a gate's declared artifacts.
    Log,
}

/// One written deliverable file, indexed by the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Logical name of the artifact (for example `plan`, `a/tests`, or a
    /// collected artifact's declared path).
    pub name: String,
    /// Path relative to the run directory.
    pub relative_path: String,
    /// Kind of file this entry points at.
    #[serde(rename = "type")]
    pub kind: ArtifactType,
    /// Size in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 digest of the written bytes.
    pub sha256: String,
}

/// Where a run executed, for audit and reproducibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Running under a continuous-integration service.
    Ci,
    /// Running on a developer's local machine.
    Local,
}

/// Execution context recorded alongside a run's manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// The engine's process working directory for this run.
    pub working_directory: String,
    /// Whether this run executed under CI or locally.
    pub environment: Environment,
    /// The human or service account that initiated the run, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// An opaque identifier correlating this run with an upstream request,
    /// when the host supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

/// The full deliverables manifest for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest schema version.
    pub schema_version: String,
    /// ISO-8601 UTC timestamp the manifest was written.
    pub timestamp: String,
    /// SHA-256 hash of the canonically encoded input plan.
    pub plan_hash: HashDigest,
    /// Version identifier of the engine that produced this run.
    pub runner_version: String,
    /// Depth of automation the caller selected for this run (the number of
    /// dependency levels actually scheduled).
    pub level_executed: u32,
    /// Path to the profile the host resolved for this run, when one
    /// applies. Profile resolution itself is a host concern; the engine
    /// only carries the path through for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<String>,
    /// Every deliverable file written for this run, in write order.
    pub artifacts: Vec<ManifestEntry>,
    /// Where and how this run executed.
    pub execution_context: ExecutionContext,
}

impl Manifest {
    /// Builds an empty manifest shell, ready for [`Manifest::push`] calls as
    /// deliverables are written.
    #[must_use]
    pub fn new(
        timestamp: String,
        plan_hash: HashDigest,
        runner_version: String,
        level_executed: u32,
        profile_path: Option<String>,
        execution_context: ExecutionContext,
    ) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            timestamp,
            plan_hash,
            runner_version,
            level_executed,
            profile_path,
            artifacts: Vec::new(),
            execution_context,
        }
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: ManifestEntry) {
        self.artifacts.push(entry);
    }

    /// Returns the total size in bytes of every recorded entry.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.artifacts.iter().map(|entry| entry.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use mergegate_core::HashAlgorithm;

    use super::*;

    fn sample_context() -> ExecutionContext {
        ExecutionContext { working_directory: "/tmp/run".to_string(), environment: Environment::Local, actor: None, correlation_id: None }
    }

    #[test]
    fn total_bytes_sums_entries() {
        let mut manifest = Manifest::new(
            "2026-01-01T00:00:00Z".to_string(),
            HashDigest::new(HashAlgorithm::Sha256, b"plan"),
            "0.1.0".to_string(),
            2,
            None,
            sample_context(),
        );
        manifest.push(ManifestEntry {
            name: "a/tests".to_string(),
            relative_path: "results/a/tests.json".to_string(),
            kind: ArtifactType::Json,
            size: 10,
            sha256: "deadbeef".to_string(),
        });
        manifest.push(ManifestEntry {
            name: "a/lint".to_string(),
            relative_path: "results/a/lint.json".to_string(),
            kind: ArtifactType::Json,
            size: 5,
            sha256: "cafef00d".to_string(),
        });
        assert_eq!(manifest.total_bytes(), 15);
        assert_eq!(manifest.artifacts.len(), 2);
    }

    #[test]
    fn encodes_with_sorted_keys_and_trailing_newline() {
        let manifest = Manifest::new(
            "2026-01-01T00:00:00Z".to_string(),
            HashDigest::new(HashAlgorithm::Sha256, b"plan"),
            "0.1.0".to_string(),
            1,
            Some("profiles/default.json".to_string()),
            sample_context(),
        );
        let bytes = mergegate_core::encode(&manifest).expect("encode");
        assert!(bytes.ends_with(b"\n"));
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.find("\"artifacts\"").unwrap() < text.find("\"executionContext\"").unwrap());
    }
}
