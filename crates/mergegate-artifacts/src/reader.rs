// crates/mergegate-artifacts/src/reader.rs
// ============================================================================
// Module: Gate Report Reader
// Description: Reads a gate result JSON document, accepting either the
//              current canonical shape or a legacy on-disk shape, and
//              migrates it into the canonical in-memory type.
// Purpose: Let older artifact directories (written before `status`,
//          `durationMs`, and `startedAt` were the field names) still be read
//          by current tooling without a separate migration pass.
// Dependencies: mergegate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! [`GateReportOnDisk`] deserializes either shape and [`GateReportOnDisk::into_canonical`]
//! produces a [`GateResult`] identical to what [`crate::writer::DeliverablesWriter::write_gate_result`]
//! would have written. The legacy shape recognized here: `result:
//! "success"|"failure"` in place of `status`, `duration` (fractional seconds)
//! in place of `durationMs`, and `start_time` in place of `startedAt`.

use mergegate_core::GateName;
use mergegate_core::GateResult;
use mergegate_core::GateStatus;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while migrating an on-disk gate report into the canonical
/// shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportReadError {
    /// Neither `status` nor `result` was present.
    #[error("gate report is missing a status field")]
    MissingStatus,
    /// `result` held a value other than `"success"` or `"failure"`.
    #[error("gate report has unrecognized legacy result {value:?}")]
    UnknownLegacyResult {
        /// The unrecognized value.
        value: String,
    },
    /// Neither `startedAt` nor `start_time` was present.
    #[error("gate report is missing a start timestamp")]
    MissingStartedAt,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    gate: GateName,
    #[serde(default)]
    status: Option<GateStatus>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    attempts: u32,
    #[serde(default, alias = "start_time")]
    started_at: Option<String>,
    #[serde(default)]
    finished_at: Option<String>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    exit_code: Option<i32>,
    #[serde(default)]
    stdout_tail: String,
    #[serde(default)]
    stderr_tail: String,
    #[serde(default)]
    artifacts: Vec<String>,
}

/// A gate result as read from disk, before legacy-key migration.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct GateReportOnDisk(RawReport);

impl GateReportOnDisk {
    /// Migrates this report into the canonical [`GateResult`] shape,
    /// resolving legacy field names where the canonical ones are absent.
    ///
    /// # Errors
    ///
    /// Returns [`ReportReadError`] when a required field is missing from
    /// both its canonical and legacy spellings, or when a legacy `result`
    /// value is not recognized.
    pub fn into_canonical(self) -> Result<GateResult, ReportReadError> {
        let raw = self.0;

        let status = match (raw.status, raw.result.as_deref()) {
            (Some(status), _) => status,
            (None, Some("success")) => GateStatus::Passed,
            (None, Some("failure")) => GateStatus::Failed,
            (None, Some(other)) => return Err(ReportReadError::UnknownLegacyResult { value: other.to_string() }),
            (None, None) => return Err(ReportReadError::MissingStatus),
        };

        let started_at = raw.started_at.ok_or(ReportReadError::MissingStartedAt)?;
        let finished_at = raw.finished_at.unwrap_or_else(|| started_at.clone());

        let duration_ms = match (raw.duration_ms, raw.duration) {
            (Some(ms), _) => ms,
            (None, Some(seconds)) => seconds_to_millis(seconds),
            (None, None) => 0,
        };

        Ok(GateResult {
            gate: raw.gate,
            status,
            attempts: raw.attempts.max(1),
            started_at,
            finished_at,
            duration_ms,
            exit_code: raw.exit_code,
            stdout_tail: raw.stdout_tail,
            stderr_tail: raw.stderr_tail,
            artifacts: raw.artifacts,
        })
    }
}

#[allow(clippy::cast_possible_truncation, reason = "legacy duration is seconds since an external tool's clock, already bounded by run length")]
#[allow(clippy::cast_sign_loss, reason = "legacy duration is never negative in practice; a negative value clamps to zero")]
fn seconds_to_millis(seconds: f64) -> u64 {
    if seconds.is_sign_negative() || !seconds.is_finite() {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}
