// crates/mergegate-core/src/time.rs
// ============================================================================
// Module: Merge-Train Time Model
// Description: Canonical UTC timestamps and the injected clock contract.
// Purpose: Keep execution replayable by never reading wall-clock time inline.
// Dependencies: time
// ============================================================================

//! ## Overview
//! The engine never calls `OffsetDateTime::now_utc()` directly from scheduling
//! or evaluation code paths. Instead, callers supply a [`Clock`]; production
//! callers use [`SystemClock`], tests use a fixed or scripted clock. This is
//! what makes the determinism property in the specification's testable
//! properties section provable rather than merely hoped for.

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Errors raised while formatting or parsing canonical timestamps.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// The timestamp could not be formatted as RFC 3339.
    #[error("failed to format timestamp: {0}")]
    Format(String),
    /// The timestamp could not be parsed as RFC 3339.
    #[error("failed to parse timestamp: {0}")]
    Parse(String),
}

/// Formats a timestamp as ISO-8601 UTC with a `Z` suffix.
///
/// # Errors
///
/// Returns [`TimestampError::Format`] when formatting fails.
pub fn format_iso8601(value: OffsetDateTime) -> Result<String, TimestampError> {
    value.to_offset(time::UtcOffset::UTC).format(&Rfc3339).map_err(|err| TimestampError::Format(err.to_string()))
}

/// Parses an ISO-8601 UTC timestamp with a `Z` suffix.
///
/// # Errors
///
/// Returns [`TimestampError::Parse`] when parsing fails.
pub fn parse_iso8601(value: &str) -> Result<OffsetDateTime, TimestampError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|err| TimestampError::Parse(err.to_string()))
}

/// Supplies the current time to engine components.
///
/// # Invariants
/// - Implementations must return UTC-normalized instants.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> OffsetDateTime;
}

/// Production clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
