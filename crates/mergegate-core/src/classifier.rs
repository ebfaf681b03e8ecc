// crates/mergegate-core/src/classifier.rs
// ============================================================================
// Module: Error Classifier
// Description: Pure classification of gate failure text into a retry
//              disposition, severity, and stable diagnostic code.
// Purpose: Decide whether a failed gate is worth retrying without the
//          scheduler needing to understand any particular tool's output.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Classification is a pure function over gate output: no I/O, no clock, no
//! shared state. Rules are tried in order and the first match wins, so more
//! specific patterns should precede more general ones. An input matching no
//! rule classifies as [`Disposition::Unknown`]; the retry wrapper retries it
//! the same as [`Disposition::Transient`] (only a [`Disposition::Permanent`]
//! verdict stops retrying early), but [`Classification::code`] still records
//! it distinctly for diagnostics.

/// Retry disposition assigned to a gate failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Likely to succeed on retry (network blips, lock contention, flaky
    /// infrastructure).
    Transient,
    /// Will not succeed on retry without a change to the underlying item.
    Permanent,
    /// No rule matched; treated as non-retryable but recorded separately.
    Unknown,
}

/// Relative urgency of a classified failure, carried through to diagnostics
/// and surfaced in a snapshot but never consulted by the retry loop itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The failure indicates the run cannot make forward progress at all.
    Critical,
    /// The failure is a hard stop for the item but other items are unaffected.
    High,
    /// The failure is likely self-resolving but still worth a human's notice.
    Medium,
    /// Routine, expected noise (a single flaky network blip).
    Low,
}

/// The full classification of a single gate failure: a retry disposition, a
/// severity, a stable rule code for diagnostics, and the caller-supplied
/// context that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Whether the failure is worth retrying.
    pub kind: Disposition,
    /// Relative urgency of the failure.
    pub severity: Severity,
    /// Stable identifier for the rule that matched, or `"unclassified"`.
    pub code: String,
    /// The context string passed to [`classify`], carried through unchanged.
    pub context: String,
}

struct Rule {
    needle: &'static str,
    code: &'static str,
    kind: Disposition,
    severity: Severity,
}

/// Ordered rule table. Earlier entries take precedence over later ones.
const RULES: &[Rule] = &[
    Rule { needle: "connection reset", code: "connection_reset", kind: Disposition::Transient, severity: Severity::Low },
    Rule { needle: "connection refused", code: "connection_refused", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "temporary failure in name resolution", code: "dns_temporary_failure", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "could not resolve host", code: "dns_resolution_failure", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "enotfound", code: "dns_not_found", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "eai_again", code: "dns_retry", kind: Disposition::Transient, severity: Severity::Low },
    Rule { needle: "timed out", code: "timeout", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "timeout", code: "timeout", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "rate limit", code: "rate_limited", kind: Disposition::Transient, severity: Severity::Low },
    Rule { needle: "429", code: "rate_limited", kind: Disposition::Transient, severity: Severity::Low },
    Rule { needle: "too many requests", code: "rate_limited", kind: Disposition::Transient, severity: Severity::Low },
    Rule { needle: "resource temporarily unavailable", code: "resource_unavailable", kind: Disposition::Transient, severity: Severity::Low },
    Rule { needle: "lock file", code: "lock_contention", kind: Disposition::Transient, severity: Severity::Low },
    Rule { needle: "could not lock", code: "lock_contention", kind: Disposition::Transient, severity: Severity::Low },
    Rule { needle: "502 bad gateway", code: "upstream_5xx", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "503 service unavailable", code: "upstream_5xx", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "504 gateway timeout", code: "upstream_5xx", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "temporary failure", code: "temporary_failure", kind: Disposition::Transient, severity: Severity::Low },
    Rule { needle: "terminated by signal", code: "signal_terminated", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "i/o error", code: "io_error", kind: Disposition::Transient, severity: Severity::Medium },
    Rule { needle: "assertion failed", code: "assertion_failed", kind: Disposition::Permanent, severity: Severity::High },
    Rule { needle: "compilation failed", code: "compilation_failed", kind: Disposition::Permanent, severity: Severity::High },
    Rule { needle: "syntax error", code: "syntax_error", kind: Disposition::Permanent, severity: Severity::High },
    Rule { needle: "permission denied", code: "permission_denied", kind: Disposition::Permanent, severity: Severity::Critical },
    Rule { needle: "eacces", code: "permission_denied", kind: Disposition::Permanent, severity: Severity::Critical },
    Rule { needle: "no such file or directory", code: "path_not_found", kind: Disposition::Permanent, severity: Severity::High },
    Rule { needle: "enoent", code: "path_not_found", kind: Disposition::Permanent, severity: Severity::High },
    Rule { needle: "test failed", code: "test_failed", kind: Disposition::Permanent, severity: Severity::High },
    Rule { needle: "command not found", code: "command_not_found", kind: Disposition::Permanent, severity: Severity::Critical },
];

/// Classifies gate failure text into a retry disposition, severity, and
/// stable rule code, carrying `context` through unchanged for diagnostics.
///
/// Matching is case-insensitive and substring-based over `stderr`; the
/// first matching rule in [`RULES`] wins.
#[must_use]
pub fn classify(stderr: &str, context: &str) -> Classification {
    let lowered = stderr.to_lowercase();
    for rule in RULES {
        if lowered.contains(rule.needle) {
            return Classification { kind: rule.kind, severity: rule.severity, code: rule.code.to_string(), context: context.to_string() };
        }
    }
    Classification { kind: Disposition::Unknown, severity: Severity::Medium, code: "unclassified".to_string(), context: context.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_connection_reset_as_transient() {
        let result = classify("Error: connection reset by peer", "tests");
        assert_eq!(result.kind, Disposition::Transient);
        assert_eq!(result.code, "connection_reset");
        assert_eq!(result.context, "tests");
    }

    #[test]
    fn classifies_compile_error_as_permanent() {
        let result = classify("error[E0425]: compilation failed", "build");
        assert_eq!(result.kind, Disposition::Permanent);
        assert_eq!(result.severity, Severity::High);
    }

    #[test]
    fn classifies_unrecognized_output_as_unknown() {
        let result = classify("gremlins ate the build server", "tests");
        assert_eq!(result.kind, Disposition::Unknown);
        assert_eq!(result.code, "unclassified");
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(classify("CONNECTION RESET by peer", "tests").kind, Disposition::Transient);
    }

    #[test]
    fn first_matching_rule_wins() {
        // "timeout" is a substring relation candidate; ensure ordering is stable
        // rather than both rules racing for the same input.
        assert_eq!(classify("operation timed out after 30s", "tests").kind, Disposition::Transient);
    }

    #[test]
    fn permission_denied_is_critical() {
        let result = classify("bash: ./deploy.sh: permission denied", "deploy");
        assert_eq!(result.kind, Disposition::Permanent);
        assert_eq!(result.severity, Severity::Critical);
    }
}
