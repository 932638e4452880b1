//! Error kinds surfaced by the routing core.
//!
//! Debate and scoring failures are recoverable and degrade internally;
//! compliance, override, and breaker failures are surfaced to the caller
//! as typed variants of [`OrchestrationError`].

use thiserror::Error;

/// Errors from the routing core.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The candidate pool was empty (or empty after compliance filtering).
    #[error("no candidate agents available: {0}")]
    NoCandidates(String),

    /// Override creation exceeded the rolling hourly cap.
    #[error("override rate limit exceeded: {used} of {limit} this hour")]
    RateLimitExceeded {
        /// Requests already created inside the window.
        used: u32,
        /// The configured cap.
        limit: u32,
    },

    /// The circuit breaker rejected the call without attempting it.
    #[error("circuit '{name}' is open ({failure_count} failures in window)")]
    CircuitOpen {
        /// Breaker name.
        name: String,
        /// Failures currently inside the sliding window.
        failure_count: u32,
    },

    /// The task failed the compliance gate and was not routed.
    #[error("compliance violation ({severity}): {reason}")]
    ComplianceViolation {
        /// Human-readable violation summary.
        reason: String,
        /// Severity label (low/medium/high).
        severity: String,
    },

    /// An override decision was applied to a non-pending request.
    #[error("invalid override state: {0}")]
    InvalidState(String),

    /// The referenced override is missing, mismatched, or past expiry.
    #[error("override expired or unusable: {0}")]
    ExpiredOverride(String),

    /// Escalation to the arbitration engine failed. Fatal for the
    /// submission that triggered it.
    #[error("arbitration escalation failed: {0}")]
    ArbitrationFailed(String),

    /// The debate path could not run. Recoverable — callers fall back to
    /// direct selection.
    #[error("debate unavailable: {0}")]
    DebateUnavailable(String),

    /// Both the primary directory and any configured fallback failed.
    #[error("directory operation '{operation}' failed: {detail}")]
    DirectoryFailed {
        /// The logical operation that failed.
        operation: String,
        /// Underlying failure detail.
        detail: String,
    },
}

/// Result alias for the routing core.
pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
