//! Audit logging contract.
//!
//! Routing decisions are auditable but auditing is advisory: callers
//! log a warning on failure and continue, an audit sink outage never
//! blocks routing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Error type for audit sinks
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Failed to record audit event: {0}")]
    SinkFailed(String),
}

/// One auditable decision in the routing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Decision kind, snake_case (e.g. `override_approved`).
    pub action: String,
    /// Task the decision concerns, when there is one.
    pub task_id: Option<String>,
    /// Acting identity (requester, approver, or `orchestrator`).
    pub actor: String,
    /// Free-form decision detail.
    pub detail: String,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Event stamped with the current time.
    pub fn now(action: &str, task_id: Option<&str>, actor: &str, detail: &str) -> Self {
        Self {
            action: action.to_string(),
            task_id: task_id.map(String::from),
            actor: actor.to_string(),
            detail: detail.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Audit sink contract. Implementations may persist; this crate only
/// ships logging-backed and discarding sinks.
pub trait AuditLogger: Send + Sync {
    /// Record one event.
    fn log_event(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Sink that emits audit events as structured log lines.
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn log_event(&self, event: &AuditEvent) -> Result<(), AuditError> {
        info!(
            action = %event.action,
            task = event.task_id.as_deref().unwrap_or("-"),
            actor = %event.actor,
            detail = %event.detail,
            "audit"
        );
        Ok(())
    }
}

/// Sink that discards everything. Useful in tests.
pub struct NullAuditLogger;

impl AuditLogger for NullAuditLogger {
    fn log_event(&self, _event: &AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Record an event against a sink, downgrading failure to a warning.
pub fn record(logger: &dyn AuditLogger, event: AuditEvent) {
    if let Err(e) = logger.log_event(&event) {
        warn!(action = %event.action, "audit sink failed: {e}");
    }
}
