//! Human-override workflow — time-bounded, single-use authorizations to
//! bypass a failed compliance check for one task.
//!
//! Requests are decided exactly once. Approval opens a validity window;
//! an approved override past its window is invalid at read time, not
//! lazily swept. Creation is throttled by a rolling hourly window.
//!
//! Time-sensitive operations have `_at` variants taking an explicit
//! `now` so tests control the clock; the public wrappers pass
//! `Utc::now()`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::gate::{Severity, ViolationKind};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::types::IdGenerator;

/// Workflow tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideConfig {
    /// Whether the override workflow handles violations at all.
    pub enabled: bool,
    /// When the workflow is disabled, whether violations escalate to
    /// constitutional review instead of being logged through.
    pub constitutional_review: bool,
    /// Rolling-window cap on request creation.
    pub max_per_hour: u32,
    /// Approval validity window in hours.
    pub validity_hours: i64,
    /// Accumulated denials for one task that trigger a manual-escalation
    /// warning.
    pub escalation_threshold: u32,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            constitutional_review: false,
            max_per_hour: 5,
            validity_hours: 24,
            escalation_threshold: 3,
        }
    }
}

/// Lifecycle status of an override request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl std::fmt::Display for OverrideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Denied => write!(f, "denied"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// The violation an override would bypass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationDescriptor {
    /// Summary of what fired.
    pub reason: String,
    /// Severity derived from the violation count.
    pub severity: Severity,
    /// Category of the first violation.
    pub kind: ViolationKind,
}

/// Decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideDecision {
    Approve,
    Deny,
}

/// An override request and its decision state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRequest {
    /// Request id — the token returned to the caller.
    pub id: String,
    /// Task the override applies to.
    pub task_id: String,
    /// The violation being bypassed.
    pub violation: ViolationDescriptor,
    /// Who asked.
    pub requester: String,
    /// Lifecycle status.
    pub status: OverrideStatus,
    /// Accumulated denials for this task.
    pub denial_count: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
    /// End of the validity window; set on approval.
    pub expires_at: Option<DateTime<Utc>>,
    /// Who decided.
    pub decided_by: Option<String>,
    /// Decision justification.
    pub justification: Option<String>,
}

/// Counters exposed by [`OverrideWorkflow::stats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideStats {
    /// Requests awaiting a decision.
    pub pending_requests: usize,
    /// Approved, not yet consumed or expired.
    pub approved_overrides: usize,
    /// Denied requests.
    pub denied_requests: usize,
    /// Creations inside the current rolling hour.
    pub usage_this_hour: u32,
}

struct WorkflowState {
    pending: HashMap<String, OverrideRequest>,
    approved: HashMap<String, OverrideRequest>,
    denied: HashMap<String, OverrideRequest>,
    /// Creation timestamps inside the rolling hour.
    window: VecDeque<DateTime<Utc>>,
    /// Denials accumulated per task id.
    denials_by_task: HashMap<String, u32>,
}

/// Owner of all override state. All mutation runs under one mutex so
/// the rate-limit check-and-increment is atomic under concurrency.
pub struct OverrideWorkflow {
    config: OverrideConfig,
    ids: Arc<dyn IdGenerator>,
    state: Mutex<WorkflowState>,
}

impl OverrideWorkflow {
    /// Workflow with the given config and id source.
    pub fn new(config: OverrideConfig, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            config,
            ids,
            state: Mutex::new(WorkflowState {
                pending: HashMap::new(),
                approved: HashMap::new(),
                denied: HashMap::new(),
                window: VecDeque::new(),
                denials_by_task: HashMap::new(),
            }),
        }
    }

    /// Workflow configuration.
    pub fn config(&self) -> &OverrideConfig {
        &self.config
    }

    fn prune_window(state: &mut WorkflowState, now: DateTime<Utc>) {
        let horizon = now - Duration::hours(1);
        while matches!(state.window.front(), Some(&ts) if ts <= horizon) {
            state.window.pop_front();
        }
    }

    /// Create a pending request for a violated task.
    pub fn create_request(
        &self,
        task_id: &str,
        violation: ViolationDescriptor,
        requester: &str,
    ) -> OrchestrationResult<OverrideRequest> {
        self.create_request_at(task_id, violation, requester, Utc::now())
    }

    /// Clock-explicit variant of [`Self::create_request`].
    pub fn create_request_at(
        &self,
        task_id: &str,
        violation: ViolationDescriptor,
        requester: &str,
        now: DateTime<Utc>,
    ) -> OrchestrationResult<OverrideRequest> {
        let mut state = self.state.lock().unwrap();
        Self::prune_window(&mut state, now);
        let used = state.window.len() as u32;
        if used >= self.config.max_per_hour {
            return Err(OrchestrationError::RateLimitExceeded {
                used,
                limit: self.config.max_per_hour,
            });
        }
        state.window.push_back(now);

        let request = OverrideRequest {
            id: self.ids.next_id("override"),
            task_id: task_id.to_string(),
            violation,
            requester: requester.to_string(),
            status: OverrideStatus::Pending,
            denial_count: *state.denials_by_task.get(task_id).unwrap_or(&0),
            created_at: now,
            updated_at: now,
            expires_at: None,
            decided_by: None,
            justification: None,
        };
        info!(request = %request.id, task = %request.task_id, "override request created");
        state.pending.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    /// Decide a pending request. A request is decided exactly once;
    /// re-deciding fails with `InvalidState`.
    pub fn process_decision(
        &self,
        request_id: &str,
        decision: OverrideDecision,
        approver: &str,
        justification: &str,
    ) -> OrchestrationResult<OverrideRequest> {
        self.process_decision_at(request_id, decision, approver, justification, Utc::now())
    }

    /// Clock-explicit variant of [`Self::process_decision`].
    pub fn process_decision_at(
        &self,
        request_id: &str,
        decision: OverrideDecision,
        approver: &str,
        justification: &str,
        now: DateTime<Utc>,
    ) -> OrchestrationResult<OverrideRequest> {
        let mut state = self.state.lock().unwrap();
        let Some(mut request) = state.pending.remove(request_id) else {
            let status = if state.approved.contains_key(request_id) {
                "already approved"
            } else if state.denied.contains_key(request_id) {
                "already denied"
            } else {
                "unknown request"
            };
            return Err(OrchestrationError::InvalidState(format!(
                "override {request_id} is not pending ({status})"
            )));
        };

        request.updated_at = now;
        request.decided_by = Some(approver.to_string());
        request.justification = Some(justification.to_string());

        match decision {
            OverrideDecision::Approve => {
                request.status = OverrideStatus::Approved;
                request.expires_at = Some(now + Duration::hours(self.config.validity_hours));
                info!(request = %request.id, approver, "override approved");
                state.approved.insert(request.id.clone(), request.clone());
            }
            OverrideDecision::Deny => {
                request.status = OverrideStatus::Denied;
                let count = state
                    .denials_by_task
                    .entry(request.task_id.clone())
                    .or_insert(0);
                *count += 1;
                request.denial_count = *count;
                if *count >= self.config.escalation_threshold {
                    warn!(
                        task = %request.task_id,
                        denials = *count,
                        "repeated override denials, flag for manual escalation"
                    );
                }
                state.denied.insert(request.id.clone(), request.clone());
            }
        }
        Ok(request)
    }

    /// Validate an override for resubmission of `task_id` and consume
    /// it. Succeeds only when the override is approved, matches the
    /// task, and is strictly inside its validity window; an approved
    /// override authorizes exactly one resubmission.
    pub fn validate_and_consume(
        &self,
        task_id: &str,
        override_id: &str,
    ) -> OrchestrationResult<OverrideRequest> {
        self.validate_and_consume_at(task_id, override_id, Utc::now())
    }

    /// Clock-explicit variant of [`Self::validate_and_consume`].
    pub fn validate_and_consume_at(
        &self,
        task_id: &str,
        override_id: &str,
        now: DateTime<Utc>,
    ) -> OrchestrationResult<OverrideRequest> {
        let mut state = self.state.lock().unwrap();
        let Some(mut request) = state.approved.remove(override_id) else {
            return Err(OrchestrationError::ExpiredOverride(format!(
                "override {override_id} is not in the approved set"
            )));
        };
        if request.task_id != task_id {
            // A mismatch must not consume the override.
            state.approved.insert(override_id.to_string(), request);
            return Err(OrchestrationError::ExpiredOverride(format!(
                "override {override_id} does not match task {task_id}"
            )));
        }
        match request.expires_at {
            Some(expires) if expires > now => {
                request.updated_at = now;
                info!(request = %request.id, task = %task_id, "override consumed");
                Ok(request)
            }
            expires_at => {
                // Invalid at read time; it stays out of the approved set.
                request.status = OverrideStatus::Expired;
                warn!(request = %request.id, task = %task_id, "override past its validity window");
                Err(OrchestrationError::ExpiredOverride(format!(
                    "override {override_id} expired at {expires_at:?}"
                )))
            }
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> OverrideStats {
        self.stats_at(Utc::now())
    }

    /// Clock-explicit variant of [`Self::stats`].
    pub fn stats_at(&self, now: DateTime<Utc>) -> OverrideStats {
        let mut state = self.state.lock().unwrap();
        Self::prune_window(&mut state, now);
        OverrideStats {
            pending_requests: state.pending.len(),
            approved_overrides: state.approved.len(),
            denied_requests: state.denied.len(),
            usage_this_hour: state.window.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UuidIdGenerator;

    fn violation() -> ViolationDescriptor {
        ViolationDescriptor {
            reason: "computation task must declare resource limits".to_string(),
            severity: Severity::Low,
            kind: ViolationKind::MissingResourceLimits,
        }
    }

    fn workflow() -> OverrideWorkflow {
        OverrideWorkflow::new(OverrideConfig::default(), Arc::new(UuidIdGenerator))
    }

    #[test]
    fn test_create_and_approve() {
        let wf = workflow();
        let request = wf.create_request("t-1", violation(), "alice").unwrap();
        assert_eq!(request.status, OverrideStatus::Pending);
        assert!(request.expires_at.is_none());

        let decided = wf
            .process_decision(&request.id, OverrideDecision::Approve, "bob", "one-off batch")
            .unwrap();
        assert_eq!(decided.status, OverrideStatus::Approved);
        assert!(decided.expires_at.is_some());
        assert_eq!(decided.decided_by.as_deref(), Some("bob"));

        let stats = wf.stats();
        assert_eq!(stats.pending_requests, 0);
        assert_eq!(stats.approved_overrides, 1);
    }

    #[test]
    fn test_rate_limit_rolls_over() {
        let wf = workflow();
        let t0 = Utc::now();
        for i in 0..5 {
            wf.create_request_at(&format!("t-{i}"), violation(), "alice", t0)
                .unwrap();
        }
        // 6th inside the hour is throttled.
        let err = wf
            .create_request_at("t-6", violation(), "alice", t0 + Duration::minutes(30))
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestrationError::RateLimitExceeded { used: 5, limit: 5 }
        ));

        // After the window rolls past the first five, creation succeeds.
        let later = t0 + Duration::minutes(61);
        wf.create_request_at("t-6", violation(), "alice", later).unwrap();
        assert_eq!(wf.stats_at(later).usage_this_hour, 1);
    }

    #[test]
    fn test_decide_exactly_once() {
        let wf = workflow();
        let request = wf.create_request("t-1", violation(), "alice").unwrap();
        wf.process_decision(&request.id, OverrideDecision::Deny, "bob", "no")
            .unwrap();

        let err = wf
            .process_decision(&request.id, OverrideDecision::Approve, "bob", "changed my mind")
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidState(_)));

        let err = wf
            .process_decision("ghost", OverrideDecision::Approve, "bob", "?")
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidState(_)));
    }

    #[test]
    fn test_denial_escalation_counter() {
        let wf = workflow();
        let mut last = None;
        let t0 = Utc::now();
        for _ in 0..3 {
            let request = wf.create_request_at("t-1", violation(), "alice", t0).unwrap();
            last = Some(
                wf.process_decision(&request.id, OverrideDecision::Deny, "bob", "no")
                    .unwrap(),
            );
        }
        // Third denial for the same task reaches the escalation
        // threshold; the count is carried on the request.
        assert_eq!(last.unwrap().denial_count, 3);
        assert_eq!(wf.stats().denied_requests, 3);
    }

    #[test]
    fn test_expiry_boundary() {
        let wf = workflow();
        let t0 = Utc::now();
        let request = wf.create_request_at("t-1", violation(), "alice", t0).unwrap();
        wf.process_decision_at(&request.id, OverrideDecision::Approve, "bob", "ok", t0)
            .unwrap();

        // 23h59m: still valid — but don't consume yet, so reuse state.
        let wf2 = workflow();
        let request2 = wf2.create_request_at("t-1", violation(), "alice", t0).unwrap();
        wf2.process_decision_at(&request2.id, OverrideDecision::Approve, "bob", "ok", t0)
            .unwrap();

        let almost = t0 + Duration::hours(23) + Duration::minutes(59);
        wf.validate_and_consume_at("t-1", &request.id, almost).unwrap();

        let past = t0 + Duration::hours(24) + Duration::minutes(1);
        let err = wf2
            .validate_and_consume_at("t-1", &request2.id, past)
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::ExpiredOverride(_)));
    }

    #[test]
    fn test_single_use_consumption() {
        let wf = workflow();
        let request = wf.create_request("t-1", violation(), "alice").unwrap();
        wf.process_decision(&request.id, OverrideDecision::Approve, "bob", "ok")
            .unwrap();

        wf.validate_and_consume("t-1", &request.id).unwrap();
        // Second use fails: an approved override authorizes exactly one
        // resubmission.
        let err = wf.validate_and_consume("t-1", &request.id).unwrap_err();
        assert!(matches!(err, OrchestrationError::ExpiredOverride(_)));
    }

    #[test]
    fn test_task_mismatch_rejected() {
        let wf = workflow();
        let request = wf.create_request("t-1", violation(), "alice").unwrap();
        wf.process_decision(&request.id, OverrideDecision::Approve, "bob", "ok")
            .unwrap();

        let err = wf.validate_and_consume("t-2", &request.id).unwrap_err();
        assert!(matches!(err, OrchestrationError::ExpiredOverride(_)));
        // The mismatch must not consume the override.
        wf.validate_and_consume("t-1", &request.id).unwrap();
    }
}
