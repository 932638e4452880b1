//! Constitutional arbitration contract.
//!
//! The engine itself lives outside this crate; rule evaluation and
//! precedent lookup are external concerns. This module defines the
//! async contract and the fixed escalation sequence the orchestrator
//! drives when a violation mandates constitutional review. Any step
//! failing is fatal for that submission, never for the orchestrator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compliance::ViolationDescriptor;
use crate::error::{OrchestrationError, OrchestrationResult};

/// An open arbitration session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationSession {
    /// Session id issued by the engine.
    pub id: String,
    /// Task under review.
    pub task_id: String,
    /// The violation that triggered review.
    pub violation: ViolationDescriptor,
    /// Rule identifiers in scope for this session.
    pub rules: Vec<String>,
    /// Participant identities consulted by the engine.
    pub participants: Vec<String>,
    /// When the session opened.
    pub opened_at: DateTime<Utc>,
}

/// Outcome of evaluating one rule against the violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEvaluation {
    /// Rule identifier.
    pub rule_id: String,
    /// Whether the rule applies to the violation.
    pub applicable: bool,
    /// Engine-provided finding text.
    pub finding: String,
}

/// A prior case the engine considers relevant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Precedent {
    /// Case identifier.
    pub case_id: String,
    /// Similarity to the current violation, in [0, 1].
    pub relevance: f64,
    /// Short description of the prior outcome.
    pub outcome: String,
}

/// Final disposition of an arbitration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictDisposition {
    /// The task may proceed to routing.
    Permitted,
    /// The task is rejected outright.
    Rejected,
    /// The task needs a human override before it can proceed.
    RequiresOverride,
}

impl std::fmt::Display for VerdictDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permitted => write!(f, "permitted"),
            Self::Rejected => write!(f, "rejected"),
            Self::RequiresOverride => write!(f, "requires_override"),
        }
    }
}

/// Verdict produced at the end of the sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Session the verdict closes.
    pub session_id: String,
    /// Disposition.
    pub disposition: VerdictDisposition,
    /// Engine rationale.
    pub rationale: String,
    /// Actor the verdict was generated for.
    pub actor: String,
    /// When the verdict was issued.
    pub issued_at: DateTime<Utc>,
}

/// External arbitration collaborator. Rule semantics and precedent
/// storage are the implementor's problem; the orchestrator only drives
/// the sequence.
#[async_trait]
pub trait ArbitrationEngine: Send + Sync {
    /// Open a session for a violated task.
    async fn start_session(
        &self,
        task_id: &str,
        violation: &ViolationDescriptor,
        rules: &[String],
        participants: &[String],
    ) -> Result<ArbitrationSession, String>;

    /// Evaluate the in-scope rules against the session's violation.
    async fn evaluate_rules(
        &self,
        session: &ArbitrationSession,
    ) -> Result<Vec<RuleEvaluation>, String>;

    /// Look up prior cases relevant to the session.
    async fn find_precedents(&self, session: &ArbitrationSession)
        -> Result<Vec<Precedent>, String>;

    /// Produce the verdict for the given actor.
    async fn generate_verdict(
        &self,
        session: &ArbitrationSession,
        actor: &str,
    ) -> Result<Verdict, String>;

    /// Close the session.
    async fn complete_session(&self, session: &ArbitrationSession) -> Result<(), String>;
}

/// Drive the full escalation sequence against an engine. The sequence
/// is fixed: start, evaluate rules, find precedents, generate verdict,
/// complete. The first failing step aborts the submission with
/// `ArbitrationFailed`.
pub async fn escalate(
    engine: &dyn ArbitrationEngine,
    task_id: &str,
    violation: &ViolationDescriptor,
    rules: &[String],
    participants: &[String],
    actor: &str,
) -> OrchestrationResult<Verdict> {
    let step = |stage: &str, detail: String| {
        OrchestrationError::ArbitrationFailed(format!("{stage}: {detail}"))
    };

    let session = engine
        .start_session(task_id, violation, rules, participants)
        .await
        .map_err(|e| step("start_session", e))?;
    debug!(session = %session.id, task = %task_id, "arbitration session opened");

    let evaluations = engine
        .evaluate_rules(&session)
        .await
        .map_err(|e| step("evaluate_rules", e))?;
    let precedents = engine
        .find_precedents(&session)
        .await
        .map_err(|e| step("find_precedents", e))?;
    debug!(
        session = %session.id,
        rules = evaluations.len(),
        precedents = precedents.len(),
        "arbitration evidence gathered"
    );

    let verdict = engine
        .generate_verdict(&session, actor)
        .await
        .map_err(|e| step("generate_verdict", e))?;
    engine
        .complete_session(&session)
        .await
        .map_err(|e| step("complete_session", e))?;

    info!(
        session = %session.id,
        task = %task_id,
        disposition = %verdict.disposition,
        "arbitration verdict issued"
    );
    Ok(verdict)
}
