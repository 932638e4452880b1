//! Orchestrator — the single entry point tying the pipeline together.
//!
//! `submit_task` runs compliance first, then routes: debate for
//! contested tasks, multi-factor direct selection otherwise, with the
//! bandit selector as a fallback when scoring cannot discriminate.
//! Every submission terminates with an assignment, an override token,
//! an arbitration verdict, or a typed error. Nothing disappears.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::arbitration::{self, ArbitrationEngine, Verdict, VerdictDisposition};
use crate::audit::{self, AuditEvent, AuditLogger, TracingAuditLogger};
use crate::compliance::{
    ComplianceGate, ComplianceReport, OverrideConfig, OverrideDecision, OverrideRequest,
    OverrideStats, OverrideWorkflow, Severity, ViolationDescriptor,
};
use crate::debate::state::VotePosition;
use crate::debate::{ArgumentSource, DebateConfig, DebateCoordinator};
use crate::directory::{CapabilityFilter, PerformanceOutcome};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::events::{EventBus, RoutingEvent, SharedEventBus};
use crate::resilience::{ClientStatus, ResilientDirectoryClient};
use crate::selector::{
    AdaptiveSelector, MultiFactorScorer, ScoreContext, ScoringWeights, SelectorConfig,
};
use crate::types::{AgentProfile, Assignment, IdGenerator, Task, TaskType, UuidIdGenerator};

/// Top-level configuration, one section per subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrchestratorConfig {
    /// Bandit selector tunables.
    pub selector: SelectorConfig,
    /// Multi-factor composite weights.
    pub weights: ScoringWeights,
    /// Debate protocol tunables.
    pub debate: DebateConfig,
    /// Override workflow tunables.
    pub overrides: OverrideConfig,
    /// Rule identifiers handed to the arbitration engine on escalation.
    pub arbitration_rules: Vec<String>,
    /// Panel identities handed to the arbitration engine on escalation.
    pub arbitration_participants: Vec<String>,
}

/// How a submission left the pipeline. Exactly one of the option fields
/// is populated.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// The submitted task.
    pub task_id: String,
    /// Created assignment, when the task was routed.
    pub assignment: Option<Assignment>,
    /// Pending override token, when the compliance gate blocked the
    /// task and the override workflow took it.
    pub override_required: Option<String>,
    /// Arbitration verdict, when the violation escalated to
    /// constitutional review and the verdict stopped routing.
    pub verdict: Option<Verdict>,
}

impl SubmitOutcome {
    fn assigned(task_id: &str, assignment: Assignment) -> Self {
        Self {
            task_id: task_id.to_string(),
            assignment: Some(assignment),
            override_required: None,
            verdict: None,
        }
    }
}

/// The orchestration entry point. Owns one instance of every pipeline
/// component; external collaborators (directory, arbitration, argument
/// source, audit sink) are injected.
pub struct Orchestrator {
    config: OrchestratorConfig,
    client: Arc<ResilientDirectoryClient>,
    selector: AdaptiveSelector,
    scorer: MultiFactorScorer,
    gate: ComplianceGate,
    overrides: OverrideWorkflow,
    debate: DebateCoordinator,
    debate_source: Option<Arc<dyn ArgumentSource>>,
    arbitration: Option<Arc<dyn ArbitrationEngine>>,
    audit: Arc<dyn AuditLogger>,
    events: SharedEventBus,
    ids: Arc<dyn IdGenerator>,
}

impl Orchestrator {
    /// Orchestrator over the given directory client, with UUID ids and
    /// the tracing audit sink. Collaborators are attached with the
    /// `with_*` builders.
    pub fn new(config: OrchestratorConfig, client: Arc<ResilientDirectoryClient>) -> Self {
        Self::with_ids(config, client, Arc::new(UuidIdGenerator))
    }

    /// Orchestrator with an explicit id source, for deterministic tests.
    pub fn with_ids(
        config: OrchestratorConfig,
        client: Arc<ResilientDirectoryClient>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let selector = AdaptiveSelector::new(config.selector.clone());
        let scorer = MultiFactorScorer::with_weights(config.weights.clone());
        let overrides = OverrideWorkflow::new(config.overrides.clone(), ids.clone());
        let debate = DebateCoordinator::new(config.debate.clone(), client.clone(), ids.clone());
        Self {
            config,
            client,
            selector,
            scorer,
            gate: ComplianceGate::new(),
            overrides,
            debate,
            debate_source: None,
            arbitration: None,
            audit: Arc::new(TracingAuditLogger),
            events: EventBus::new().shared(),
            ids,
        }
    }

    /// Attach the argument source backing debate participants. Without
    /// one, the debate path is unavailable and routing goes direct.
    pub fn with_debate_source(mut self, source: Arc<dyn ArgumentSource>) -> Self {
        self.debate_source = Some(source);
        self
    }

    /// Attach the arbitration engine used for constitutional review.
    pub fn with_arbitration(mut self, engine: Arc<dyn ArbitrationEngine>) -> Self {
        self.arbitration = Some(engine);
        self
    }

    /// Replace the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// Replace the internal event bus with a shared one, so collaborators
    /// holding the same bus (e.g. the directory client) publish alongside
    /// routing events.
    pub fn with_events(mut self, events: SharedEventBus) -> Self {
        self.events = events;
        self
    }

    /// The event bus carrying routing events.
    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    /// Submit a task to the full pipeline.
    pub async fn submit_task(&self, task: &Task) -> OrchestrationResult<SubmitOutcome> {
        self.events.publish(RoutingEvent::TaskSubmitted {
            task_id: task.id.clone(),
            task_type: task.task_type.to_string(),
            timestamp: Utc::now(),
        });
        audit::record(
            self.audit.as_ref(),
            AuditEvent::now("task_submitted", Some(&task.id), "orchestrator", &task.description),
        );

        let report = self.gate.check_compliance(task);
        if !report.compliant {
            return self.handle_violation(task, &report).await;
        }

        let assignment = self.route(task).await?;
        Ok(SubmitOutcome::assigned(&task.id, assignment))
    }

    /// Non-compliance outcomes, in priority order: override workflow,
    /// constitutional review, log-and-proceed.
    async fn handle_violation(
        &self,
        task: &Task,
        report: &ComplianceReport,
    ) -> OrchestrationResult<SubmitOutcome> {
        let severity = report.severity().unwrap_or(Severity::Low);
        self.events.publish(RoutingEvent::ComplianceBlocked {
            task_id: task.id.clone(),
            severity: severity.to_string(),
            summary: report.summary(),
            timestamp: Utc::now(),
        });

        let descriptor = ViolationDescriptor {
            reason: report.summary(),
            severity,
            kind: report.violations[0].kind,
        };

        if self.overrides.config().enabled {
            let request = self
                .overrides
                .create_request(&task.id, descriptor, "orchestrator")?;
            self.events.publish(RoutingEvent::OverrideCreated {
                task_id: task.id.clone(),
                override_id: request.id.clone(),
                timestamp: Utc::now(),
            });
            audit::record(
                self.audit.as_ref(),
                AuditEvent::now("override_created", Some(&task.id), "orchestrator", &request.id),
            );
            return Ok(SubmitOutcome {
                task_id: task.id.clone(),
                assignment: None,
                override_required: Some(request.id),
                verdict: None,
            });
        }

        if self.overrides.config().constitutional_review {
            let Some(engine) = &self.arbitration else {
                return Err(OrchestrationError::ComplianceViolation {
                    reason: report.summary(),
                    severity: severity.to_string(),
                });
            };
            let verdict = arbitration::escalate(
                engine.as_ref(),
                &task.id,
                &descriptor,
                &self.config.arbitration_rules,
                &self.config.arbitration_participants,
                "orchestrator",
            )
            .await?;
            self.events.publish(RoutingEvent::EscalatedToArbitration {
                task_id: task.id.clone(),
                verdict: verdict.disposition.to_string(),
                timestamp: Utc::now(),
            });
            audit::record(
                self.audit.as_ref(),
                AuditEvent::now("arbitration_verdict", Some(&task.id), &verdict.actor, &verdict.rationale),
            );
            if verdict.disposition == VerdictDisposition::Permitted {
                let assignment = self.route(task).await?;
                return Ok(SubmitOutcome::assigned(&task.id, assignment));
            }
            return Ok(SubmitOutcome {
                task_id: task.id.clone(),
                assignment: None,
                override_required: None,
                verdict: Some(verdict),
            });
        }

        warn!(task = %task.id, severity = %severity, "violation logged, routing anyway");
        audit::record(
            self.audit.as_ref(),
            AuditEvent::now("violation_logged", Some(&task.id), "orchestrator", &report.summary()),
        );
        let assignment = self.route(task).await?;
        Ok(SubmitOutcome::assigned(&task.id, assignment))
    }

    /// Route a task that has cleared (or been allowed past) compliance.
    async fn route(&self, task: &Task) -> OrchestrationResult<Assignment> {
        if self.debate.should_debate(task) {
            match self.run_debate(task).await {
                Ok(Some(assignment)) => return Ok(assignment),
                Ok(None) => {
                    debug!(task = %task.id, "debate produced no assignable agent, going direct");
                }
                Err(OrchestrationError::DebateUnavailable(reason)) => {
                    warn!(task = %task.id, reason, "debate path failed, going direct");
                    self.events.publish(RoutingEvent::DebateFellBack {
                        task_id: task.id.clone(),
                        reason,
                        timestamp: Utc::now(),
                    });
                }
                Err(other) => return Err(other),
            }
        }
        self.route_direct(task).await
    }

    /// Debate routing: run a session and assign to the consensus agent.
    /// `Ok(None)` means the session completed without an assignable
    /// outcome (placeholder-only pool, or the position carried against).
    async fn run_debate(&self, task: &Task) -> OrchestrationResult<Option<Assignment>> {
        let Some(source) = &self.debate_source else {
            return Err(OrchestrationError::DebateUnavailable(
                "no argument source configured".to_string(),
            ));
        };

        let mut session = self.debate.run(task, source.as_ref()).await?;
        self.events.publish(RoutingEvent::DebateStarted {
            task_id: task.id.clone(),
            session_id: session.id.clone(),
            participants: session.participants.len(),
            timestamp: session.created_at,
        });

        let mut winner = None;
        if let Some(consensus) = &session.consensus {
            self.events.publish(RoutingEvent::DebateConsensus {
                task_id: task.id.clone(),
                session_id: session.id.clone(),
                outcome: consensus.outcome.to_string(),
                confidence: consensus.confidence,
                timestamp: Utc::now(),
            });
            // A "for" position assigns through the debate even at low
            // confidence; the confidence label travels on the consensus
            // event. Anything else degrades to direct selection.
            if consensus.outcome == VotePosition::For {
                winner = self
                    .debate
                    .chosen_agent(&session)
                    .map(|p| p.agent_id.clone());
            }
        }
        // The session is read out; close it so its lifecycle is complete.
        self.debate.close(&mut session);

        match winner {
            Some(agent_id) => Ok(Some(self.assign(task, &agent_id, "debate").await)),
            None => Ok(None),
        }
    }

    /// Direct routing: rank compliant candidates with the multi-factor
    /// scorer; when scoring cannot separate them, let the bandit pick.
    async fn route_direct(&self, task: &Task) -> OrchestrationResult<Assignment> {
        let candidates = self
            .client
            .query(&CapabilityFilter::for_task_type(task.task_type))
            .await?;

        let compliant: Vec<AgentProfile> = candidates
            .into_iter()
            .filter(|agent| self.gate.check_assignment(task, agent))
            .collect();
        if compliant.is_empty() {
            return Err(OrchestrationError::NoCandidates(format!(
                "no compliant agents for task {} ({})",
                task.id, task.task_type
            )));
        }

        let ctx = ScoreContext::default();
        let ranked = self.scorer.rank(task, &compliant, &ctx);
        let top_score = self.scorer.score(task, &compliant[ranked[0]], &ctx);
        let degenerate = ranked
            .iter()
            .all(|&i| (self.scorer.score(task, &compliant[i], &ctx) - top_score).abs() < 1e-9);

        let (agent_id, strategy) = if degenerate && compliant.len() > 1 {
            // All composites equal: the learned selector discriminates
            // where the scorer cannot.
            let chosen = self.selector.select(&compliant, task.task_type)?;
            (chosen.id.clone(), "bandit")
        } else {
            (compliant[ranked[0]].id.clone(), "multi_factor")
        };
        Ok(self.assign(task, &agent_id, strategy).await)
    }

    async fn assign(&self, task: &Task, agent_id: &str, strategy: &str) -> Assignment {
        let assignment = Assignment::create(self.ids.next_id("assign"), task, agent_id);
        // Bump the agent's in-flight load so the next scoring pass sees
        // this assignment. Load feedback is advisory; a directory error
        // does not fail an already-made assignment.
        if let Err(err) = self.client.record_assignment(agent_id).await {
            warn!(agent = %agent_id, error = %err, "load increment failed");
        }
        info!(
            task = %task.id,
            agent = %agent_id,
            assignment = %assignment.id,
            strategy,
            "task assigned"
        );
        self.events.publish(RoutingEvent::AgentSelected {
            task_id: task.id.clone(),
            agent_id: agent_id.to_string(),
            strategy: strategy.to_string(),
            timestamp: Utc::now(),
        });
        self.events.publish(RoutingEvent::AssignmentCreated {
            task_id: task.id.clone(),
            assignment_id: assignment.id.clone(),
            agent_id: agent_id.to_string(),
            timestamp: assignment.created_at,
        });
        audit::record(
            self.audit.as_ref(),
            AuditEvent::now("assignment_created", Some(&task.id), "orchestrator", &assignment.id),
        );
        assignment
    }

    /// Decide a pending override request.
    pub fn process_override_decision(
        &self,
        request_id: &str,
        decision: OverrideDecision,
        approver: &str,
        justification: &str,
    ) -> OrchestrationResult<OverrideRequest> {
        let request = self
            .overrides
            .process_decision(request_id, decision, approver, justification)?;
        self.events.publish(RoutingEvent::OverrideDecided {
            override_id: request.id.clone(),
            approved: decision == OverrideDecision::Approve,
            approver: approver.to_string(),
            timestamp: Utc::now(),
        });
        audit::record(
            self.audit.as_ref(),
            AuditEvent::now(
                match decision {
                    OverrideDecision::Approve => "override_approved",
                    OverrideDecision::Deny => "override_denied",
                },
                Some(&request.task_id),
                approver,
                justification,
            ),
        );
        Ok(request)
    }

    /// Resubmit a blocked task under an approved override. The override
    /// is consumed; routing skips the compliance gate's content checks
    /// and goes straight to selection.
    pub async fn resubmit_task_with_override(
        &self,
        task: &Task,
        override_id: &str,
    ) -> OrchestrationResult<SubmitOutcome> {
        let consumed = self.overrides.validate_and_consume(&task.id, override_id)?;
        audit::record(
            self.audit.as_ref(),
            AuditEvent::now("override_consumed", Some(&task.id), &consumed.requester, &consumed.id),
        );
        let assignment = self.route(task).await?;
        Ok(SubmitOutcome::assigned(&task.id, assignment))
    }

    /// Override workflow counters.
    pub fn get_override_stats(&self) -> OverrideStats {
        self.overrides.stats()
    }

    /// Standalone bandit selection over a caller-supplied pool.
    pub fn select<'a>(
        &self,
        candidates: &'a [AgentProfile],
        task_type: TaskType,
    ) -> OrchestrationResult<&'a AgentProfile> {
        self.selector.select(candidates, task_type)
    }

    /// Feed a completed-task outcome back into the directory so future
    /// selections see updated averages.
    pub async fn record_outcome(
        &self,
        agent_id: &str,
        outcome: &PerformanceOutcome,
    ) -> OrchestrationResult<()> {
        self.client.update_performance(agent_id, outcome).await
    }

    /// Directory client status, including breaker counters and fallback
    /// visibility.
    pub fn directory_status(&self) -> ClientStatus {
        self.client.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NullAuditLogger;
    use crate::debate::state::{Argument, DebateRole, Evidence, Participant, Vote};
    use crate::directory::{AgentDirectory, FallbackRegistry};
    use crate::resilience::BreakerConfig;
    use crate::types::CapabilitySet;
    use async_trait::async_trait;

    struct AgreeableSource;

    #[async_trait]
    impl ArgumentSource for AgreeableSource {
        async fn argue(
            &self,
            participant: &Participant,
            _topic: &str,
            round: u32,
            _prior: &[Evidence],
        ) -> Result<Argument, String> {
            Ok(Argument {
                participant_id: participant.agent_id.clone(),
                text: format!("round {round}"),
                evidence: vec![],
                reasoning: "test".to_string(),
            })
        }

        async fn cast_vote(
            &self,
            participant: &Participant,
            _topic: &str,
            _evidence: &[Evidence],
        ) -> Result<Vote, String> {
            Ok(Vote {
                participant_id: participant.agent_id.clone(),
                position: VotePosition::For,
                confidence: 0.9,
                rationale: "test".to_string(),
            })
        }
    }

    fn agent(id: &str, task_type: TaskType, success_rate: f64, utilization: f64) -> AgentProfile {
        let mut profile = AgentProfile::new(
            id,
            CapabilitySet {
                task_types: vec![task_type],
                languages: vec!["rust".to_string()],
                specializations: vec![],
            },
        );
        profile.performance.success_rate = success_rate;
        profile.performance.avg_quality = success_rate;
        profile.performance.tasks_completed = 50;
        profile.load.utilization = utilization;
        profile
    }

    async fn registry_with(agents: Vec<AgentProfile>) -> Arc<FallbackRegistry> {
        let registry = Arc::new(FallbackRegistry::new());
        for profile in agents {
            registry.register(profile).await.unwrap();
        }
        registry
    }

    fn orchestrator_over(
        registry: Arc<FallbackRegistry>,
        source: Arc<dyn ArgumentSource>,
    ) -> Orchestrator {
        let client = Arc::new(ResilientDirectoryClient::new(
            registry,
            BreakerConfig::default(),
        ));
        Orchestrator::new(OrchestratorConfig::default(), client)
            .with_debate_source(source)
            .with_audit(Arc::new(NullAuditLogger))
    }

    async fn orchestrator_with(agents: Vec<AgentProfile>) -> Orchestrator {
        orchestrator_over(registry_with(agents).await, Arc::new(AgreeableSource))
    }

    #[tokio::test]
    async fn test_compliant_task_gets_assignment() {
        let orchestrator = orchestrator_with(vec![
            agent("strong", TaskType::General, 0.9, 0.1),
            agent("weak", TaskType::General, 0.3, 0.9),
        ])
        .await;

        let task = Task::new("t-1", TaskType::General, "summarize the release notes");
        let outcome = orchestrator.submit_task(&task).await.unwrap();

        let assignment = outcome.assignment.unwrap();
        assert_eq!(assignment.agent_id, "strong");
        assert!(outcome.override_required.is_none());
        assert!(outcome.verdict.is_none());
    }

    #[tokio::test]
    async fn test_blocked_task_yields_override_token() {
        let orchestrator =
            orchestrator_with(vec![agent("a", TaskType::Computation, 0.9, 0.1)]).await;

        // Computation without resource limits fails the gate.
        let task = Task::new("t-1", TaskType::Computation, "run the batch");
        let outcome = orchestrator.submit_task(&task).await.unwrap();

        assert!(outcome.assignment.is_none());
        let override_id = outcome.override_required.unwrap();
        assert_eq!(orchestrator.get_override_stats().pending_requests, 1);

        // Deny, then the stats reflect it.
        orchestrator
            .process_override_decision(&override_id, OverrideDecision::Deny, "bob", "no")
            .unwrap();
        assert_eq!(orchestrator.get_override_stats().denied_requests, 1);
    }

    #[tokio::test]
    async fn test_approved_override_resubmission() {
        let orchestrator =
            orchestrator_with(vec![agent("a", TaskType::Computation, 0.9, 0.1)]).await;

        let task = Task::new("t-1", TaskType::Computation, "run the batch");
        let outcome = orchestrator.submit_task(&task).await.unwrap();
        let override_id = outcome.override_required.unwrap();

        orchestrator
            .process_override_decision(&override_id, OverrideDecision::Approve, "bob", "one-off")
            .unwrap();

        let outcome = orchestrator
            .resubmit_task_with_override(&task, &override_id)
            .await
            .unwrap();
        assert_eq!(outcome.assignment.unwrap().agent_id, "a");

        // Consumed: a second resubmission fails.
        let err = orchestrator
            .resubmit_task_with_override(&task, &override_id)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::ExpiredOverride(_)));
    }

    #[tokio::test]
    async fn test_no_candidates_is_typed() {
        let orchestrator = orchestrator_with(vec![]).await;
        let task = Task::new("t-1", TaskType::General, "route me");
        let err = orchestrator.submit_task(&task).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::NoCandidates(_)));
    }

    #[tokio::test]
    async fn test_debate_triggered_by_complexity() {
        let orchestrator = orchestrator_with(vec![
            agent("a", TaskType::Analysis, 0.9, 0.1),
            agent("b", TaskType::Analysis, 0.8, 0.2),
            agent("c", TaskType::Analysis, 0.7, 0.3),
        ])
        .await;

        let mut task = Task::new("t-1", TaskType::Analysis, "redesign the storage layer");
        task.complexity = Some(0.9);
        let outcome = orchestrator.submit_task(&task).await.unwrap();
        assert!(outcome.assignment.is_some());

        let events = orchestrator.events().recent(usize::MAX);
        assert!(events
            .iter()
            .any(|e| e.event_type() == "debate_started"));
        assert!(events
            .iter()
            .any(|e| e.event_type() == "debate_consensus"));
    }

    #[tokio::test]
    async fn test_bandit_breaks_degenerate_scoring() {
        // Identical profiles make every composite equal; the bandit
        // must still land on a pool member.
        let orchestrator = orchestrator_with(vec![
            agent("a", TaskType::General, 0.5, 0.5),
            agent("b", TaskType::General, 0.5, 0.5),
        ])
        .await;

        let task = Task::new("t-1", TaskType::General, "route me");
        let outcome = orchestrator.submit_task(&task).await.unwrap();
        let chosen = outcome.assignment.unwrap().agent_id;
        assert!(chosen == "a" || chosen == "b");

        let events = orchestrator.events().recent(usize::MAX);
        let selected = events
            .iter()
            .find_map(|e| match e {
                RoutingEvent::AgentSelected { strategy, .. } => Some(strategy.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(selected, "bandit");
    }

    #[tokio::test]
    async fn test_assignments_feed_back_into_load() {
        let registry = registry_with(vec![agent("solo", TaskType::General, 0.8, 0.0)]).await;
        let orchestrator = orchestrator_over(registry.clone(), Arc::new(AgreeableSource));

        for n in 0..2 {
            let task = Task::new(&format!("t-{n}"), TaskType::General, "route me");
            orchestrator.submit_task(&task).await.unwrap();
        }

        // Routed work is visible as in-flight load, not left at the
        // registration-time snapshot.
        let agents = registry.query(&CapabilityFilter::default()).await.unwrap();
        assert_eq!(agents[0].load.active_tasks, 2);
        assert!((agents[0].load.utilization - 0.5).abs() < 1e-9);

        // A reported outcome releases one slot.
        orchestrator
            .record_outcome(
                "solo",
                &PerformanceOutcome {
                    success: true,
                    quality: 0.9,
                    latency_ms: 300,
                },
            )
            .await
            .unwrap();
        let agents = registry.query(&CapabilityFilter::default()).await.unwrap();
        assert_eq!(agents[0].load.active_tasks, 1);
    }

    #[tokio::test]
    async fn test_back_to_back_submissions_spread_load() {
        // Identical agents: the first pick bumps the chosen agent's
        // utilization, so the second pick must land on the idle one.
        let registry = registry_with(vec![
            agent("a", TaskType::General, 0.5, 0.0),
            agent("b", TaskType::General, 0.5, 0.0),
        ])
        .await;
        let orchestrator = orchestrator_over(registry, Arc::new(AgreeableSource));

        let first = orchestrator
            .submit_task(&Task::new("t-1", TaskType::General, "route me"))
            .await
            .unwrap()
            .assignment
            .unwrap();
        let second = orchestrator
            .submit_task(&Task::new("t-2", TaskType::General, "route me"))
            .await
            .unwrap()
            .assignment
            .unwrap();

        assert_ne!(first.agent_id, second.agent_id);
    }

    /// Critic votes against with high confidence; the "for" majority
    /// carries at low confidence.
    struct SplitSource;

    #[async_trait]
    impl ArgumentSource for SplitSource {
        async fn argue(
            &self,
            participant: &Participant,
            _topic: &str,
            round: u32,
            _prior: &[Evidence],
        ) -> Result<Argument, String> {
            Ok(Argument {
                participant_id: participant.agent_id.clone(),
                text: format!("round {round}"),
                evidence: vec![],
                reasoning: "test".to_string(),
            })
        }

        async fn cast_vote(
            &self,
            participant: &Participant,
            _topic: &str,
            _evidence: &[Evidence],
        ) -> Result<Vote, String> {
            let (position, confidence) = match participant.role {
                DebateRole::Critic => (VotePosition::Against, 0.9),
                _ => (VotePosition::For, 0.4),
            };
            Ok(Vote {
                participant_id: participant.agent_id.clone(),
                position,
                confidence,
                rationale: "test".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_low_confidence_majority_routes_through_debate() {
        let registry = registry_with(vec![
            agent("a", TaskType::Analysis, 0.9, 0.1),
            agent("b", TaskType::Analysis, 0.8, 0.2),
            agent("c", TaskType::Analysis, 0.7, 0.3),
        ])
        .await;
        let orchestrator = orchestrator_over(registry, Arc::new(SplitSource));

        let mut task = Task::new("t-1", TaskType::Analysis, "redesign the storage layer");
        task.complexity = Some(0.9);
        let outcome = orchestrator.submit_task(&task).await.unwrap();
        assert!(outcome.assignment.is_some());

        let events = orchestrator.events().recent(usize::MAX);
        let (consensus_outcome, confidence) = events
            .iter()
            .find_map(|e| match e {
                RoutingEvent::DebateConsensus {
                    outcome,
                    confidence,
                    ..
                } => Some((outcome.clone(), *confidence)),
                _ => None,
            })
            .unwrap();
        assert_eq!(consensus_outcome, "for");
        assert!(confidence < 0.7);

        // The assignment came out of the debate, not the direct path.
        let strategy = events
            .iter()
            .find_map(|e| match e {
                RoutingEvent::AgentSelected { strategy, .. } => Some(strategy.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(strategy, "debate");
    }

    #[tokio::test]
    async fn test_outcome_feedback_updates_directory() {
        let orchestrator = orchestrator_with(vec![agent("a", TaskType::General, 0.0, 0.0)]).await;
        orchestrator
            .record_outcome(
                "a",
                &PerformanceOutcome {
                    success: true,
                    quality: 0.9,
                    latency_ms: 200,
                },
            )
            .await
            .unwrap();
        assert!(!orchestrator.directory_status().using_fallback);
    }
}
