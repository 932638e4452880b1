//! Debate coordinator — trigger predicate, participant selection, round
//! fan-out, and consensus formation.
//!
//! The coordinator never blocks a submission: a thin agent pool is
//! padded with synthesized placeholder participants, and any failure in
//! the debate path surfaces as `DebateUnavailable`, which the
//! orchestrator treats as a cue to fall back to direct selection.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::consensus::{self, ConsensusConfig};
use super::state::{
    Argument, DebatePhase, DebateRole, DebateSession, Evidence, Participant, Vote,
};
use crate::directory::CapabilityFilter;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::resilience::ResilientDirectoryClient;
use crate::types::{AgentProfile, IdGenerator, Task};

/// Coordinator tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateConfig {
    /// Rounds per session.
    pub rounds: u32,
    /// Consensus acceptance settings.
    pub consensus: ConsensusConfig,
    /// Seats to fill; padded with placeholders when the pool is thin.
    pub min_participants: usize,
    /// Caller-requested minimum agent count at or above which the
    /// debate protocol triggers.
    pub agent_count_threshold: u32,
    /// Complexity hint at or above which the debate protocol triggers.
    pub complexity_threshold: f64,
    /// Topic substrings (matched case-insensitively) that mark a task
    /// as controversial.
    pub controversial_terms: Vec<String>,
    /// Weight of capability overlap when ranking seat candidates.
    pub capability_weight: f64,
    /// Weight of historical success rate when ranking seat candidates.
    pub performance_weight: f64,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            rounds: 2,
            consensus: ConsensusConfig::default(),
            min_participants: 3,
            agent_count_threshold: 3,
            complexity_threshold: 0.7,
            controversial_terms: vec![
                "delete production".to_string(),
                "irreversible".to_string(),
                "schema migration".to_string(),
                "security policy".to_string(),
                "compliance exception".to_string(),
                "rollback".to_string(),
            ],
            capability_weight: 0.7,
            performance_weight: 0.3,
        }
    }
}

/// Produces arguments and votes for debate participants. Real agents
/// sit behind this seam; tests and placeholder seats use stubs.
#[async_trait]
pub trait ArgumentSource: Send + Sync {
    /// One argument for `participant` in the given round, with the
    /// evidence aggregated from earlier rounds available as context.
    async fn argue(
        &self,
        participant: &Participant,
        topic: &str,
        round: u32,
        prior_evidence: &[Evidence],
    ) -> Result<Argument, String>;

    /// The participant's single vote, cast after the final round.
    async fn cast_vote(
        &self,
        participant: &Participant,
        topic: &str,
        evidence: &[Evidence],
    ) -> Result<Vote, String>;
}

/// Orchestrates multi-agent consensus rounds.
pub struct DebateCoordinator {
    config: DebateConfig,
    client: Arc<ResilientDirectoryClient>,
    ids: Arc<dyn IdGenerator>,
}

impl DebateCoordinator {
    /// Coordinator over the given directory client.
    pub fn new(
        config: DebateConfig,
        client: Arc<ResilientDirectoryClient>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            config,
            client,
            ids,
        }
    }

    /// Trigger predicate, evaluated once per task before scoring.
    pub fn should_debate(&self, task: &Task) -> bool {
        if task.requires_debate {
            return true;
        }
        if task
            .complexity
            .is_some_and(|c| c >= self.config.complexity_threshold)
        {
            return true;
        }
        if task.min_agents.is_some_and(|n| n >= self.config.agent_count_threshold) {
            return true;
        }
        let description = task.description.to_lowercase();
        self.config
            .controversial_terms
            .iter()
            .any(|term| description.contains(&term.to_lowercase()))
    }

    /// Fill the three seats. Queries the directory for candidates; any
    /// shortfall (including a directory failure) is padded with
    /// deterministic placeholder participants, so debate initiation
    /// never blocks on a thin pool.
    pub async fn select_participants(&self, task: &Task) -> Vec<Participant> {
        let pool = match self.client.query(&CapabilityFilter::default()).await {
            Ok(agents) => agents,
            Err(err) => {
                warn!(task = %task.id, error = %err, "participant query failed, using placeholders");
                Vec::new()
            }
        };

        let mut participants: Vec<Participant> = Vec::new();
        let mut taken: Vec<String> = Vec::new();

        for &role in DebateRole::all() {
            let best = pool
                .iter()
                .filter(|agent| !taken.contains(&agent.id))
                .map(|agent| (agent, self.seat_score(agent, role)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            match best {
                Some((agent, _)) => {
                    taken.push(agent.id.clone());
                    participants.push(Participant {
                        agent_id: agent.id.clone(),
                        role,
                        weight: 1.0,
                        placeholder: false,
                    });
                }
                None => {
                    let id = self.ids.next_id(&format!("debate-{}-{}", task.id, role));
                    debug!(task = %task.id, %role, "seat filled by placeholder participant");
                    participants.push(Participant {
                        agent_id: id,
                        role,
                        weight: 1.0,
                        placeholder: true,
                    });
                }
            }
        }

        debug_assert!(participants.len() >= self.config.min_participants);
        participants
    }

    /// Seat fitness: capability overlap with the role's preferred set,
    /// weighted against historical success rate (70/30 by default).
    fn seat_score(&self, agent: &AgentProfile, role: DebateRole) -> f64 {
        let preferred = role.preferred_capabilities();
        let overlap = preferred
            .iter()
            .filter(|cap| {
                agent
                    .capabilities
                    .specializations
                    .iter()
                    .any(|s| s == *cap)
            })
            .count() as f64
            / preferred.len() as f64;
        self.config.capability_weight * overlap
            + self.config.performance_weight * agent.performance.success_rate
    }

    /// Run a full debate for `task`: N rounds of concurrent argument
    /// fan-out, evidence aggregation between rounds, one vote per
    /// participant, then consensus formation.
    ///
    /// Every failure maps to `DebateUnavailable` — recoverable by
    /// falling back to direct selection.
    pub async fn run(
        &self,
        task: &Task,
        source: &dyn ArgumentSource,
    ) -> OrchestrationResult<DebateSession> {
        let id = self.ids.next_id("debate");
        let mut session = DebateSession::new(id, &task.id, &task.description);
        session.participants = self.select_participants(task).await;

        for _ in 0..self.config.rounds {
            if let Err(err) = self.run_round(&mut session, source).await {
                session.transition(DebatePhase::Closed).ok();
                return Err(err);
            }
        }

        session
            .transition(DebatePhase::Voting)
            .map_err(|e| OrchestrationError::DebateUnavailable(e.to_string()))?;

        let evidence = session.evidence_so_far();
        let vote_futures = session
            .participants
            .iter()
            .map(|p| source.cast_vote(p, &session.topic, &evidence));
        let results = join_all(vote_futures).await;
        let mut collected = Vec::new();
        let mut failure = None;
        for (participant, result) in session.participants.iter().zip(results) {
            match result {
                Ok(mut vote) => {
                    vote.participant_id = participant.agent_id.clone();
                    collected.push(vote);
                }
                Err(reason) => {
                    failure = Some(format!(
                        "vote collection failed for {}: {reason}",
                        participant.agent_id
                    ));
                    break;
                }
            }
        }
        if let Some(reason) = failure {
            session.transition(DebatePhase::Closed).ok();
            return Err(OrchestrationError::DebateUnavailable(reason));
        }
        session.votes = collected;

        let consensus =
            consensus::evaluate(&session.votes, &session.participants, &self.config.consensus);
        let Some(consensus) = consensus else {
            session.transition(DebatePhase::Closed).ok();
            return Err(OrchestrationError::DebateUnavailable(
                "no usable votes".to_string(),
            ));
        };
        debug!(
            session = %session.id,
            outcome = %consensus.outcome,
            confidence = consensus.confidence,
            label = %consensus.label,
            "consensus formed"
        );
        session.consensus = Some(consensus);
        session
            .transition(DebatePhase::ConsensusFormed)
            .map_err(|e| OrchestrationError::DebateUnavailable(e.to_string()))?;
        Ok(session)
    }

    async fn run_round(
        &self,
        session: &mut DebateSession,
        source: &dyn ArgumentSource,
    ) -> OrchestrationResult<()> {
        let round = session
            .begin_round()
            .map_err(|e| OrchestrationError::DebateUnavailable(e.to_string()))?;
        let prior = session.evidence_so_far();

        // Per-round fan-out runs concurrently; aggregation waits for
        // every participant.
        let argue_futures = session
            .participants
            .iter()
            .map(|p| source.argue(p, &session.topic, round, &prior));
        let results = join_all(argue_futures).await;

        let mut arguments = Vec::new();
        for (participant, result) in session.participants.iter().zip(results) {
            match result {
                Ok(mut argument) => {
                    argument.participant_id = participant.agent_id.clone();
                    arguments.push(argument);
                }
                Err(reason) => {
                    return Err(OrchestrationError::DebateUnavailable(format!(
                        "argument from {} failed: {reason}",
                        participant.agent_id
                    )));
                }
            }
        }
        if let Some(active) = session.rounds.last_mut() {
            active.arguments = arguments;
        }
        session
            .complete_round()
            .map_err(|e| OrchestrationError::DebateUnavailable(e.to_string()))
    }

    /// Discard a session whose consensus has been read, completing the
    /// lifecycle. Closing an already-terminal session is a no-op.
    pub fn close(&self, session: &mut DebateSession) {
        if session.transition(DebatePhase::Closed).is_ok() {
            debug!(session = %session.id, "debate session closed");
        }
    }

    /// The participant an accepted consensus assigns the task to: the
    /// highest-weight real participant, synthesizer seat winning ties.
    pub fn chosen_agent<'a>(&self, session: &'a DebateSession) -> Option<&'a Participant> {
        session
            .participants
            .iter()
            .filter(|p| !p.placeholder)
            .max_by(|a, b| {
                a.weight
                    .partial_cmp(&b.weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        let rank = |r: DebateRole| match r {
                            DebateRole::Synthesizer => 2,
                            DebateRole::Analyst => 1,
                            DebateRole::Critic => 0,
                        };
                        rank(a.role).cmp(&rank(b.role))
                    })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::state::VotePosition;
    use crate::directory::{AgentDirectory, FallbackRegistry};
    use crate::resilience::BreakerConfig;
    use crate::types::{CapabilitySet, TaskType, UuidIdGenerator};

    /// Deterministic source: everyone argues once and votes "for" with
    /// fixed confidence.
    struct ScriptedSource {
        confidence: f64,
        fail_votes: bool,
    }

    #[async_trait]
    impl ArgumentSource for ScriptedSource {
        async fn argue(
            &self,
            participant: &Participant,
            _topic: &str,
            round: u32,
            _prior: &[Evidence],
        ) -> Result<Argument, String> {
            Ok(Argument {
                participant_id: participant.agent_id.clone(),
                text: format!("round {round} position"),
                evidence: vec![Evidence {
                    content: format!("{} evidence r{round}", participant.role),
                    source: "scripted".to_string(),
                    credibility: 0.9,
                    verified: true,
                }],
                reasoning: "scripted".to_string(),
            })
        }

        async fn cast_vote(
            &self,
            participant: &Participant,
            _topic: &str,
            _evidence: &[Evidence],
        ) -> Result<Vote, String> {
            if self.fail_votes {
                return Err("voting backend down".to_string());
            }
            Ok(Vote {
                participant_id: participant.agent_id.clone(),
                position: VotePosition::For,
                confidence: self.confidence,
                rationale: "scripted".to_string(),
            })
        }
    }

    fn coordinator(registry: Arc<FallbackRegistry>) -> DebateCoordinator {
        let client = Arc::new(ResilientDirectoryClient::new(
            registry,
            BreakerConfig::default(),
        ));
        DebateCoordinator::new(DebateConfig::default(), client, Arc::new(UuidIdGenerator))
    }

    fn specialist(id: &str, specialization: &str, success_rate: f64) -> crate::types::AgentProfile {
        let mut profile = crate::types::AgentProfile::new(
            id,
            CapabilitySet {
                task_types: vec![TaskType::Analysis],
                languages: vec![],
                specializations: vec![specialization.to_string()],
            },
        );
        profile.performance.success_rate = success_rate;
        profile.performance.tasks_completed = 50;
        profile
    }

    #[test]
    fn test_trigger_predicate() {
        let registry = Arc::new(FallbackRegistry::new());
        let coordinator = coordinator(registry);

        let mut task = Task::new("t", TaskType::Analysis, "routine cleanup");
        assert!(!coordinator.should_debate(&task));

        task.requires_debate = true;
        assert!(coordinator.should_debate(&task));
        task.requires_debate = false;

        task.complexity = Some(0.85);
        assert!(coordinator.should_debate(&task));
        task.complexity = Some(0.3);
        assert!(!coordinator.should_debate(&task));

        task.min_agents = Some(3);
        assert!(coordinator.should_debate(&task));
        task.min_agents = None;

        task.description = "plan the Schema Migration for billing".to_string();
        assert!(coordinator.should_debate(&task));
    }

    #[tokio::test]
    async fn test_placeholders_fill_empty_pool() {
        let registry = Arc::new(FallbackRegistry::new());
        let coordinator = coordinator(registry);
        let task = Task::new("t-77", TaskType::Analysis, "contested change");

        let participants = coordinator.select_participants(&task).await;
        assert_eq!(participants.len(), 3);
        assert!(participants.iter().all(|p| p.placeholder));
        // One seat per role, ids derived from the task.
        assert!(participants.iter().any(|p| p.role == DebateRole::Analyst));
        assert!(participants.iter().any(|p| p.role == DebateRole::Critic));
        assert!(participants
            .iter()
            .any(|p| p.role == DebateRole::Synthesizer));
        assert!(participants.iter().all(|p| p.agent_id.contains("t-77")));
    }

    #[tokio::test]
    async fn test_real_agents_take_matching_seats() {
        let registry = Arc::new(FallbackRegistry::new());
        registry
            .register(specialist("analyst-1", "analysis", 0.8))
            .await
            .unwrap();
        registry
            .register(specialist("critic-1", "review", 0.8))
            .await
            .unwrap();
        let coordinator = coordinator(registry);
        let task = Task::new("t", TaskType::Analysis, "contested change");

        let participants = coordinator.select_participants(&task).await;
        assert_eq!(participants.len(), 3);
        let analyst = participants
            .iter()
            .find(|p| p.role == DebateRole::Analyst)
            .unwrap();
        assert_eq!(analyst.agent_id, "analyst-1");
        assert!(!analyst.placeholder);
        // No agent is seated twice; the third seat is a placeholder.
        assert_eq!(
            participants.iter().filter(|p| p.placeholder).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_full_run_reaches_consensus() {
        let registry = Arc::new(FallbackRegistry::new());
        let coordinator = coordinator(registry);
        let task = Task::new("t", TaskType::Analysis, "contested change");
        let source = ScriptedSource {
            confidence: 0.9,
            fail_votes: false,
        };

        let session = coordinator.run(&task, &source).await.unwrap();
        assert_eq!(session.phase, DebatePhase::ConsensusFormed);
        assert_eq!(session.rounds.len(), 2);
        assert!(session.rounds.iter().all(|r| r.is_aggregated()));
        assert_eq!(session.votes.len(), 3);

        let consensus = session.consensus.as_ref().unwrap();
        assert_eq!(consensus.outcome, VotePosition::For);
        assert!(consensus.is_accepted());
        assert!((consensus.confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_close_after_consensus_read() {
        let registry = Arc::new(FallbackRegistry::new());
        let coordinator = coordinator(registry);
        let task = Task::new("t", TaskType::Analysis, "contested change");
        let source = ScriptedSource {
            confidence: 0.9,
            fail_votes: false,
        };

        let mut session = coordinator.run(&task, &source).await.unwrap();
        assert_eq!(session.phase, DebatePhase::ConsensusFormed);

        coordinator.close(&mut session);
        assert_eq!(session.phase, DebatePhase::Closed);
        assert!(session
            .transitions
            .iter()
            .any(|t| t.to == DebatePhase::Closed));

        // Idempotent on a terminal session.
        coordinator.close(&mut session);
        assert_eq!(session.phase, DebatePhase::Closed);
    }

    #[tokio::test]
    async fn test_vote_failure_degrades() {
        let registry = Arc::new(FallbackRegistry::new());
        let coordinator = coordinator(registry);
        let task = Task::new("t", TaskType::Analysis, "contested change");
        let source = ScriptedSource {
            confidence: 0.9,
            fail_votes: true,
        };

        let err = coordinator.run(&task, &source).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::DebateUnavailable(_)));
    }

    #[tokio::test]
    async fn test_chosen_agent_skips_placeholders() {
        let registry = Arc::new(FallbackRegistry::new());
        registry
            .register(specialist("synth-1", "synthesis", 0.9))
            .await
            .unwrap();
        let coordinator = coordinator(registry);
        let task = Task::new("t", TaskType::Analysis, "contested change");
        let source = ScriptedSource {
            confidence: 0.9,
            fail_votes: false,
        };

        let session = coordinator.run(&task, &source).await.unwrap();
        let chosen = coordinator.chosen_agent(&session).unwrap();
        assert_eq!(chosen.agent_id, "synth-1");
        assert!(!chosen.placeholder);
    }
}
