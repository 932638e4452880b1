//! Debate session state — phases, participants, rounds, and votes.
//!
//! Rounds are strictly ordered: round *n+1* cannot begin before round
//! *n*'s evidence aggregation completes. The session enforces this in
//! [`DebateSession::begin_round`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of a debate session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    /// Session created, participants not yet arguing.
    Open,
    /// A round is collecting arguments.
    RoundActive,
    /// The last round's evidence has been aggregated.
    EvidenceAggregated,
    /// Participants are casting votes.
    Voting,
    /// Consensus has been computed.
    ConsensusFormed,
    /// Session discarded; terminal.
    Closed,
}

impl DebatePhase {
    /// Whether this is the terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Phases reachable from this one.
    pub fn valid_transitions(self) -> &'static [DebatePhase] {
        match self {
            Self::Open => &[Self::RoundActive, Self::Closed],
            Self::RoundActive => &[Self::EvidenceAggregated, Self::Closed],
            Self::EvidenceAggregated => &[Self::RoundActive, Self::Voting, Self::Closed],
            Self::Voting => &[Self::ConsensusFormed, Self::Closed],
            Self::ConsensusFormed => &[Self::Closed],
            Self::Closed => &[],
        }
    }
}

impl std::fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::RoundActive => write!(f, "round_active"),
            Self::EvidenceAggregated => write!(f, "evidence_aggregated"),
            Self::Voting => write!(f, "voting"),
            Self::ConsensusFormed => write!(f, "consensus_formed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Seat a participant occupies in the debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateRole {
    /// Lays out the problem and proposes an approach.
    Analyst,
    /// Attacks the proposal, surfaces risks.
    Critic,
    /// Reconciles the positions into a recommendation.
    Synthesizer,
}

impl DebateRole {
    /// All three seats, in fill order.
    pub fn all() -> &'static [DebateRole] {
        &[Self::Analyst, Self::Critic, Self::Synthesizer]
    }

    /// Capability names an agent should carry to fill this seat well.
    pub fn preferred_capabilities(self) -> &'static [&'static str] {
        match self {
            Self::Analyst => &["analysis", "planning"],
            Self::Critic => &["review", "risk-assessment"],
            Self::Synthesizer => &["synthesis", "arbitration"],
        }
    }
}

impl std::fmt::Display for DebateRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analyst => write!(f, "analyst"),
            Self::Critic => write!(f, "critic"),
            Self::Synthesizer => write!(f, "synthesizer"),
        }
    }
}

/// One seat-holder in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Agent id, or a synthesized id for placeholder seats.
    pub agent_id: String,
    /// Seat.
    pub role: DebateRole,
    /// Vote weight.
    pub weight: f64,
    /// Whether this seat was filled by a synthesized placeholder
    /// because the real agent pool was too thin.
    pub placeholder: bool,
}

/// A piece of supporting evidence attached to an argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// The evidence text.
    pub content: String,
    /// Where it came from.
    pub source: String,
    /// Credibility score (0.0–1.0).
    pub credibility: f64,
    /// Whether the evidence has been verified.
    pub verified: bool,
}

/// One participant's contribution to a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argument {
    /// Contributing participant.
    pub participant_id: String,
    /// The argument text.
    pub text: String,
    /// Supporting evidence.
    pub evidence: Vec<Evidence>,
    /// Reasoning chain behind the argument.
    pub reasoning: String,
}

/// A debate round: per-participant arguments plus aggregated evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// Round number (1-indexed).
    pub number: u32,
    /// Arguments collected this round.
    pub arguments: Vec<Argument>,
    /// Evidence aggregated after all arguments arrived. `None` until
    /// aggregation completes.
    pub aggregated_evidence: Option<Vec<Evidence>>,
}

impl Round {
    /// Whether evidence aggregation has completed for this round.
    pub fn is_aggregated(&self) -> bool {
        self.aggregated_evidence.is_some()
    }
}

/// Stance taken in a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePosition {
    /// Proceed with the proposal.
    For,
    /// Reject the proposal.
    Against,
    /// No position.
    Abstain,
}

impl std::fmt::Display for VotePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::For => write!(f, "for"),
            Self::Against => write!(f, "against"),
            Self::Abstain => write!(f, "abstain"),
        }
    }
}

/// One participant's vote. Each participant casts exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    /// Voting participant.
    pub participant_id: String,
    /// Stance.
    pub position: VotePosition,
    /// Confidence in the stance (0.0–1.0).
    pub confidence: f64,
    /// Why.
    pub rationale: String,
}

/// Invalid phase transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    /// Phase the session was in.
    pub from: DebatePhase,
    /// Phase that was requested.
    pub to: DebatePhase,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid debate transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// Previous phase.
    pub from: DebatePhase,
    /// New phase.
    pub to: DebatePhase,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// A debate session, mutated across rounds by the coordinator and
/// discarded once consensus is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateSession {
    /// Session id.
    pub id: String,
    /// Task that triggered the debate.
    pub task_id: String,
    /// Topic text under debate.
    pub topic: String,
    /// Current phase.
    pub phase: DebatePhase,
    /// Seat-holders.
    pub participants: Vec<Participant>,
    /// Completed and in-flight rounds, in order.
    pub rounds: Vec<Round>,
    /// Votes cast in the voting phase.
    pub votes: Vec<Vote>,
    /// Final consensus record, set once voting completes.
    pub consensus: Option<super::consensus::Consensus>,
    /// Transition history.
    pub transitions: Vec<PhaseTransition>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl DebateSession {
    /// Fresh session in the `Open` phase.
    pub fn new(id: String, task_id: &str, topic: &str) -> Self {
        Self {
            id,
            task_id: task_id.to_string(),
            topic: topic.to_string(),
            phase: DebatePhase::Open,
            participants: Vec::new(),
            rounds: Vec::new(),
            votes: Vec::new(),
            consensus: None,
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Move to `to`, recording the transition. Fails if `to` is not
    /// reachable from the current phase.
    pub fn transition(&mut self, to: DebatePhase) -> Result<(), InvalidTransition> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            at: Utc::now(),
        });
        self.phase = to;
        Ok(())
    }

    /// Open round `n+1`. Enforces the ordering invariant: the previous
    /// round must have completed evidence aggregation.
    pub fn begin_round(&mut self) -> Result<u32, InvalidTransition> {
        if let Some(last) = self.rounds.last() {
            if !last.is_aggregated() {
                return Err(InvalidTransition {
                    from: self.phase,
                    to: DebatePhase::RoundActive,
                });
            }
        }
        self.transition(DebatePhase::RoundActive)?;
        let number = self.rounds.len() as u32 + 1;
        self.rounds.push(Round {
            number,
            arguments: Vec::new(),
            aggregated_evidence: None,
        });
        Ok(number)
    }

    /// Aggregate the active round's evidence: concatenate all argument
    /// evidence and drop duplicates by content.
    pub fn complete_round(&mut self) -> Result<(), InvalidTransition> {
        self.transition(DebatePhase::EvidenceAggregated)?;
        if let Some(round) = self.rounds.last_mut() {
            let mut aggregated: Vec<Evidence> = Vec::new();
            for argument in &round.arguments {
                for evidence in &argument.evidence {
                    if !aggregated.iter().any(|e| e.content == evidence.content) {
                        aggregated.push(evidence.clone());
                    }
                }
            }
            round.aggregated_evidence = Some(aggregated);
        }
        Ok(())
    }

    /// All evidence aggregated so far, across completed rounds.
    pub fn evidence_so_far(&self) -> Vec<Evidence> {
        let mut all: Vec<Evidence> = Vec::new();
        for round in &self.rounds {
            if let Some(evidence) = &round.aggregated_evidence {
                for item in evidence {
                    if !all.iter().any(|e| e.content == item.content) {
                        all.push(item.clone());
                    }
                }
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> DebateSession {
        DebateSession::new("d-1".to_string(), "t-1", "should we shard the index")
    }

    fn argument(id: &str, evidence: &[&str]) -> Argument {
        Argument {
            participant_id: id.to_string(),
            text: format!("{id} argues"),
            evidence: evidence
                .iter()
                .map(|c| Evidence {
                    content: c.to_string(),
                    source: "bench".to_string(),
                    credibility: 0.8,
                    verified: true,
                })
                .collect(),
            reasoning: "measured".to_string(),
        }
    }

    #[test]
    fn test_phase_transitions() {
        let mut s = session();
        assert_eq!(s.phase, DebatePhase::Open);
        s.transition(DebatePhase::RoundActive).unwrap();
        s.transition(DebatePhase::EvidenceAggregated).unwrap();
        s.transition(DebatePhase::Voting).unwrap();
        s.transition(DebatePhase::ConsensusFormed).unwrap();
        s.transition(DebatePhase::Closed).unwrap();
        assert!(s.phase.is_terminal());
        assert_eq!(s.transitions.len(), 5);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut s = session();
        let err = s.transition(DebatePhase::Voting).unwrap_err();
        assert_eq!(err.from, DebatePhase::Open);
        assert_eq!(err.to, DebatePhase::Voting);
        // Terminal phase admits nothing.
        s.transition(DebatePhase::Closed).unwrap();
        assert!(s.transition(DebatePhase::RoundActive).is_err());
    }

    #[test]
    fn test_round_ordering_invariant() {
        let mut s = session();
        s.begin_round().unwrap();
        // Next round cannot begin before this round aggregates.
        assert!(s.begin_round().is_err());

        s.rounds.last_mut().unwrap().arguments.push(argument("a", &["e1"]));
        s.complete_round().unwrap();
        assert_eq!(s.begin_round().unwrap(), 2);
    }

    #[test]
    fn test_evidence_dedup_across_rounds() {
        let mut s = session();
        s.begin_round().unwrap();
        s.rounds.last_mut().unwrap().arguments.push(argument("a", &["e1", "e2"]));
        s.rounds.last_mut().unwrap().arguments.push(argument("b", &["e2", "e3"]));
        s.complete_round().unwrap();

        let round_evidence = s.rounds[0].aggregated_evidence.as_ref().unwrap();
        assert_eq!(round_evidence.len(), 3);

        s.begin_round().unwrap();
        s.rounds.last_mut().unwrap().arguments.push(argument("c", &["e3", "e4"]));
        s.complete_round().unwrap();

        let all = s.evidence_so_far();
        let contents: Vec<&str> = all.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["e1", "e2", "e3", "e4"]);
    }

    #[test]
    fn test_role_display_and_serde() {
        assert_eq!(DebateRole::Synthesizer.to_string(), "synthesizer");
        let json = serde_json::to_string(&VotePosition::Against).unwrap();
        assert_eq!(json, "\"against\"");
        assert_eq!(DebateRole::all().len(), 3);
    }
}
