//! Weighted-vote consensus evaluation.
//!
//! Support for each position is the sum of `confidence × weight` over
//! its votes; the winning position's support divided by the total is
//! the session confidence. Below the acceptance threshold the result
//! degrades to a majority-count outcome with a low-confidence label.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::state::{Participant, Vote, VotePosition};

/// Consensus acceptance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Minimum session confidence for an accepted consensus.
    pub threshold: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self { threshold: 0.7 }
    }
}

/// How the consensus was formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusLabel {
    /// Weighted support cleared the threshold.
    Accepted,
    /// Threshold missed; outcome is the majority position by count.
    LowConfidence,
}

impl std::fmt::Display for ConsensusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::LowConfidence => write!(f, "low_confidence"),
        }
    }
}

/// Final consensus record for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consensus {
    /// Winning position.
    pub outcome: VotePosition,
    /// Winning support divided by total weighted support.
    pub confidence: f64,
    /// Whether the threshold was met.
    pub label: ConsensusLabel,
}

impl Consensus {
    /// Whether the consensus was accepted at full confidence.
    pub fn is_accepted(&self) -> bool {
        self.label == ConsensusLabel::Accepted
    }
}

/// Evaluate consensus over the session's votes. Returns `None` when no
/// votes were cast (the debate path treats that as unavailable).
pub fn evaluate(
    votes: &[Vote],
    participants: &[Participant],
    config: &ConsensusConfig,
) -> Option<Consensus> {
    if votes.is_empty() {
        return None;
    }

    let weight_of = |participant_id: &str| -> f64 {
        participants
            .iter()
            .find(|p| p.agent_id == participant_id)
            .map(|p| p.weight)
            .unwrap_or(1.0)
    };

    let mut support: HashMap<VotePosition, f64> = HashMap::new();
    let mut counts: HashMap<VotePosition, u32> = HashMap::new();
    let mut total = 0.0;
    for vote in votes {
        let weighted = vote.confidence * weight_of(&vote.participant_id);
        *support.entry(vote.position).or_insert(0.0) += weighted;
        *counts.entry(vote.position).or_insert(0) += 1;
        total += weighted;
    }
    if total <= 0.0 {
        return None;
    }

    let (winner, winner_support) = support
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(p, s)| (*p, *s))?;
    let confidence = winner_support / total;

    if confidence >= config.threshold {
        Some(Consensus {
            outcome: winner,
            confidence,
            label: ConsensusLabel::Accepted,
        })
    } else {
        // Majority by raw vote count, falling back to the weighted
        // winner on a tie.
        let majority = counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(p, _)| *p)
            .unwrap_or(winner);
        Some(Consensus {
            outcome: majority,
            confidence,
            label: ConsensusLabel::LowConfidence,
        })
    }
}
