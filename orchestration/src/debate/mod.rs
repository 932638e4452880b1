//! Debate protocol — structured multi-agent consensus for contested or
//! complex tasks.
//!
//! ```text
//! Open → RoundActive ──→ EvidenceAggregated ──→ Voting → ConsensusFormed → Closed
//!          ▲                    │
//!          └────────────────────┘
//!            (N rounds, default 2)
//! ```
//!
//! Round *n+1* never begins before round *n*'s evidence aggregation
//! completes. Every failure in this module is recoverable: the
//! orchestrator degrades to direct single-agent selection.

pub mod consensus;
pub mod coordinator;
pub mod state;

pub use consensus::{Consensus, ConsensusConfig, ConsensusLabel};
pub use coordinator::{ArgumentSource, DebateConfig, DebateCoordinator};
pub use state::{
    Argument, DebatePhase, DebateRole, DebateSession, Evidence, Participant, Round, Vote,
    VotePosition,
};
