//! Routing event bus.
//!
//! Pub/sub over a Tokio broadcast channel with a bounded in-memory
//! history of recent events. Publishing is fire-and-forget: a bus with
//! no subscribers is not an error, and publish never aborts the
//! routing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// How many events the in-memory history retains
const HISTORY_CAPACITY: usize = 512;

/// Shared reference to the routing event bus
pub type SharedEventBus = Arc<EventBus>;

/// All routing pipeline events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingEvent {
    /// A task entered the pipeline
    TaskSubmitted {
        task_id: String,
        task_type: String,
        timestamp: DateTime<Utc>,
    },

    /// The compliance gate rejected a task
    ComplianceBlocked {
        task_id: String,
        severity: String,
        summary: String,
        timestamp: DateTime<Utc>,
    },

    /// An override request was opened for a blocked task
    OverrideCreated {
        task_id: String,
        override_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A pending override was decided
    OverrideDecided {
        override_id: String,
        approved: bool,
        approver: String,
        timestamp: DateTime<Utc>,
    },

    /// A debate session opened for a task
    DebateStarted {
        task_id: String,
        session_id: String,
        participants: usize,
        timestamp: DateTime<Utc>,
    },

    /// A debate session reached consensus
    DebateConsensus {
        task_id: String,
        session_id: String,
        outcome: String,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// The debate path failed and routing degraded to direct selection
    DebateFellBack {
        task_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent was chosen for a task
    AgentSelected {
        task_id: String,
        agent_id: String,
        strategy: String,
        timestamp: DateTime<Utc>,
    },

    /// An assignment record was created
    AssignmentCreated {
        task_id: String,
        assignment_id: String,
        agent_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A blocked task was escalated to constitutional arbitration
    EscalatedToArbitration {
        task_id: String,
        verdict: String,
        timestamp: DateTime<Utc>,
    },

    /// The directory client switched to its fallback registry
    FallbackEngaged {
        operation: String,
        timestamp: DateTime<Utc>,
    },
}

impl RoutingEvent {
    /// Snake_case tag for logging and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TaskSubmitted { .. } => "task_submitted",
            Self::ComplianceBlocked { .. } => "compliance_blocked",
            Self::OverrideCreated { .. } => "override_created",
            Self::OverrideDecided { .. } => "override_decided",
            Self::DebateStarted { .. } => "debate_started",
            Self::DebateConsensus { .. } => "debate_consensus",
            Self::DebateFellBack { .. } => "debate_fell_back",
            Self::AgentSelected { .. } => "agent_selected",
            Self::AssignmentCreated { .. } => "assignment_created",
            Self::EscalatedToArbitration { .. } => "escalated_to_arbitration",
            Self::FallbackEngaged { .. } => "fallback_engaged",
        }
    }

    /// Task id the event refers to, when it has one
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskSubmitted { task_id, .. }
            | Self::ComplianceBlocked { task_id, .. }
            | Self::OverrideCreated { task_id, .. }
            | Self::DebateStarted { task_id, .. }
            | Self::DebateConsensus { task_id, .. }
            | Self::DebateFellBack { task_id, .. }
            | Self::AgentSelected { task_id, .. }
            | Self::AssignmentCreated { task_id, .. }
            | Self::EscalatedToArbitration { task_id, .. } => Some(task_id),
            Self::OverrideDecided { .. } | Self::FallbackEngaged { .. } => None,
        }
    }

    /// Event timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::TaskSubmitted { timestamp, .. }
            | Self::ComplianceBlocked { timestamp, .. }
            | Self::OverrideCreated { timestamp, .. }
            | Self::OverrideDecided { timestamp, .. }
            | Self::DebateStarted { timestamp, .. }
            | Self::DebateConsensus { timestamp, .. }
            | Self::DebateFellBack { timestamp, .. }
            | Self::AgentSelected { timestamp, .. }
            | Self::AssignmentCreated { timestamp, .. }
            | Self::EscalatedToArbitration { timestamp, .. }
            | Self::FallbackEngaged { timestamp, .. } => *timestamp,
        }
    }
}

/// Event bus with broadcast fan-out and a bounded history ring
pub struct EventBus {
    sender: broadcast::Sender<RoutingEvent>,
    history: Mutex<VecDeque<RoutingEvent>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers and record it in history.
    /// No receivers is fine; nothing here fails.
    pub fn publish(&self, event: RoutingEvent) {
        let event_type = event.event_type();

        {
            let mut history = self.history.lock().unwrap();
            if history.len() == HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "event published"),
            Err(_) => debug!(event_type, "event published (no receivers)"),
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<RoutingEvent> {
        self.sender.subscribe()
    }

    /// Most recent events, oldest first, capped at `limit`
    pub fn recent(&self, limit: usize) -> Vec<RoutingEvent> {
        let history = self.history.lock().unwrap();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// Number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
