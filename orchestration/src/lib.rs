//! Adaptive task-routing and arbitration core.
//!
//! This library routes submitted tasks to agents drawn from an external
//! directory:
//! - Compliance gate with a human-override workflow for rejections
//! - Epsilon-greedy/UCB bandit selection plus a multi-factor scorer
//! - Structured debate protocol for contested or complex tasks
//! - Circuit-breaker-protected directory client with a fallback
//!   registry
//! - Escalation to an external constitutional arbitration engine
//!
//! The [`orchestrator::Orchestrator`] is the entry point; everything
//! else is usable standalone.

pub mod arbitration;
pub mod audit;
pub mod compliance;
pub mod debate;
pub mod directory;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod resilience;
pub mod selector;
pub mod types;

pub use arbitration::{ArbitrationEngine, Verdict, VerdictDisposition};
pub use audit::{AuditEvent, AuditLogger, NullAuditLogger, TracingAuditLogger};
pub use compliance::{
    ComplianceGate, ComplianceReport, OverrideConfig, OverrideDecision, OverrideRequest,
    OverrideStats, OverrideStatus, OverrideWorkflow, Severity, ViolationKind,
};
pub use debate::{ArgumentSource, DebateConfig, DebateCoordinator, DebatePhase, DebateSession};
pub use directory::{AgentDirectory, CapabilityFilter, FallbackRegistry, PerformanceOutcome};
pub use error::{OrchestrationError, OrchestrationResult};
pub use events::{EventBus, RoutingEvent, SharedEventBus};
pub use orchestrator::{Orchestrator, OrchestratorConfig, SubmitOutcome};
pub use resilience::{
    BreakerConfig, BreakerStats, CircuitBreaker, CircuitState, ClientStatus,
    ResilientDirectoryClient,
};
pub use selector::{
    AdaptiveSelector, MultiFactorScorer, ScoreContext, ScoringWeights, SelectorConfig,
};
pub use types::{
    AgentLoad, AgentProfile, Assignment, AssignmentStatus, CapabilitySet, IdGenerator,
    PerformanceHistory, Task, TaskPriority, TaskType, UuidIdGenerator,
};
