//! Core data model — agent snapshots, tasks, and assignments.
//!
//! Agent profiles are owned by the external directory; this core only
//! reads snapshots of them. Tasks are immutable once submitted. An
//! assignment is created here and handed off to the execution layer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Compute-heavy batch work — must declare resource limits.
    Computation,
    /// Works on user or customer data — must declare privacy controls.
    DataProcessing,
    /// Produces code or patches.
    CodeGeneration,
    /// Evaluates existing artifacts.
    Review,
    /// Multi-step planning or analysis.
    Analysis,
    /// Anything else.
    General,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Computation => write!(f, "computation"),
            Self::DataProcessing => write!(f, "data_processing"),
            Self::CodeGeneration => write!(f, "code_generation"),
            Self::Review => write!(f, "review"),
            Self::Analysis => write!(f, "analysis"),
            Self::General => write!(f, "general"),
        }
    }
}

/// Task priority, highest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl TaskPriority {
    /// Execution timeout for an assignment at this priority, in minutes.
    pub fn timeout_minutes(self) -> i64 {
        match self {
            Self::Critical => 5,
            Self::High => 15,
            Self::Normal => 60,
            Self::Low => 240,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// What an agent is able to do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// Task types this agent can execute.
    pub task_types: Vec<TaskType>,
    /// Programming languages the agent works in.
    pub languages: Vec<String>,
    /// Free-form specializations (e.g. "distributed-systems", "privacy").
    pub specializations: Vec<String>,
}

impl CapabilitySet {
    /// Whether the agent can execute tasks of `task_type`.
    pub fn supports(&self, task_type: TaskType) -> bool {
        self.task_types.contains(&task_type)
    }

    /// Fraction of `required` capability names found in this set,
    /// matched against languages and specializations. Returns 1.0 when
    /// nothing is required.
    pub fn match_fraction(&self, required: &[String]) -> f64 {
        if required.is_empty() {
            return 1.0;
        }
        let matched = required
            .iter()
            .filter(|cap| {
                self.languages.iter().any(|l| l == *cap)
                    || self.specializations.iter().any(|s| s == *cap)
            })
            .count();
        matched as f64 / required.len() as f64
    }

    /// Whether every required capability name is covered.
    pub fn covers(&self, required: &[String]) -> bool {
        required.is_empty() || (self.match_fraction(required) - 1.0).abs() < f64::EPSILON
    }
}

/// Running performance averages maintained by the external directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceHistory {
    /// Fraction of completed tasks that succeeded (0.0–1.0).
    pub success_rate: f64,
    /// Average quality score of completed tasks (0.0–1.0).
    pub avg_quality: f64,
    /// Average completion latency in milliseconds. Reporting metadata
    /// only — never enters a selection score directly.
    pub avg_latency_ms: f64,
    /// Total tasks this agent has completed.
    pub tasks_completed: u64,
}

impl Default for PerformanceHistory {
    fn default() -> Self {
        Self {
            success_rate: 0.0,
            avg_quality: 0.0,
            avg_latency_ms: 0.0,
            tasks_completed: 0,
        }
    }
}

/// Current load on an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentLoad {
    /// Tasks currently executing.
    pub active_tasks: u32,
    /// Tasks waiting in the agent's queue.
    pub queued_tasks: u32,
    /// Utilization as a fraction of capacity (0.0–1.0).
    pub utilization: f64,
}

/// Snapshot of an agent as reported by the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Stable agent identifier.
    pub id: String,
    /// Capability set.
    pub capabilities: CapabilitySet,
    /// Performance history.
    pub performance: PerformanceHistory,
    /// Current load.
    pub load: AgentLoad,
    /// When the agent registered.
    pub registered_at: DateTime<Utc>,
    /// When the agent was last seen active.
    pub last_active_at: DateTime<Utc>,
}

impl AgentProfile {
    /// Minimal profile for a freshly registered agent.
    pub fn new(id: &str, capabilities: CapabilitySet) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            capabilities,
            performance: PerformanceHistory::default(),
            load: AgentLoad::default(),
            registered_at: now,
            last_active_at: now,
        }
    }
}

/// A unit of work submitted to the routing core. Immutable once
/// submitted; extension fields travel in `metadata` as opaque strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Caller-assigned task identifier.
    pub id: String,
    /// Kind of work.
    pub task_type: TaskType,
    /// Free-text description; scanned by the compliance gate.
    pub description: String,
    /// Priority.
    pub priority: TaskPriority,
    /// Capability names the assignee must cover.
    pub required_capabilities: Vec<String>,
    /// Caller-estimated complexity hint (0.0–1.0).
    pub complexity: Option<f64>,
    /// Caller explicitly requests the debate protocol.
    pub requires_debate: bool,
    /// Minimum agents the caller wants involved.
    pub min_agents: Option<u32>,
    /// Declared resource limits (required for computation tasks).
    pub resource_limits: Option<String>,
    /// Declared privacy controls (required for data-processing tasks).
    pub privacy_controls: Option<String>,
    /// Opaque passthrough fields.
    pub metadata: BTreeMap<String, String>,
}

impl Task {
    /// A task with defaults for all optional fields.
    pub fn new(id: &str, task_type: TaskType, description: &str) -> Self {
        Self {
            id: id.to_string(),
            task_type,
            description: description.to_string(),
            priority: TaskPriority::Normal,
            required_capabilities: Vec::new(),
            complexity: None,
            requires_debate: false,
            min_agents: None,
            resource_limits: None,
            privacy_controls: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// Assignment lifecycle status. The core creates assignments in
/// `Assigned`; the execution layer moves them to `Monitoring` and beyond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Created and handed to the execution layer.
    Assigned,
    /// Execution layer is tracking progress.
    Monitoring,
}

/// A routed task, bound to one agent with a computed deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Assignment identifier.
    pub id: String,
    /// The routed task.
    pub task_id: String,
    /// The chosen agent.
    pub agent_id: String,
    /// When the assignment was created.
    pub created_at: DateTime<Utc>,
    /// Completion deadline, derived from task priority.
    pub deadline: DateTime<Utc>,
    /// Execution timeout in milliseconds.
    pub timeout_ms: u64,
    /// Lifecycle status.
    pub status: AssignmentStatus,
}

impl Assignment {
    /// Create an assignment for `task` on `agent_id`, with the deadline
    /// computed from the task's priority.
    pub fn create(id: String, task: &Task, agent_id: &str) -> Self {
        let now = Utc::now();
        let minutes = task.priority.timeout_minutes();
        Self {
            id,
            task_id: task.id.clone(),
            agent_id: agent_id.to_string(),
            created_at: now,
            deadline: now + Duration::minutes(minutes),
            timeout_ms: (minutes * 60 * 1000) as u64,
            status: AssignmentStatus::Assigned,
        }
    }
}

/// Source of identifiers for sessions, assignments, and placeholder
/// participants. Injected so tests can make ids deterministic.
pub trait IdGenerator: Send + Sync {
    /// Next identifier with the given prefix.
    fn next_id(&self, prefix: &str) -> String;
}

/// Default generator backed by UUID v4.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, uuid::Uuid::new_v4())
    }
}
