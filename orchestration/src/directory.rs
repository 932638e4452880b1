//! Agent directory contract and the in-memory fallback registry.
//!
//! The primary directory lives outside this core (storage and
//! persistence are someone else's problem); this module pins down the
//! exact shape both the primary and the fallback must satisfy. The
//! [`FallbackRegistry`] is the secondary directory the resilient client
//! swings to when the breaker is open.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::{AgentProfile, TaskType};

/// Errors from a directory implementation.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// The backing store is unreachable or timed out.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// No agent with the given id.
    #[error("agent not found: {0}")]
    NotFound(String),

    /// The directory refused the operation.
    #[error("directory rejected operation: {0}")]
    Rejected(String),
}

/// Filter for capability queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityFilter {
    /// Only agents supporting this task type.
    pub task_type: Option<TaskType>,
    /// Only agents working in this language.
    pub language: Option<String>,
    /// Only agents with this specialization.
    pub specialization: Option<String>,
}

impl CapabilityFilter {
    /// Filter on task type only.
    pub fn for_task_type(task_type: TaskType) -> Self {
        Self {
            task_type: Some(task_type),
            ..Self::default()
        }
    }

    /// Whether `profile` satisfies every populated field.
    pub fn matches(&self, profile: &AgentProfile) -> bool {
        if let Some(tt) = self.task_type {
            if !profile.capabilities.supports(tt) {
                return false;
            }
        }
        if let Some(lang) = &self.language {
            if !profile.capabilities.languages.iter().any(|l| l == lang) {
                return false;
            }
        }
        if let Some(spec) = &self.specialization {
            if !profile
                .capabilities
                .specializations
                .iter()
                .any(|s| s == spec)
            {
                return false;
            }
        }
        true
    }
}

/// Outcome of one completed task, folded into the agent's running
/// averages by the directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceOutcome {
    /// Whether the task succeeded.
    pub success: bool,
    /// Quality score for the result (0.0–1.0).
    pub quality: f64,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: u64,
}

/// The read/write contract both the primary directory and any fallback
/// must satisfy. The resilient client requires exactly this shape.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Register (or re-register) an agent profile.
    async fn register(&self, profile: AgentProfile) -> Result<(), DirectoryError>;

    /// Agents matching the filter.
    async fn query(&self, filter: &CapabilityFilter) -> Result<Vec<AgentProfile>, DirectoryError>;

    /// Note an assignment handed to `agent_id`, bumping its in-flight
    /// load. [`Self::update_performance`] releases the slot once the
    /// task completes.
    async fn record_assignment(&self, agent_id: &str) -> Result<(), DirectoryError>;

    /// Fold a completed-task outcome into the agent's running averages
    /// and release one in-flight slot.
    async fn update_performance(
        &self,
        agent_id: &str,
        outcome: &PerformanceOutcome,
    ) -> Result<(), DirectoryError>;

    /// Remove an agent.
    async fn unregister(&self, agent_id: &str) -> Result<(), DirectoryError>;

    /// Whether the directory is reachable and serving.
    async fn health_check(&self) -> Result<bool, DirectoryError>;
}

/// In-flight assignments at which the registry reports an agent fully
/// utilized.
const AGENT_CAPACITY: u32 = 4;

fn utilization_for(active_tasks: u32) -> f64 {
    (active_tasks as f64 / AGENT_CAPACITY as f64).min(1.0)
}

/// In-memory agent directory. Used as the fallback behind the resilient
/// client, and directly in tests.
#[derive(Debug, Default)]
pub struct FallbackRegistry {
    agents: RwLock<HashMap<String, AgentProfile>>,
}

impl FallbackRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered agents.
    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }
}

#[async_trait]
impl AgentDirectory for FallbackRegistry {
    async fn register(&self, profile: AgentProfile) -> Result<(), DirectoryError> {
        self.agents.write().await.insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn query(&self, filter: &CapabilityFilter) -> Result<Vec<AgentProfile>, DirectoryError> {
        let agents = self.agents.read().await;
        let mut matched: Vec<AgentProfile> =
            agents.values().filter(|p| filter.matches(p)).cloned().collect();
        // Stable order for callers that tie-break by position.
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }

    async fn record_assignment(&self, agent_id: &str) -> Result<(), DirectoryError> {
        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(agent_id)
            .ok_or_else(|| DirectoryError::NotFound(agent_id.to_string()))?;
        profile.load.active_tasks += 1;
        profile.load.utilization = utilization_for(profile.load.active_tasks);
        profile.last_active_at = chrono::Utc::now();
        Ok(())
    }

    async fn update_performance(
        &self,
        agent_id: &str,
        outcome: &PerformanceOutcome,
    ) -> Result<(), DirectoryError> {
        let mut agents = self.agents.write().await;
        let profile = agents
            .get_mut(agent_id)
            .ok_or_else(|| DirectoryError::NotFound(agent_id.to_string()))?;

        // A reported outcome means one in-flight task finished.
        profile.load.active_tasks = profile.load.active_tasks.saturating_sub(1);
        profile.load.utilization = utilization_for(profile.load.active_tasks);

        let perf = &mut profile.performance;
        let prior = perf.tasks_completed as f64;
        let next = prior + 1.0;
        let success = if outcome.success { 1.0 } else { 0.0 };
        perf.success_rate = (perf.success_rate * prior + success) / next;
        perf.avg_quality = (perf.avg_quality * prior + outcome.quality) / next;
        perf.avg_latency_ms = (perf.avg_latency_ms * prior + outcome.latency_ms as f64) / next;
        perf.tasks_completed += 1;
        profile.last_active_at = chrono::Utc::now();
        Ok(())
    }

    async fn unregister(&self, agent_id: &str) -> Result<(), DirectoryError> {
        self.agents
            .write()
            .await
            .remove(agent_id)
            .map(|_| ())
            .ok_or_else(|| DirectoryError::NotFound(agent_id.to_string()))
    }

    async fn health_check(&self) -> Result<bool, DirectoryError> {
        Ok(true)
    }
}
