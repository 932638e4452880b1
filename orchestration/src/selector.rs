//! Adaptive agent selection — epsilon-greedy/UCB bandit plus an
//! independent multi-factor scorer for the direct-assignment path.
//!
//! The bandit selector learns from the running averages already carried
//! on agent profiles; no separate statistics store exists. Exploration
//! decays as the global task counter grows, never below a floor. All
//! scores in this module are "higher is better" on [0, 1]; latency is
//! reporting metadata and never enters a score.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::error::{OrchestrationError, OrchestrationResult};
use crate::types::{AgentProfile, Task, TaskType};

/// Tunables for the bandit selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Starting exploration probability.
    pub base_epsilon: f64,
    /// Per-task multiplicative decay applied to epsilon.
    pub decay_factor: f64,
    /// Exploration floor.
    pub min_epsilon: f64,
    /// Whether exploitation uses UCB scores (plain success-rate argmax
    /// otherwise).
    pub use_ucb: bool,
    /// UCB exploration constant.
    pub ucb_constant: f64,
    /// Below this completed-task count an agent gets the flat
    /// exploration boost instead of a UCB bonus.
    pub min_sample_size: u64,
    /// Utilization below which an agent is preferred during exploration.
    pub underutilized_threshold: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            base_epsilon: 0.2,
            decay_factor: 0.995,
            min_epsilon: 0.01,
            use_ucb: true,
            ucb_constant: 2.0,
            min_sample_size: 10,
            underutilized_threshold: 0.5,
        }
    }
}

/// Epsilon-greedy/UCB selector over agent snapshots.
pub struct AdaptiveSelector {
    config: SelectorConfig,
    total_tasks: AtomicU64,
    rng: Mutex<StdRng>,
}

impl AdaptiveSelector {
    /// Selector with entropy-seeded randomness.
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            total_tasks: AtomicU64::new(0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Selector with a fixed seed, for deterministic tests.
    pub fn with_seed(config: SelectorConfig, seed: u64) -> Self {
        Self {
            config,
            total_tasks: AtomicU64::new(0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Tasks routed through this selector so far.
    pub fn total_tasks(&self) -> u64 {
        self.total_tasks.load(Ordering::Relaxed)
    }

    /// Current exploration probability, without advancing the counter.
    pub fn epsilon(&self) -> f64 {
        self.epsilon_at(self.total_tasks())
    }

    fn epsilon_at(&self, total: u64) -> f64 {
        let decayed = self.config.base_epsilon * self.config.decay_factor.powf(total as f64);
        decayed.max(self.config.min_epsilon)
    }

    /// Pick one agent for a task of `task_type`. Fails on an empty pool.
    /// Advances the global task counter as a side effect.
    pub fn select<'a>(
        &self,
        candidates: &'a [AgentProfile],
        task_type: TaskType,
    ) -> OrchestrationResult<&'a AgentProfile> {
        if candidates.is_empty() {
            return Err(OrchestrationError::NoCandidates(format!(
                "empty candidate pool for task type {task_type}"
            )));
        }

        let total = self.total_tasks.fetch_add(1, Ordering::SeqCst);
        let epsilon = self.epsilon_at(total);
        let draw: f64 = self.rng.lock().unwrap().gen();

        let chosen = if draw < epsilon {
            self.explore(candidates)
        } else {
            self.exploit(candidates, total)
        };
        debug!(
            task_type = %task_type,
            agent = %chosen.id,
            epsilon,
            explored = draw < epsilon,
            "agent selected"
        );
        Ok(chosen)
    }

    /// Uniform pick, preferring agents under the utilization threshold.
    fn explore<'a>(&self, candidates: &'a [AgentProfile]) -> &'a AgentProfile {
        let underutilized: Vec<&AgentProfile> = candidates
            .iter()
            .filter(|p| p.load.utilization < self.config.underutilized_threshold)
            .collect();
        let mut rng = self.rng.lock().unwrap();
        if underutilized.is_empty() {
            &candidates[rng.gen_range(0..candidates.len())]
        } else {
            underutilized[rng.gen_range(0..underutilized.len())]
        }
    }

    /// Argmax over success rate or UCB score; ties break by input order.
    fn exploit<'a>(&self, candidates: &'a [AgentProfile], total: u64) -> &'a AgentProfile {
        let mut best = &candidates[0];
        let mut best_score = self.exploit_score(best, total);
        for candidate in &candidates[1..] {
            let score = self.exploit_score(candidate, total);
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }
        best
    }

    fn exploit_score(&self, profile: &AgentProfile, total: u64) -> f64 {
        if self.config.use_ucb {
            self.ucb_score(profile, total)
        } else {
            profile.performance.success_rate
        }
    }

    /// UCB score: under-sampled agents get a flat +1.0 exploration
    /// boost; fully sampled agents get the standard confidence bonus.
    pub fn ucb_score(&self, profile: &AgentProfile, total_tasks: u64) -> f64 {
        let perf = &profile.performance;
        if perf.tasks_completed < self.config.min_sample_size {
            return perf.success_rate + 1.0;
        }
        let bonus = self.config.ucb_constant
            * (((total_tasks + 1) as f64).ln() / (perf.tasks_completed + 1) as f64).sqrt();
        perf.success_rate + bonus
    }
}

/// Weights for the multi-factor composite. They sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Capability-match fraction.
    pub capability: f64,
    /// Load-balance factor (1 − utilization).
    pub load_balance: f64,
    /// Historical performance composite (success rate + quality).
    pub performance: f64,
    /// Workspace-context relevance (externally measured).
    pub workspace: f64,
    /// System-health score (externally measured).
    pub system_health: f64,
    /// Resource-availability factor (externally measured).
    pub resources: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            capability: 0.25,
            load_balance: 0.15,
            performance: 0.15,
            workspace: 0.20,
            system_health: 0.15,
            resources: 0.10,
        }
    }
}

/// Externally measured sub-scores for the composite. Out-of-scope
/// collaborators supply these; defaults are neutral full scores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreContext {
    /// Relevance of the agent's workspace context to the task (0.0–1.0).
    pub workspace_relevance: f64,
    /// Overall system health (0.0–1.0).
    pub system_health: f64,
    /// Free resource fraction (0.0–1.0).
    pub resource_availability: f64,
}

impl Default for ScoreContext {
    fn default() -> Self {
        Self {
            workspace_relevance: 1.0,
            system_health: 1.0,
            resource_availability: 1.0,
        }
    }
}

/// Weighted-sum scorer used by the direct-assignment path. Independent
/// of the bandit selector and separately invocable.
#[derive(Debug, Clone, Default)]
pub struct MultiFactorScorer {
    weights: ScoringWeights,
}

impl MultiFactorScorer {
    /// Scorer with custom weights.
    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Composite score for one agent. Every sub-score is clamped to
    /// [0, 1] before weighting.
    pub fn score(&self, task: &Task, agent: &AgentProfile, ctx: &ScoreContext) -> f64 {
        let w = &self.weights;
        let capability = agent
            .capabilities
            .match_fraction(&task.required_capabilities)
            .clamp(0.0, 1.0);
        let load_balance = (1.0 - agent.load.utilization).clamp(0.0, 1.0);
        let performance = (0.5 * agent.performance.success_rate
            + 0.5 * agent.performance.avg_quality)
            .clamp(0.0, 1.0);
        let workspace = ctx.workspace_relevance.clamp(0.0, 1.0);
        let health = ctx.system_health.clamp(0.0, 1.0);
        let resources = ctx.resource_availability.clamp(0.0, 1.0);

        w.capability * capability
            + w.load_balance * load_balance
            + w.performance * performance
            + w.workspace * workspace
            + w.system_health * health
            + w.resources * resources
    }

    /// Candidate indices ranked by composite score, highest first.
    /// Equal scores keep input order.
    pub fn rank(&self, task: &Task, candidates: &[AgentProfile], ctx: &ScoreContext) -> Vec<usize> {
        let mut scored: Vec<(usize, f64)> = candidates
            .iter()
            .enumerate()
            .map(|(i, agent)| (i, self.score(task, agent, ctx)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(i, _)| i).collect()
    }
}
