//! Resilient directory client — breaker-wrapped primary with a
//! transparent fallback registry.
//!
//! Every primary-directory operation runs under the circuit breaker.
//! When the breaker is open, or the wrapped call fails, and a fallback
//! is configured, the same logical operation is re-issued against the
//! fallback and its result returned — callers never see the distinction
//! unless they inspect [`ResilientDirectoryClient::status`].

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::breaker::{BreakerConfig, BreakerStats, CircuitBreaker, CircuitState};
use crate::directory::{AgentDirectory, CapabilityFilter, DirectoryError, PerformanceOutcome};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::events::{RoutingEvent, SharedEventBus};
use crate::types::AgentProfile;

/// Point-in-time view of the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientStatus {
    /// Breaker counters and state.
    pub breaker: BreakerStats,
    /// Whether the last completed operation was served by the fallback.
    pub using_fallback: bool,
    /// Whether a fallback registry is configured at all.
    pub fallback_configured: bool,
}

/// Breaker-protected view of the primary agent directory.
pub struct ResilientDirectoryClient {
    primary: Arc<dyn AgentDirectory>,
    fallback: Option<Arc<dyn AgentDirectory>>,
    breaker: CircuitBreaker,
    using_fallback: AtomicBool,
    events: Option<SharedEventBus>,
}

impl ResilientDirectoryClient {
    /// Client without a fallback: breaker-open surfaces as an error.
    pub fn new(primary: Arc<dyn AgentDirectory>, breaker_config: BreakerConfig) -> Self {
        Self {
            primary,
            fallback: None,
            breaker: CircuitBreaker::new("agent-directory", breaker_config),
            using_fallback: AtomicBool::new(false),
            events: None,
        }
    }

    /// Client with a fallback directory for transparent degradation.
    pub fn with_fallback(
        primary: Arc<dyn AgentDirectory>,
        fallback: Arc<dyn AgentDirectory>,
        breaker_config: BreakerConfig,
    ) -> Self {
        Self {
            primary,
            fallback: Some(fallback),
            breaker: CircuitBreaker::new("agent-directory", breaker_config),
            using_fallback: AtomicBool::new(false),
            events: None,
        }
    }

    /// Publish fallback engagements on `events`. Share the same bus
    /// with the orchestrator to see them alongside routing events.
    pub fn with_event_bus(mut self, events: SharedEventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Shared execution path for every directory operation.
    ///
    /// `primary` and `fallback` are lazy futures; the fallback is only
    /// polled when the breaker rejects the call or the primary fails.
    async fn execute<'a, T>(
        &'a self,
        operation: &str,
        primary: BoxFuture<'a, Result<T, DirectoryError>>,
        fallback: Option<BoxFuture<'a, Result<T, DirectoryError>>>,
    ) -> OrchestrationResult<T> {
        match self.breaker.try_acquire() {
            Ok(()) => match primary.await {
                Ok(value) => {
                    self.breaker.record_success();
                    self.using_fallback.store(false, Ordering::Relaxed);
                    Ok(value)
                }
                Err(err) => {
                    self.breaker.record_failure();
                    warn!(operation, error = %err, "primary directory call failed");
                    self.serve_from_fallback(operation, fallback, err.to_string())
                        .await
                }
            },
            Err(open) => {
                debug!(operation, "breaker open, skipping primary");
                match fallback {
                    Some(fut) => {
                        self.serve_from_fallback(operation, Some(fut), open.to_string())
                            .await
                    }
                    None => Err(open),
                }
            }
        }
    }

    async fn serve_from_fallback<'a, T>(
        &'a self,
        operation: &str,
        fallback: Option<BoxFuture<'a, Result<T, DirectoryError>>>,
        primary_error: String,
    ) -> OrchestrationResult<T> {
        let Some(fut) = fallback else {
            return Err(OrchestrationError::DirectoryFailed {
                operation: operation.to_string(),
                detail: primary_error,
            });
        };
        match fut.await {
            Ok(value) => {
                self.using_fallback.store(true, Ordering::Relaxed);
                debug!(operation, "served from fallback registry");
                if let Some(bus) = &self.events {
                    bus.publish(RoutingEvent::FallbackEngaged {
                        operation: operation.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                Ok(value)
            }
            Err(err) => Err(OrchestrationError::DirectoryFailed {
                operation: operation.to_string(),
                detail: format!("primary: {primary_error}; fallback: {err}"),
            }),
        }
    }

    /// Register an agent.
    pub async fn register(&self, profile: AgentProfile) -> OrchestrationResult<()> {
        self.execute(
            "register",
            self.primary.register(profile.clone()).boxed(),
            self.fallback.as_ref().map(|f| f.register(profile).boxed()),
        )
        .await
    }

    /// Agents matching the filter.
    pub async fn query(&self, filter: &CapabilityFilter) -> OrchestrationResult<Vec<AgentProfile>> {
        self.execute(
            "query",
            self.primary.query(filter).boxed(),
            self.fallback.as_ref().map(|f| f.query(filter).boxed()),
        )
        .await
    }

    /// Note an assignment handed to an agent.
    pub async fn record_assignment(&self, agent_id: &str) -> OrchestrationResult<()> {
        self.execute(
            "record_assignment",
            self.primary.record_assignment(agent_id).boxed(),
            self.fallback
                .as_ref()
                .map(|f| f.record_assignment(agent_id).boxed()),
        )
        .await
    }

    /// Report a completed-task outcome for an agent.
    pub async fn update_performance(
        &self,
        agent_id: &str,
        outcome: &PerformanceOutcome,
    ) -> OrchestrationResult<()> {
        self.execute(
            "update_performance",
            self.primary.update_performance(agent_id, outcome).boxed(),
            self.fallback
                .as_ref()
                .map(|f| f.update_performance(agent_id, outcome).boxed()),
        )
        .await
    }

    /// Remove an agent.
    pub async fn unregister(&self, agent_id: &str) -> OrchestrationResult<()> {
        self.execute(
            "unregister",
            self.primary.unregister(agent_id).boxed(),
            self.fallback.as_ref().map(|f| f.unregister(agent_id).boxed()),
        )
        .await
    }

    /// Whether the directory (primary or fallback) is serving.
    pub async fn health_check(&self) -> OrchestrationResult<bool> {
        self.execute(
            "health_check",
            self.primary.health_check().boxed(),
            self.fallback.as_ref().map(|f| f.health_check().boxed()),
        )
        .await
    }

    /// Current breaker state.
    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Breaker counters.
    pub fn breaker_stats(&self) -> BreakerStats {
        self.breaker.stats()
    }

    /// Force the breaker closed and zero its counters.
    pub fn reset_breaker(&self) {
        self.breaker.reset();
    }

    /// Client status including fallback visibility.
    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            breaker: self.breaker.stats(),
            using_fallback: self.using_fallback.load(Ordering::Relaxed),
            fallback_configured: self.fallback.is_some(),
        }
    }
}
