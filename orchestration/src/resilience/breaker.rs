//! Circuit breaker — failure isolation for fallible operations.
//!
//! Tracks failures inside a sliding time window. When the window fills
//! past the threshold the circuit *opens* and calls are rejected without
//! touching the wrapped operation. After a reset timeout the circuit
//! enters *half-open* and lets the next call through as a probe; a run
//! of consecutive successes closes it again, any single failure re-opens
//! it.
//!
//! State checks are lazy — evaluated on call, never from a timer thread.
//! Check-then-transition runs inside one mutex-guarded critical section
//! so concurrent callers cannot both decide to flip the circuit.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::OrchestrationError;

/// State of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Healthy — calls pass through.
    Closed,
    /// Tripped — calls rejected until the reset timeout elapses.
    Open,
    /// Probing recovery — calls pass through, one failure re-opens.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Static thresholds for a breaker instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Failures inside the window that trip Closed → Open.
    pub failure_threshold: u32,
    /// Sliding window length in milliseconds.
    pub failure_window_ms: u64,
    /// Time after the last transition before Open admits a probe.
    pub reset_timeout_ms: u64,
    /// Consecutive successes that close a half-open circuit.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window_ms: 60_000,
            reset_timeout_ms: 30_000,
            success_threshold: 3,
        }
    }
}

/// Counters exposed by [`CircuitBreaker::stats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerStats {
    /// Breaker name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures currently inside the sliding window.
    pub failures_in_window: u32,
    /// Consecutive successes while half-open.
    pub consecutive_successes: u32,
    /// Total calls admitted.
    pub total_calls: u64,
    /// Total failures recorded.
    pub total_failures: u64,
    /// Calls rejected while the circuit was open.
    pub rejected_calls: u64,
}

struct BreakerInner {
    state: CircuitState,
    /// Millisecond offsets (from `started`) of recent failures.
    failures: VecDeque<u64>,
    consecutive_successes: u32,
    last_transition_ms: u64,
    total_calls: u64,
    total_failures: u64,
    rejected_calls: u64,
}

/// A named circuit breaker. All mutation happens under one mutex.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    started: Instant,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// New breaker in the closed state.
    pub fn new(name: &str, config: BreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            started: Instant::now(),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                consecutive_successes: 0,
                last_transition_ms: 0,
                total_calls: 0,
                total_failures: 0,
                rejected_calls: 0,
            }),
        }
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn prune(&self, inner: &mut BreakerInner, now: u64) {
        let horizon = now.saturating_sub(self.config.failure_window_ms);
        while matches!(inner.failures.front(), Some(&ts) if ts < horizon) {
            inner.failures.pop_front();
        }
    }

    /// Ask permission to make a call.
    ///
    /// Open circuits reject with [`OrchestrationError::CircuitOpen`]
    /// unless the reset timeout has elapsed, in which case the circuit
    /// flips to half-open before this call executes.
    pub fn try_acquire(&self) -> Result<(), OrchestrationError> {
        let mut inner = self.inner.lock().unwrap();
        let now = self.now_ms();
        self.prune(&mut inner, now);

        if inner.state == CircuitState::Open {
            if now.saturating_sub(inner.last_transition_ms) >= self.config.reset_timeout_ms {
                debug!(breaker = %self.name, "reset timeout elapsed, probing (half-open)");
                inner.state = CircuitState::HalfOpen;
                inner.consecutive_successes = 0;
                inner.last_transition_ms = now;
            } else {
                inner.rejected_calls += 1;
                return Err(OrchestrationError::CircuitOpen {
                    name: self.name.clone(),
                    failure_count: inner.failures.len() as u32,
                });
            }
        }

        inner.total_calls += 1;
        Ok(())
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CircuitState::HalfOpen {
            inner.consecutive_successes += 1;
            if inner.consecutive_successes >= self.config.success_threshold {
                debug!(breaker = %self.name, "recovered, closing circuit");
                inner.state = CircuitState::Closed;
                inner.failures.clear();
                inner.consecutive_successes = 0;
                inner.last_transition_ms = self.now_ms();
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        let now = self.now_ms();
        inner.total_failures += 1;
        inner.failures.push_back(now);
        self.prune(&mut inner, now);

        match inner.state {
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "probe failed, re-opening circuit");
                inner.state = CircuitState::Open;
                inner.consecutive_successes = 0;
                inner.last_transition_ms = now;
            }
            CircuitState::Closed => {
                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    warn!(
                        breaker = %self.name,
                        failures = inner.failures.len(),
                        "failure threshold reached, opening circuit"
                    );
                    inner.state = CircuitState::Open;
                    inner.last_transition_ms = now;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Run `fut` under the breaker, recording the outcome.
    pub async fn call<T, E, Fut>(&self, fut: Fut) -> Result<Result<T, E>, OrchestrationError>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.try_acquire()?;
        let result = fut.await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        Ok(result)
    }

    /// Current state, with the window pruned first.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap();
        let now = self.now_ms();
        self.prune(&mut inner, now);
        inner.state
    }

    /// Counter snapshot.
    pub fn stats(&self) -> BreakerStats {
        let mut inner = self.inner.lock().unwrap();
        let now = self.now_ms();
        self.prune(&mut inner, now);
        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failures_in_window: inner.failures.len() as u32,
            consecutive_successes: inner.consecutive_successes,
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
            rejected_calls: inner.rejected_calls,
        }
    }

    /// Force the circuit closed and zero all counters. Operator recovery.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.consecutive_successes = 0;
        inner.last_transition_ms = self.now_ms();
        inner.total_calls = 0;
        inner.total_failures = 0;
        inner.rejected_calls = 0;
    }

    /// Breaker name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
