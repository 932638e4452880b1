//! Resilience — circuit breaker and breaker-protected directory access.
//!
//! ```text
//! caller
//!   └─ ResilientDirectoryClient
//!        ├─ breaker Closed → primary directory
//!        ├─ primary fails  → record failure → fallback registry
//!        └─ breaker Open   → fallback registry (no primary attempt)
//! ```

pub mod breaker;
pub mod client;

pub use breaker::{BreakerConfig, BreakerStats, CircuitBreaker, CircuitState};
pub use client::{ClientStatus, ResilientDirectoryClient};
