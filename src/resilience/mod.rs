//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an inference dependency:
//!     → registry.rs (one breaker per dependency name)
//!     → circuit_breaker.rs (admit or reject, track outcome, trip/recover)
//!     → timeouts.rs (enforce per-call deadline, observe caller cancellation)
//!     → error.rs (rejection / timeout / operation error / cancelled)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every protected call has a deadline
//! - No retries here: falling through to the next tier is the fallback
//!   chain's job, not the breaker's
//! - Circuit breaker prevents cascading failures

pub mod circuit_breaker;
pub mod error;
pub mod registry;
pub mod timeouts;

pub use circuit_breaker::{BreakerStats, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{CallError, CircuitOpenError};
pub use registry::CircuitBreakerRegistry;
