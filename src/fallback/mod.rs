//! Fallback subsystem.
//!
//! # Data Flow
//! ```text
//! FallbackChain::generate(request)
//!     → tier 1 via its CircuitBreaker (primary backend)
//!     → on rejection/failure: tier 2 via its CircuitBreaker (secondary)
//!     → on failure: cache lookup by request fingerprint
//!     → on miss: static degraded message
//! ```
//!
//! # Design Decisions
//! - Strict priority order, never parallel; first success wins
//! - Each tier owns its breaker; the chain only invokes them
//! - The chain itself never fails

pub mod chain;
pub mod request;
pub mod tier;

pub use chain::{Cancelled, FallbackChain, FallbackChainBuilder, GenerateResponse, CACHE_TIER, DEGRADED_TIER};
pub use request::GenerateRequest;
pub use tier::{HttpBackend, InferenceBackend, Tier, TierError};
