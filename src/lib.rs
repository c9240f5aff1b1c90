//! Circuit breakers and tiered fallback for model-serving backends.

// Core
pub mod cache;
pub mod fallback;
pub mod resilience;

// Service surface
pub mod admin;
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use fallback::{FallbackChain, GenerateRequest, GenerateResponse};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{CallError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitOpenError, CircuitState};
