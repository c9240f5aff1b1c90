//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → consumed once at startup to build breakers and tiers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers never change thresholds at
//!   runtime, so there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, CircuitBreakerConfig, FallbackConfig, ListenerConfig,
    ObservabilityConfig, ServiceConfig, TierConfig,
};
pub use validation::{validate_config, ValidationError};
