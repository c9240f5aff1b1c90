//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

pub use crate::resilience::CircuitBreakerConfig;

/// Root configuration for the resilience service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Breaker settings applied to every tier without its own override.
    pub breaker_defaults: CircuitBreakerConfig,

    /// Inference tiers in priority order (first = most preferred).
    pub tiers: Vec<TierConfig>,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Terminal degraded response.
    pub fallback: FallbackConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,
}

impl ServiceConfig {
    /// Effective breaker config for a tier.
    pub fn breaker_for(&self, tier: &TierConfig) -> CircuitBreakerConfig {
        tier.breaker
            .clone()
            .unwrap_or_else(|| self.breaker_defaults.clone())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Upper bound on status and admin requests, in seconds. `/generate` is
    /// not covered; it is bounded by the tier timeouts.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// One inference tier.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierConfig {
    /// Tier identifier; also the name of its circuit breaker.
    pub name: String,

    /// Completion endpoint (e.g., "http://primary:8000/v1/generate").
    pub endpoint: String,

    /// Model name sent when the request does not pick one.
    #[serde(default)]
    pub model: Option<String>,

    /// Per-tier breaker override.
    #[serde(default)]
    pub breaker: Option<CircuitBreakerConfig>,
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the cache as a fallback tier and store successful responses.
    pub enabled: bool,

    /// Lifetime of a cached response in seconds.
    pub ttl_seconds: u64,

    /// How often expired entries are swept, in seconds.
    pub purge_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
            purge_interval_secs: 60,
        }
    }
}

/// Degraded response configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Returned when every tier and the cache fail.
    pub degraded_message: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            degraded_message:
                "The service is temporarily degraded. Please try again shortly.".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    pub log_level: String,

    /// Install the Prometheus recorder and serve `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

/// Operator endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the `/admin` routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
