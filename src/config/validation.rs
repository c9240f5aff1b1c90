//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, deadlines > 0)
//! - Reject duplicate or reserved tier names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{CircuitBreakerConfig, ServiceConfig};
use crate::fallback::{CACHE_TIER, DEGRADED_TIER};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("listener.request_timeout_secs must be greater than 0")]
    RequestTimeout,

    #[error("tier #{0} has an empty name")]
    EmptyTierName(usize),

    #[error("tier name '{0}' is used more than once")]
    DuplicateTier(String),

    #[error("tier name '{0}' is reserved")]
    ReservedTierName(String),

    #[error("tier '{name}' endpoint '{endpoint}' is not an http(s) URL")]
    Endpoint { name: String, endpoint: String },

    #[error("{scope}: {field} {reason}")]
    Breaker {
        scope: String,
        field: &'static str,
        reason: &'static str,
    },

    #[error("cache.ttl_seconds must be greater than 0 when the cache is enabled")]
    CacheTtl,

    #[error("cache.purge_interval_secs must be greater than 0 when the cache is enabled")]
    CachePurgeInterval,

    #[error("admin.api_key must not be empty when admin is enabled")]
    AdminKey,
}

/// Check a config for semantic errors, returning all of them.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    validate_breaker("breaker_defaults", &config.breaker_defaults, &mut errors);

    let mut seen = HashSet::new();
    for (i, tier) in config.tiers.iter().enumerate() {
        if tier.name.trim().is_empty() {
            errors.push(ValidationError::EmptyTierName(i));
        } else if tier.name == CACHE_TIER || tier.name == DEGRADED_TIER {
            errors.push(ValidationError::ReservedTierName(tier.name.clone()));
        } else if !seen.insert(tier.name.as_str()) {
            errors.push(ValidationError::DuplicateTier(tier.name.clone()));
        }

        let endpoint_ok = reqwest::Url::parse(&tier.endpoint)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !endpoint_ok {
            errors.push(ValidationError::Endpoint {
                name: tier.name.clone(),
                endpoint: tier.endpoint.clone(),
            });
        }

        if let Some(breaker) = &tier.breaker {
            validate_breaker(&format!("tiers.{}.breaker", tier.name), breaker, &mut errors);
        }
    }

    if config.cache.enabled && config.cache.ttl_seconds == 0 {
        errors.push(ValidationError::CacheTtl);
    }
    if config.cache.enabled && config.cache.purge_interval_secs == 0 {
        errors.push(ValidationError::CachePurgeInterval);
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::AdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_breaker(scope: &str, breaker: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    let mut push = |field, reason| {
        errors.push(ValidationError::Breaker {
            scope: scope.to_string(),
            field,
            reason,
        })
    };

    if breaker.failure_threshold == 0 {
        push("failure_threshold", "must be at least 1");
    }
    if breaker.success_threshold == 0 {
        push("success_threshold", "must be at least 1");
    }
    if !breaker.timeout_seconds.is_finite() || breaker.timeout_seconds <= 0.0 {
        push("timeout_seconds", "must be a positive number");
    }
    if !breaker.recovery_timeout_seconds.is_finite() || breaker.recovery_timeout_seconds < 0.0 {
        push("recovery_timeout_seconds", "must be zero or a positive number");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TierConfig;

    fn tier(name: &str, endpoint: &str) -> TierConfig {
        TierConfig {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            model: None,
            breaker: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.breaker_defaults.failure_threshold = 0;
        config.breaker_defaults.timeout_seconds = f64::NAN;
        config.tiers.push(tier("primary", "http://a:1/generate"));
        config.tiers.push(tier("primary", "ftp://b/generate"));
        config.tiers.push(tier("cache", "http://c:1/generate"));

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::DuplicateTier("primary".into())));
        assert!(errors.contains(&ValidationError::ReservedTierName("cache".into())));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Endpoint { endpoint, .. } if endpoint == "ftp://b/generate")));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Breaker { field: "failure_threshold", .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Breaker { field: "timeout_seconds", .. })));
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_tier_breaker_override_is_checked() {
        let mut config = ServiceConfig::default();
        let mut t = tier("primary", "http://a:1/generate");
        t.breaker = Some(CircuitBreakerConfig::default().with_success_threshold(0));
        config.tiers.push(t);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::Breaker {
                scope: "tiers.primary.breaker".into(),
                field: "success_threshold",
                reason: "must be at least 1",
            }]
        );
    }

    #[test]
    fn test_cache_intervals_only_checked_when_enabled() {
        let mut config = ServiceConfig::default();
        config.cache.ttl_seconds = 0;
        config.cache.purge_interval_secs = 0;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::CacheTtl, ValidationError::CachePurgeInterval]
        );

        config.cache.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
