//! Process-wide set of named circuit breakers.
//!
//! # Responsibilities
//! - Hand out exactly one breaker per dependency name
//! - Enumerate breakers for the status and metrics endpoints
//! - Operator resets, one breaker or all of them
//!
//! # Design Decisions
//! - Built once at startup and injected; there is no global registry
//! - First writer wins: a later `get_or_create` with a different config
//!   returns the existing breaker unchanged, so config can never change
//!   under in-flight calls
//! - The map lock is never held while a breaker's own lock is taken

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::resilience::circuit_breaker::{
    BreakerStats, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};

#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the breaker for `name`, creating it with `config` if absent.
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.get(name) {
            if existing.config() != &config {
                tracing::debug!(
                    breaker = %name,
                    "Breaker already registered, ignoring new config"
                );
            }
            return existing;
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(
                    breaker = %name,
                    failure_threshold = config.failure_threshold,
                    timeout_seconds = config.timeout_seconds,
                    recovery_timeout_seconds = config.recovery_timeout_seconds,
                    success_threshold = config.success_threshold,
                    "Circuit breaker registered"
                );
                Arc::new(CircuitBreaker::new(name, config))
            })
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Registered breaker names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Stats snapshot for every breaker, keyed by name.
    pub fn list_all(&self) -> BTreeMap<String, BreakerStats> {
        self.snapshot_breakers()
            .into_iter()
            .map(|b| (b.name().to_string(), b.stats()))
            .collect()
    }

    /// Names of breakers currently Open.
    pub fn open_circuits(&self) -> Vec<String> {
        let mut open: Vec<String> = self
            .snapshot_breakers()
            .into_iter()
            .filter(|b| b.state() == CircuitState::Open)
            .map(|b| b.name().to_string())
            .collect();
        open.sort();
        open
    }

    /// Reset one breaker. Returns `false` if no breaker has that name.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for breaker in self.snapshot_breakers() {
            breaker.reset();
        }
    }

    /// Clone out the breaker handles so no map shard stays locked while
    /// individual breakers are inspected.
    fn snapshot_breakers(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers.iter().map(|e| e.value().clone()).collect()
    }
}
