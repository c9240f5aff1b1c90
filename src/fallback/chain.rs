//! Ordered degradation across inference tiers.
//!
//! # Responsibilities
//! - Try tiers strictly in priority order, each through its own breaker
//! - Store successful responses in the cache
//! - Serve from the cache, then a static message, once every tier failed
//! - Count which tier served each request
//!
//! # Design Decisions
//! - `generate` never fails; the degraded message is the guaranteed floor
//! - No extra timeout: latency is bounded by the tiers' own deadlines plus
//!   one cache lookup
//! - A caller cancellation stops the chain without touching any breaker

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::cache::ResponseCache;
use crate::config::ServiceConfig;
use crate::fallback::request::GenerateRequest;
use crate::fallback::tier::{HttpBackend, InferenceBackend, Tier};
use crate::observability::metrics;
use crate::resilience::{CallError, CircuitBreaker, CircuitBreakerRegistry};

/// `tier_used` value when the response came from the cache.
pub const CACHE_TIER: &str = "cache";

/// `tier_used` value when the static degraded message was served.
pub const DEGRADED_TIER: &str = "degraded";

const DEFAULT_DEGRADED_MESSAGE: &str =
    "The service is temporarily degraded. Please try again shortly.";

/// What `generate` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    pub tier_used: String,
}

/// The caller abandoned the request before any tier answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("generation cancelled by caller")]
pub struct Cancelled;

pub struct FallbackChain {
    tiers: Vec<Tier>,
    cache: Option<Arc<dyn ResponseCache>>,
    cache_ttl: Duration,
    degraded_message: String,
    usage: BTreeMap<String, AtomicU64>,
}

impl FallbackChain {
    pub fn builder() -> FallbackChainBuilder {
        FallbackChainBuilder::default()
    }

    /// Build the chain described by `config`, registering one breaker per
    /// tier in `registry`.
    pub fn from_config(
        config: &ServiceConfig,
        registry: &CircuitBreakerRegistry,
        client: reqwest::Client,
        cache: Option<Arc<dyn ResponseCache>>,
    ) -> Self {
        let mut builder = Self::builder().degraded_message(config.fallback.degraded_message.clone());

        for tier in &config.tiers {
            let breaker = registry.get_or_create(&tier.name, config.breaker_for(tier));
            let backend = HttpBackend::new(client.clone(), tier.endpoint.clone(), tier.model.clone());
            builder = builder.tier(tier.name.clone(), breaker, Arc::new(backend));
        }

        if let Some(cache) = cache.filter(|_| config.cache.enabled) {
            builder = builder.cache(cache, Duration::from_secs(config.cache.ttl_seconds));
        }

        builder.build()
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn degraded_message(&self) -> &str {
        &self.degraded_message
    }

    /// The breakers of every tier, in priority order.
    pub fn breakers(&self) -> impl Iterator<Item = &Arc<CircuitBreaker>> {
        self.tiers.iter().map(|t| &t.breaker)
    }

    /// How many responses each tier (plus `cache` and `degraded`) has served.
    pub fn tier_usage(&self) -> BTreeMap<String, u64> {
        self.usage
            .iter()
            .map(|(name, count)| (name.clone(), count.load(Ordering::Relaxed)))
            .collect()
    }

    /// Produce a response for `request`. Never fails.
    pub async fn generate(&self, request: &GenerateRequest) -> GenerateResponse {
        match self.run(request, None).await {
            Ok(response) => response,
            // Nothing can cancel a run without a token.
            Err(Cancelled) => self.served(self.degraded_message.clone(), DEGRADED_TIER),
        }
    }

    /// Like [`generate`](Self::generate), but stops as soon as `cancel`
    /// fires. The interrupted tier call is not counted as a failure.
    pub async fn generate_cancellable(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateResponse, Cancelled> {
        self.run(request, Some(cancel)).await
    }

    async fn run(
        &self,
        request: &GenerateRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<GenerateResponse, Cancelled> {
        let key = self.cache.as_ref().map(|_| request.fingerprint());

        for tier in &self.tiers {
            let backend = &tier.backend;
            let operation = || backend.invoke(request);
            let result = match cancel {
                Some(token) => tier.breaker.call_cancellable(token, operation).await,
                None => tier.breaker.call(operation).await,
            };

            match result {
                Ok(text) => {
                    if let Some(key) = &key {
                        self.store(key, &text).await;
                    }
                    tracing::debug!(tier = %tier.name, "Tier served request");
                    return Ok(self.served(text, &tier.name));
                }
                Err(CallError::Cancelled) => {
                    tracing::info!(tier = %tier.name, "Request cancelled by caller");
                    return Err(Cancelled);
                }
                Err(e) => {
                    tracing::warn!(
                        tier = %tier.name,
                        kind = e.kind(),
                        error = %e,
                        "Tier failed, falling back"
                    );
                }
            }
        }

        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(Cancelled);
        }

        if let Some(key) = &key {
            if let Some(text) = self.lookup(key).await {
                tracing::info!("All tiers failed, serving cached response");
                return Ok(self.served(text, CACHE_TIER));
            }
        }

        tracing::error!(
            tiers = self.tiers.len(),
            cache = self.cache.is_some(),
            "All tiers and cache exhausted, serving degraded response"
        );
        Ok(self.served(self.degraded_message.clone(), DEGRADED_TIER))
    }

    async fn store(&self, key: &str, text: &str) {
        let Some(cache) = &self.cache else { return };
        if let Err(e) = cache.set(key, text.as_bytes().to_vec(), self.cache_ttl).await {
            tracing::warn!(error = %e, "Failed to write response to cache");
        }
    }

    async fn lookup(&self, key: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!(error = %e, "Cached response is not valid UTF-8, ignoring");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    fn served(&self, text: String, tier: &str) -> GenerateResponse {
        if let Some(count) = self.usage.get(tier) {
            count.fetch_add(1, Ordering::Relaxed);
        }
        metrics::record_tier_usage(tier);
        GenerateResponse {
            text,
            tier_used: tier.to_string(),
        }
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("tiers", &self.tiers)
            .field("cache", &self.cache.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .field("degraded_message", &self.degraded_message)
            .finish()
    }
}

pub struct FallbackChainBuilder {
    tiers: Vec<Tier>,
    cache: Option<Arc<dyn ResponseCache>>,
    cache_ttl: Duration,
    degraded_message: String,
}

impl Default for FallbackChainBuilder {
    fn default() -> Self {
        Self {
            tiers: Vec::new(),
            cache: None,
            cache_ttl: Duration::from_secs(3600),
            degraded_message: DEFAULT_DEGRADED_MESSAGE.to_string(),
        }
    }
}

impl FallbackChainBuilder {
    /// Append a tier. Tiers are tried in the order they are added.
    pub fn tier(
        mut self,
        name: impl Into<String>,
        breaker: Arc<CircuitBreaker>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        self.tiers.push(Tier::new(name, breaker, backend));
        self
    }

    pub fn cache(mut self, cache: Arc<dyn ResponseCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    pub fn degraded_message(mut self, message: impl Into<String>) -> Self {
        self.degraded_message = message.into();
        self
    }

    pub fn build(self) -> FallbackChain {
        let usage = self
            .tiers
            .iter()
            .map(|t| t.name.as_str())
            .chain([CACHE_TIER, DEGRADED_TIER])
            .map(|name| (name.to_string(), AtomicU64::new(0)))
            .collect();

        FallbackChain {
            tiers: self.tiers,
            cache: self.cache,
            cache_ttl: self.cache_ttl,
            degraded_message: self.degraded_message,
            usage,
        }
    }
}
