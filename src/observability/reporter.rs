//! Read-only statistics over breakers and the fallback chain.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fallback::FallbackChain;
use crate::resilience::{BreakerStats, CircuitBreakerRegistry, CircuitState};

/// Everything `GET /stats` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub breakers: BTreeMap<String, BreakerStats>,
    pub tier_usage: BTreeMap<String, u64>,
    pub open_circuits: Vec<String>,
    pub degraded: bool,
}

/// View consumed by the status and metrics endpoints. Never mutates.
#[derive(Debug, Clone)]
pub struct StatisticsReporter {
    registry: Arc<CircuitBreakerRegistry>,
    chain: Arc<FallbackChain>,
}

impl StatisticsReporter {
    pub fn new(registry: Arc<CircuitBreakerRegistry>, chain: Arc<FallbackChain>) -> Self {
        Self { registry, chain }
    }

    pub fn breakers(&self) -> BTreeMap<String, BreakerStats> {
        self.registry.list_all()
    }

    pub fn tier_usage(&self) -> BTreeMap<String, u64> {
        self.chain.tier_usage()
    }

    /// True when some tier is being skipped, or there are no tiers at all.
    pub fn is_degraded(&self) -> bool {
        self.chain.tiers().is_empty()
            || self.chain.breakers().any(|b| b.state() == CircuitState::Open)
    }

    pub fn snapshot(&self) -> ServiceStats {
        ServiceStats {
            breakers: self.breakers(),
            tier_usage: self.tier_usage(),
            open_circuits: self.registry.open_circuits(),
            degraded: self.is_degraded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitBreakerConfig;
    use crate::fallback::{InferenceBackend, GenerateRequest, TierError};
    use futures_util::future::{BoxFuture, FutureExt};

    struct Echo;

    impl InferenceBackend for Echo {
        fn invoke<'a>(&'a self, request: &'a GenerateRequest) -> BoxFuture<'a, Result<String, TierError>> {
            async move { Ok(request.prompt.clone()) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_snapshot_reflects_breakers_and_usage() {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let primary = registry.get_or_create("primary", CircuitBreakerConfig::default());
        let chain = Arc::new(
            FallbackChain::builder()
                .tier("primary", primary.clone(), Arc::new(Echo))
                .build(),
        );
        let reporter = StatisticsReporter::new(registry, chain.clone());

        chain.generate(&GenerateRequest::new("hello")).await;
        let stats = reporter.snapshot();
        assert_eq!(stats.breakers["primary"].total_successes, 1);
        assert_eq!(stats.tier_usage["primary"], 1);
        assert!(!stats.degraded);

        primary.force_open();
        let stats = reporter.snapshot();
        assert_eq!(stats.open_circuits, vec!["primary".to_string()]);
        assert!(stats.degraded);
    }

    #[test]
    fn test_no_tiers_is_degraded() {
        let reporter = StatisticsReporter::new(
            Arc::new(CircuitBreakerRegistry::new()),
            Arc::new(FallbackChain::builder().build()),
        );
        assert!(reporter.is_degraded());
        assert!(reporter.breakers().is_empty());
    }
}
