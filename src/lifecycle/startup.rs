//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (cache purge)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::cache::{InMemoryCache, ResponseCache};
use crate::config::ServiceConfig;
use crate::fallback::FallbackChain;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::resilience::CircuitBreakerRegistry;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build tier HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Every long-lived component of a running service.
pub struct Service {
    pub config: ServiceConfig,
    pub registry: Arc<CircuitBreakerRegistry>,
    pub cache: Option<InMemoryCache>,
    pub chain: Arc<FallbackChain>,
    pub server: HttpServer,
}

/// Wire registry, cache, tier client, chain and HTTP server from `config`.
pub fn build_service(
    config: ServiceConfig,
    metrics: Option<PrometheusHandle>,
) -> Result<Service, StartupError> {
    let registry = Arc::new(CircuitBreakerRegistry::new());

    let cache = config.cache.enabled.then(InMemoryCache::new);
    let shared_cache = cache
        .clone()
        .map(|c| Arc::new(c) as Arc<dyn ResponseCache>);

    let client = reqwest::Client::builder()
        .user_agent(concat!("serving-resilience/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let chain = Arc::new(FallbackChain::from_config(&config, &registry, client, shared_cache));

    tracing::info!(
        tiers = chain.tiers().len(),
        cache = chain.has_cache(),
        "Fallback chain ready"
    );

    let state = AppState::new(chain.clone(), registry.clone(), metrics, config.admin.clone());
    let server = HttpServer::new(&config, state);

    Ok(Service {
        config,
        registry,
        cache,
        chain,
        server,
    })
}

/// Drop expired cache entries every `every` until shutdown.
pub fn spawn_cache_purge(
    cache: InMemoryCache,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cache.purge_expired();
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}

/// Bind the configured address and serve until `shutdown` fires.
pub async fn run(service: Service, shutdown: &Shutdown) -> Result<(), StartupError> {
    let address = service.config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    if let Some(cache) = service.cache {
        let every = Duration::from_secs(service.config.cache.purge_interval_secs);
        spawn_cache_purge(cache, every, shutdown.subscribe());
    }

    service
        .server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierConfig;

    #[tokio::test]
    async fn test_build_registers_a_breaker_per_tier() {
        let mut config = ServiceConfig::default();
        for name in ["primary", "secondary"] {
            config.tiers.push(TierConfig {
                name: name.into(),
                endpoint: format!("http://127.0.0.1:1/{name}"),
                model: None,
                breaker: None,
            });
        }

        let service = build_service(config, None).unwrap();
        assert_eq!(service.registry.names(), vec!["primary", "secondary"]);
        assert!(service.cache.is_some());
        assert!(service.chain.has_cache());
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let mut config = ServiceConfig::default();
        config.cache.enabled = false;
        let service = build_service(config, None).unwrap();
        assert!(service.cache.is_none());
        assert!(!service.chain.has_cache());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_task_stops_on_shutdown() {
        let shutdown = Shutdown::new();
        let cache = InMemoryCache::new();
        cache.set("k", b"v".to_vec(), Duration::from_secs(1)).await.unwrap();

        let task = spawn_cache_purge(cache.clone(), Duration::from_secs(5), shutdown.subscribe());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(cache.is_empty());

        shutdown.trigger();
        task.await.unwrap();
    }
}
