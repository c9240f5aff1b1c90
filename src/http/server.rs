//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, and a timeout on the status
//!   and admin routes)
//! - Mount the admin router when enabled
//! - Serve until the shutdown broadcast fires
//!
//! # Design Decisions
//! - `POST /generate` always answers 200; degradation shows in `tier_used`
//! - No whole-request timeout on `/generate`: the chain already ends within
//!   the sum of its tier timeouts, and cutting it short would hide those
//!   timeouts from the breakers
//! - A client disconnect drops the handler future, which abandons the tier
//!   call in flight without counting it against the breaker

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{AdminConfig, ServiceConfig};
use crate::fallback::{FallbackChain, GenerateRequest, GenerateResponse};
use crate::http::request_id;
use crate::observability::metrics;
use crate::observability::{ServiceStats, StatisticsReporter};
use crate::resilience::{BreakerStats, CircuitBreakerRegistry};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<FallbackChain>,
    pub registry: Arc<CircuitBreakerRegistry>,
    pub reporter: StatisticsReporter,
    pub metrics: Option<PrometheusHandle>,
    pub admin: AdminConfig,
}

impl AppState {
    pub fn new(
        chain: Arc<FallbackChain>,
        registry: Arc<CircuitBreakerRegistry>,
        metrics: Option<PrometheusHandle>,
        admin: AdminConfig,
    ) -> Self {
        let reporter = StatisticsReporter::new(registry.clone(), chain.clone());
        Self {
            chain,
            registry,
            reporter,
            metrics,
            admin,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// HTTP front end for the fallback chain and the breaker status views.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServiceConfig, state: AppState) -> Self {
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let mut status = Router::new()
            .route("/circuit-breakers", get(breakers_handler))
            .route("/stats", get(stats_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state.clone());

        if config.admin.enabled {
            status = status.merge(admin::setup_admin_router(state.clone()));
        }

        // `/generate` is bounded by the per-tier breaker deadlines instead.
        let status = status.layer(TimeoutLayer::new(Duration::from_secs(
            config.listener.request_timeout_secs,
        )));

        Router::new()
            .route("/generate", post(generate_handler))
            .with_state(state)
            .merge(status)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            path = %request.uri().path(),
                            request_id = %request_id(request.headers()).unwrap_or("unknown"),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    let start = Instant::now();
    let response = state.chain.generate(&request).await;
    tracing::debug!(tier = %response.tier_used, "Generate request served");
    metrics::record_request("/generate", 200, start);
    Json(response)
}

async fn breakers_handler(State(state): State<AppState>) -> Json<BTreeMap<String, BreakerStats>> {
    Json(state.reporter.breakers())
}

async fn stats_handler(State(state): State<AppState>) -> Json<ServiceStats> {
    Json(state.reporter.snapshot())
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    let status = if state.reporter.is_degraded() { "degraded" } else { "ok" };
    Json(HealthStatus {
        status: status.to_string(),
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics disabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::{InferenceBackend, TierError};
    use crate::http::X_REQUEST_ID;
    use crate::resilience::CircuitBreakerConfig;
    use futures_util::future::{BoxFuture, FutureExt};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct Echo;

    impl InferenceBackend for Echo {
        fn invoke<'a>(&'a self, request: &'a GenerateRequest) -> BoxFuture<'a, Result<String, TierError>> {
            async move { Ok(format!("echo: {}", request.prompt)) }.boxed()
        }
    }

    fn server() -> (HttpServer, Arc<CircuitBreakerRegistry>) {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let breaker = registry.get_or_create("primary", CircuitBreakerConfig::default());
        let chain = Arc::new(FallbackChain::builder().tier("primary", breaker, Arc::new(Echo)).build());
        let config = ServiceConfig::default();
        let state = AppState::new(chain, registry.clone(), None, config.admin.clone());
        (HttpServer::new(&config, state), registry)
    }

    struct Hang;

    impl InferenceBackend for Hang {
        fn invoke<'a>(&'a self, _request: &'a GenerateRequest) -> BoxFuture<'a, Result<String, TierError>> {
            async move {
                tokio::time::sleep(Duration::from_secs(100)).await;
                Ok("too late".to_string())
            }
            .boxed()
        }
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_generate_endpoint() {
        let (server, _) = server();
        let request = Request::post("/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"prompt":"hi"}"#))
            .unwrap();

        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let body: GenerateResponse = body_json(response).await;
        assert_eq!(body.text, "echo: hi");
        assert_eq!(body.tier_used, "primary");
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_outlives_request_timeout() {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let breaker = CircuitBreakerConfig::default().with_timeout_seconds(5.0);
        let chain = Arc::new(
            FallbackChain::builder()
                .tier("primary", registry.get_or_create("primary", breaker.clone()), Arc::new(Hang))
                .tier("secondary", registry.get_or_create("secondary", breaker), Arc::new(Hang))
                .build(),
        );
        let mut config = ServiceConfig::default();
        config.listener.request_timeout_secs = 8;
        let state = AppState::new(chain, registry.clone(), None, config.admin.clone());
        let server = HttpServer::new(&config, state);

        let request = Request::post("/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"prompt":"hi"}"#))
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: GenerateResponse = body_json(response).await;
        assert_eq!(body.tier_used, "degraded");
        for name in ["primary", "secondary"] {
            let stats = registry.get(name).unwrap().stats();
            assert_eq!(stats.total_requests, 1);
            assert_eq!(stats.total_timeouts, 1);
        }
    }

    #[tokio::test]
    async fn test_health_reports_degraded_when_open() {
        let (server, registry) = server();
        let request = || Request::get("/health").body(Body::empty()).unwrap();

        let response = server.router().oneshot(request()).await.unwrap();
        let body: HealthStatus = body_json(response).await;
        assert_eq!(body.status, "ok");

        registry.get("primary").unwrap().force_open();
        let response = server.router().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: HealthStatus = body_json(response).await;
        assert_eq!(body.status, "degraded");
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let (server, _) = server();
        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_admin_routes_absent_when_disabled() {
        let (server, _) = server();
        let request = Request::post("/admin/circuit-breakers/reset").body(Body::empty()).unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
