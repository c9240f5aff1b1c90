//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use serving_resilience::fallback::{GenerateRequest, InferenceBackend, TierError};
use tokio::net::TcpListener;

type Handler = Arc<dyn Fn(String) -> BoxFuture<'static, (u16, String)> + Send + Sync>;

/// Start a model backend on an ephemeral port whose answer to each prompt is
/// computed by `f`. A 200 answer is wrapped as `{"text": ...}`.
///
/// Returns the `/generate` URL.
pub async fn start_programmable_backend<F, Fut>(f: F) -> String
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let handler: Handler = Arc::new(move |prompt| f(prompt).boxed());
    let app = Router::new()
        .route("/generate", post(generate))
        .with_state(handler);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    format!("http://{addr}/generate")
}

/// A backend that always answers 200 with `text`.
pub async fn start_mock_backend(text: &'static str) -> String {
    start_programmable_backend(move |_| async move { (200, text.to_string()) }).await
}

async fn generate(
    State(handler): State<Handler>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    let (status, text) = handler(prompt).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_success() {
        (status, Json(json!({ "text": text })))
    } else {
        (status, Json(json!({ "error": text })))
    }
}

/// In-process backend that counts invocations and fails on demand.
pub struct CountingBackend {
    calls: AtomicU32,
    failing: std::sync::atomic::AtomicBool,
    delay: Duration,
    text: String,
}

impl CountingBackend {
    pub fn succeeding(text: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failing: false.into(),
            delay: Duration::ZERO,
            text: text.to_string(),
        })
    }

    pub fn failing() -> Arc<Self> {
        let backend = Self::succeeding("");
        backend.set_failing(true);
        backend
    }

    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            failing: false.into(),
            delay,
            text: text.to_string(),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceBackend for CountingBackend {
    fn invoke<'a>(&'a self, _request: &'a GenerateRequest) -> BoxFuture<'a, Result<String, TierError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                Err(TierError::Unavailable("injected failure".into()))
            } else {
                Ok(self.text.clone())
            }
        }
        .boxed()
    }
}
