//! Inference tiers.
//!
//! # Responsibilities
//! - Define the operation a breaker protects for each tier
//! - Reach a model-serving backend over HTTP
//!
//! # Design Decisions
//! - Backends are trait objects so the chain can mix HTTP tiers with
//!   in-process ones (and tests can inject failures)
//! - The HTTP client is shared across tiers; its lifecycle belongs to the
//!   caller, not the chain

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use thiserror::Error;

use crate::fallback::request::GenerateRequest;
use crate::resilience::CircuitBreaker;

/// Errors raised by a tier backend. All of them count as breaker failures.
#[derive(Debug, Error)]
pub enum TierError {
    /// Backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection or protocol failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered 2xx but the body was not a completion.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// Backend refused the request for a reason of its own.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A dependency that can turn a request into generated text.
pub trait InferenceBackend: Send + Sync {
    fn invoke<'a>(&'a self, request: &'a GenerateRequest) -> BoxFuture<'a, Result<String, TierError>>;
}

/// One step of the fallback chain: a named backend behind its own breaker.
#[derive(Clone)]
pub struct Tier {
    pub name: String,
    pub breaker: Arc<CircuitBreaker>,
    pub backend: Arc<dyn InferenceBackend>,
}

impl Tier {
    pub fn new(
        name: impl Into<String>,
        breaker: Arc<CircuitBreaker>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            breaker,
            backend,
        }
    }
}

impl std::fmt::Debug for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tier")
            .field("name", &self.name)
            .field("breaker", &self.breaker.name())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    text: String,
}

/// Model-serving backend reached with a JSON `POST`.
///
/// Sends the [`GenerateRequest`] as the body and expects `{"text": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    model: Option<String>,
}

impl HttpBackend {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, model: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl InferenceBackend for HttpBackend {
    fn invoke<'a>(&'a self, request: &'a GenerateRequest) -> BoxFuture<'a, Result<String, TierError>> {
        async move {
            let mut body = request.clone();
            if body.model.is_none() {
                body.model = self.model.clone();
            }

            let response = self.client.post(&self.endpoint).json(&body).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TierError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let completion: CompletionBody = response
                .json()
                .await
                .map_err(|e| TierError::InvalidResponse(e.to_string()))?;
            Ok(completion.text)
        }
        .boxed()
    }
}
