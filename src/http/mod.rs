//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, timeout)
//!     → POST /generate → FallbackChain
//!     → GET /circuit-breakers, /stats, /health → StatisticsReporter
//!     → GET /metrics → Prometheus handle
//!     → /admin/* → admin router (bearer auth)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{request_id, X_REQUEST_ID};
pub use server::{AppState, HealthStatus, HttpServer};
