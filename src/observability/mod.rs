//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, chain and HTTP layer produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → GET /metrics (Prometheus scrape)
//!     → reporter.rs → GET /circuit-breakers, GET /stats
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Request ID flows through the HTTP layer
//! - Metrics are cheap (atomic increments)
//! - The reporter reads committed counters only; it never waits on a call

pub mod logging;
pub mod metrics;
pub mod reporter;

pub use reporter::{ServiceStats, StatisticsReporter};
