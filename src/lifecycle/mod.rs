//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Registry → Cache → Tier client → Chain → Server → Bind
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Server drains, purge loop exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listener
//! - No hot reload: breaker thresholds are fixed for the life of the process

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_service, run, Service, StartupError};
