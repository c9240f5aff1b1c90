//! Resilient model-serving front end.
//!
//! Serves `POST /generate` through an ordered chain of inference tiers, each
//! guarded by its own circuit breaker, degrading to cached and then static
//! responses when every tier is unavailable.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │               SERVING RESILIENCE                 │
//!                         │                                                  │
//!   POST /generate        │  ┌────────┐    ┌──────────────┐                  │
//!   ──────────────────────┼─▶│  http  │───▶│   fallback   │                  │
//!                         │  │ server │    │    chain     │                  │
//!                         │  └────────┘    └──────┬───────┘                  │
//!                         │                       │ in priority order        │
//!                         │                       ▼                          │
//!                         │   ┌───────────────────────────────────────┐      │
//!                         │   │ tier 1: breaker → HTTP backend        │──────┼──▶ Model
//!                         │   │ tier 2: breaker → HTTP backend        │──────┼──▶ Model
//!                         │   │ ...                                   │      │
//!                         │   └───────────────────┬───────────────────┘      │
//!                         │                       │ all failed               │
//!                         │                       ▼                          │
//!                         │          cache lookup → degraded message         │
//!                         │                                                  │
//!                         │  ┌────────────────────────────────────────────┐  │
//!                         │  │           Cross-Cutting Concerns           │  │
//!                         │  │  config │ observability │ admin │ lifecycle│  │
//!                         │  └────────────────────────────────────────────┘  │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use serving_resilience::config::{load_config, ServiceConfig};
use serving_resilience::lifecycle::{self, Shutdown};
use serving_resilience::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "serving-resilience")]
#[command(about = "Circuit-breaking, degrading front end for model-serving backends", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "serving-resilience starting"
    );

    if config.tiers.is_empty() {
        tracing::warn!("No tiers configured, every request will be served degraded");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        tiers = config.tiers.len(),
        cache_enabled = config.cache.enabled,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    let handle = if config.observability.metrics_enabled {
        metrics::init_metrics()
    } else {
        None
    };

    let service = lifecycle::build_service(config, handle)?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    lifecycle::run(service, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
