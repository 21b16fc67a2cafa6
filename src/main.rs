//! Travel Resilience Core (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                  TRAVEL RESILIENCE CORE                  │
//!                    │                                                          │
//!   Client Request   │  ┌─────────┐    ┌──────────────┐    ┌───────────────┐   │
//!  ──────────────────┼─▶│  http   │───▶│ orchestrator │───▶│ response cache│   │
//!                    │  │ server  │    │  (per op)    │    └───────────────┘   │
//!                    │  └─────────┘    └──────┬───────┘                        │
//!                    │                        │ miss                           │
//!                    │                        ▼                                │
//!                    │        ┌─────────────────────────────────┐              │
//!                    │        │ retry → circuit breaker → client│──────────────┼──▶ Dependency
//!                    │        └───────────────┬─────────────────┘              │
//!                    │                        │ exhausted / open               │
//!                    │                        ▼                                │
//!                    │                ┌──────────────┐   ┌───────────────┐     │
//!                    │                │   fallback   │   │ health graph  │     │
//!                    │                │   registry   │   │ (propagation) │     │
//!                    │                └──────────────┘   └───────────────┘     │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use travel_resilience::config::{load_config, ResilienceConfig};
use travel_resilience::lifecycle::spawn_signal_handler;
use travel_resilience::observability::{logging, metrics};
use travel_resilience::orchestrator::spawn_cache_sweeper;
use travel_resilience::orchestrator::travel::travel_fallbacks;
use travel_resilience::{HttpServer, Orchestrator, Shutdown};

#[derive(Parser)]
#[command(name = "travel-resilience")]
#[command(about = "Resilience core for travel dependencies", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "travel-resilience starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        dependencies = config.dependencies.len(),
        edges = config.edges.len(),
        operation_deadline_ms = config.deadlines.operation_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = Arc::new(Orchestrator::from_config(&config, travel_fallbacks())?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_handler(shutdown.clone());
    if config.cache.sweep_interval_secs > 0 {
        spawn_cache_sweeper(
            orchestrator.clone(),
            Duration::from_secs(config.cache.sweep_interval_secs),
            shutdown.clone(),
        );
    }

    let server = HttpServer::new(orchestrator, &config.listener);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
