//! API shield (v1)
//!
//! A demonstration REST backend built with Tokio and Axum that hardens the
//! edges where APIs usually get hurt.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                     API SHIELD                       │
//!                   │                                                      │
//!  Client Request   │  ┌──────────┐   ┌──────────┐   ┌─────────────────┐   │
//!  ─────────────────┼─▶│ identity │──▶│   rate   │──▶│ fetch-external  │   │
//!                   │  │          │   │  limit   │   │    handler      │   │
//!                   │  └──────────┘   └──────────┘   └────────┬────────┘   │
//!                   │                                         │            │
//!                   │                                         ▼            │
//!                   │  ┌──────────┐   ┌──────────┐   ┌─────────────────┐   │
//!                   │  │  schema  │◀──│  timed   │◀──│ circuit breaker │   │
//!                   │  │  check   │   │   GET    │   │  + URL guard    │   │  External
//!                   │  └────┬─────┘   └────┬─────┘   └─────────────────┘   │    API
//!  Client Response  │       │              └───────────────────────────────┼───────▶
//!  ◀────────────────┼───────┘                                              │
//!                   └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_shield::config::{load_config, validation::validate_config, ConfigError, ShieldConfig};
use api_shield::http::HttpServer;
use api_shield::lifecycle::Shutdown;
use api_shield::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "api-shield")]
#[command(about = "Rate-limited, SSRF-guarded REST backend", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = ShieldConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("api-shield v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_capacity = config.rate_limit.capacity,
        refill_period_secs = config.rate_limit.refill_period_secs,
        failure_threshold = config.circuit_breaker.failure_threshold,
        outbound_timeout_secs = config.timeouts.outbound_request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
