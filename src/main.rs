//! BFF Gateway
//!
//! Sits between the web frontend and the backend compute service. Every
//! frontend call goes through one pipeline.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                     BFF GATEWAY                      │
//!                     │                                                      │
//!   Browser request   │  ┌─────────┐   ┌──────────┐   ┌──────────────────┐   │
//!   ──────────────────┼─▶│  http   │──▶│ routing  │──▶│ security (auth,  │   │
//!                     │  │ server  │   │  table   │   │ header sanitize) │   │
//!                     │  └─────────┘   └──────────┘   └────────┬─────────┘   │
//!                     │                                        ▼             │
//!   Browser response  │  ┌─────────┐                  ┌──────────────────┐   │
//!   ◀─────────────────┼──│response │◀─────────────────│ forward (buffered│◀──┼── Backend
//!                     │  │finalize │                  │  or SSE relay)   │   │
//!                     │  └────┬────┘                  └──────────────────┘   │
//!                     │       ▼                                              │
//!                     │  observability (logs, metrics, recent-call ring)     │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use bff_gateway::config::{load_config, GatewayConfig};
use bff_gateway::lifecycle::{self, signals, Shutdown};
use bff_gateway::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "bff-gateway", version, about = "Backend-For-Frontend gateway")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the file and BFF_BIND_ADDRESS.
    #[arg(long)]
    bind: Option<String>,

    /// Backend base URL, overrides the file and BFF_BACKEND_URL.
    #[arg(long)]
    backend_url: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(url) = &self.backend_url {
            config.backend.base_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bff-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        stream_cap = config.streaming.cap_enabled.then_some(config.streaming.max_concurrent),
        "Configuration loaded"
    );

    let (server, listener) = lifecycle::start(config).await.inspect_err(|e| {
        tracing::error!(error = %e, "Startup failed");
    })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
