//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and build the server
//! - Start the metrics exporter when enabled
//! - Bind the listener last

use tokio::net::TcpListener;

use crate::config::{ConfigError, GatewayConfig};
use crate::http::GatewayServer;
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Build a server from `config` and bind its listener.
pub async fn start(config: GatewayConfig) -> Result<(GatewayServer, TcpListener), StartupError> {
    let server = GatewayServer::new(config)?;
    let observability = &server.config().observability;

    if observability.metrics_enabled {
        match observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let address = server.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    Ok((server, listener))
}
