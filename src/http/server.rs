//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Validate configuration and compile the route table
//! - Create the Axum router: diagnostics, catch-all mount, mapped fallback
//! - Wire up middleware (tracing, gateway marker headers)
//! - Serve on a listener until shutdown is signalled

use axum::{routing::any, Router};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::admin;
use crate::config::{validate_config, ConfigError, GatewayConfig};
use crate::forward::{Forwarder, StreamingRelay};
use crate::http::gateway::{catch_all_handler, mapped_handler};
use crate::observability::ObservabilitySink;
use crate::routing::RouteTable;
use crate::security::auth::{RequestSessionResolver, SessionResolver};
use crate::security::headers::{GATEWAY_MARKER, GATEWAY_MARKER_VALUE, ROBOTS_TAG, ROBOTS_TAG_VALUE};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub forwarder: Forwarder,
    pub relay: StreamingRelay,
    pub sink: Arc<ObservabilitySink>,
    pub sessions: Arc<dyn SessionResolver>,
    pub config: Arc<GatewayConfig>,
    pub started_at: Instant,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    state: AppState,
}

impl GatewayServer {
    /// Validate `config`, compile routes and build shared state.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let routes = RouteTable::from_config(&config).map_err(ConfigError::Validation)?;

        tracing::info!(
            routes = routes.len(),
            backend = %config.backend.base_url,
            "Route table compiled"
        );

        let forwarder = Forwarder::new(&config);
        let relay = StreamingRelay::new(&config, forwarder.clone());
        let sessions: Arc<dyn SessionResolver> = Arc::new(RequestSessionResolver::new(&config.auth));

        let state = AppState {
            routes: Arc::new(routes),
            forwarder,
            relay,
            sink: Arc::new(ObservabilitySink::new(config.diagnostics.capacity)),
            sessions,
            config: Arc::new(config),
            started_at: Instant::now(),
        };

        Ok(Self { state })
    }

    /// Replace the session collaborator.
    pub fn with_session_resolver(mut self, resolver: Arc<dyn SessionResolver>) -> Self {
        self.state.sessions = resolver;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Shared observation ring.
    pub fn sink(&self) -> Arc<ObservabilitySink> {
        self.state.sink.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.state.forwarder.base_url(),
            "HTTP server starting"
        );

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let mut router = Router::new();

    if config.diagnostics.enabled {
        router = router.nest(
            config.diagnostics.prefix.trim_end_matches('/'),
            admin::diagnostics_router(),
        );
    }

    if config.catch_all.enabled {
        let mount = format!("{}/{{*path}}", config.catch_all.prefix.trim_end_matches('/'));
        router = router.route(&mount, any(catch_all_handler));
    }

    router
        .fallback(mapped_handler)
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            GATEWAY_MARKER,
            GATEWAY_MARKER_VALUE,
        ))
        .layer(SetResponseHeaderLayer::overriding(ROBOTS_TAG, ROBOTS_TAG_VALUE))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    fn server() -> GatewayServer {
        GatewayServer::new(GatewayConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = GatewayConfig::default();
        config.backend.base_url = "ftp://nope".into();
        assert!(matches!(
            GatewayServer::new(config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404_with_gateway_headers() {
        let response = server()
            .router()
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[GATEWAY_MARKER], GATEWAY_MARKER_VALUE);
        assert_eq!(response.headers()[ROBOTS_TAG], ROBOTS_TAG_VALUE);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_required_auth_fails_without_network() {
        // The backend default is never contacted: 401 comes first.
        let server = server();
        let sink = server.sink();
        let response = server
            .router()
            .oneshot(Request::get("/api/v2/tasks/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(sink.recent(1)[0].error.as_deref(), Some("auth_required"));
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let response = server()
            .router()
            .oneshot(
                Request::delete("/api/v2/batchopen/silent/start")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["allow"], "POST");
    }
}
