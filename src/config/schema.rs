//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file (or no file) is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::security::auth::AuthPolicy;

/// Local-development backend when neither the file nor the environment
/// provides one.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend compute service the gateway forwards to.
    pub backend: BackendConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// SSE relay settings.
    pub streaming: StreamingConfig,

    /// 1:1 catch-all mount.
    pub catch_all: CatchAllConfig,

    /// Diagnostics endpoints and observation ring.
    pub diagnostics: DiagnosticsConfig,

    /// Session lookup settings.
    pub auth: AuthConfig,

    /// Body size limits.
    pub limits: LimitsConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Load the built-in frontend route table before `routes`.
    pub include_builtin_routes: bool,

    /// Additional route mappings.
    pub routes: Vec<RouteConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            backend: BackendConfig::default(),
            timeouts: TimeoutConfig::default(),
            streaming: StreamingConfig::default(),
            catch_all: CatchAllConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
            include_builtin_routes: true,
            routes: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every target path is appended to (http only).
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
        }
    }
}

/// A route mapping declared in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Inbound path pattern, e.g. `/api/v2/tasks/{id}` or `/api/v2/files/{*rest}`.
    pub path: String,

    /// Allowed methods; empty means any.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Backend path template, may reuse the captures of `path`.
    pub target: String,

    /// Append the inbound query string verbatim.
    #[serde(default)]
    pub append_search: bool,

    /// Outbound method regardless of the inbound one.
    #[serde(default)]
    pub method_override: Option<String>,

    /// Credential policy.
    #[serde(default = "default_route_auth")]
    pub auth: AuthPolicy,

    /// Relay the response as an SSE stream.
    #[serde(default)]
    pub streaming: bool,
}

fn default_route_auth() -> AuthPolicy {
    AuthPolicy::Required
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Hard deadline for a non-streaming call (headers and full body).
    pub request_secs: u64,

    /// Maximum silence on a streaming call before it is dropped.
    pub stream_idle_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn stream_idle(&self) -> Duration {
        Duration::from_secs(self.stream_idle_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            stream_idle_secs: 60,
        }
    }
}

/// SSE relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Enforce `max_concurrent`. When false streams are unbounded.
    pub cap_enabled: bool,

    /// Ceiling on simultaneously relayed streams.
    pub max_concurrent: usize,

    /// Chunks buffered between upstream and client before backpressure.
    pub channel_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            cap_enabled: true,
            max_concurrent: 256,
            channel_capacity: 16,
        }
    }
}

/// Catch-all gateway mount.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatchAllConfig {
    pub enabled: bool,

    /// Mount prefix; `{prefix}/a/b` forwards to `{base_url}/a/b`.
    pub prefix: String,

    pub auth: AuthPolicy,
}

impl Default for CatchAllConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "/api/go".to_string(),
            auth: AuthPolicy::Optional,
        }
    }
}

/// Diagnostics endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,

    /// Mount prefix for `/recent`, `/routes` and `/status`.
    pub prefix: String,

    /// Observation ring capacity.
    pub capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "/__gateway".to_string(),
            capacity: 100,
        }
    }
}

/// Session lookup configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Cookie carrying the session credential when no bearer header is sent.
    pub session_cookie: String,

    /// Header the web tier sets with the authenticated principal.
    pub principal_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: "bff_session".to_string(),
            principal_header: "x-user-id".to_string(),
        }
    }
}

/// Body size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound request body in bytes.
    pub max_body_bytes: usize,

    /// Maximum buffered upstream response body in bytes.
    pub max_response_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
            max_response_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
