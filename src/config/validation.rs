//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics and returns every
//! problem found, not just the first. Route table checks live with the
//! route compiler in [`crate::routing::table`] and report through the same
//! error type.

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("backend.base_url `{url}` is invalid: {reason}")]
    BackendUrl { url: String, reason: String },

    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} `{value}` must start with `/` and not end with `/`")]
    MountPrefix { field: &'static str, value: String },

    #[error("catch_all.prefix and diagnostics.prefix must differ")]
    PrefixCollision,

    #[error("route `{route}`: {reason}")]
    Route { route: String, reason: String },
}

/// Validate everything except the route table.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(reason) = check_backend_url(&config.backend.base_url) {
        errors.push(ValidationError::BackendUrl {
            url: config.backend.base_url.clone(),
            reason,
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let positive: [(&'static str, u64); 6] = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.stream_idle_secs", config.timeouts.stream_idle_secs),
        ("streaming.channel_capacity", config.streaming.channel_capacity as u64),
        ("diagnostics.capacity", config.diagnostics.capacity as u64),
        ("limits.max_response_bytes", config.limits.max_response_bytes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    if config.streaming.cap_enabled && config.streaming.max_concurrent == 0 {
        errors.push(ValidationError::Zero {
            field: "streaming.max_concurrent",
        });
    }

    if config.catch_all.enabled && !is_mount_prefix(&config.catch_all.prefix) {
        errors.push(ValidationError::MountPrefix {
            field: "catch_all.prefix",
            value: config.catch_all.prefix.clone(),
        });
    }
    if config.diagnostics.enabled && !is_mount_prefix(&config.diagnostics.prefix) {
        errors.push(ValidationError::MountPrefix {
            field: "diagnostics.prefix",
            value: config.diagnostics.prefix.clone(),
        });
    }
    if config.catch_all.enabled
        && config.diagnostics.enabled
        && config.catch_all.prefix == config.diagnostics.prefix
    {
        errors.push(ValidationError::PrefixCollision);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_backend_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("scheme `{}` is not supported, use http", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(())
}

fn is_mount_prefix(prefix: &str) -> bool {
    prefix.len() > 1 && prefix.starts_with('/') && !prefix.ends_with('/')
}
