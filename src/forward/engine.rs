//! Buffered forwarding engine.
//!
//! # Responsibilities
//! - Own the pooled outbound HTTP client
//! - Build the outbound request against the configured backend base URL
//! - Enforce the connect timeout and the hard request deadline
//! - Read the upstream body under a size bound and flag malformed JSON
//!
//! # Design Decisions
//! - The hyper-util legacy client never follows redirects
//! - The deadline covers connect, headers and body together
//! - Connection failures and timeouts map onto `upstream_unreachable`,
//!   with 502 and 504 respectively

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Request, Uri},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::forward::{ForwardBody, ForwardResult, OutboundRequest};
use crate::security::headers::{is_bodiless, sanitize_response_headers};

/// Pooled client bound to one backend origin.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    base_url: String,
    request_timeout: Duration,
    max_response_bytes: usize,
}

impl Forwarder {
    pub fn new(config: &GatewayConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.timeouts.connect()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            base_url: config.backend.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.timeouts.request(),
            max_response_bytes: config.limits.max_response_bytes,
        }
    }

    pub(crate) fn client(&self) -> &Client<HttpConnector, Body> {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full outbound URI for a prepared request.
    pub fn target_uri(&self, outbound: &OutboundRequest) -> Result<Uri, GatewayError> {
        let raw = format!("{}{}", self.base_url, outbound.path_and_query());
        raw.parse::<Uri>()
            .map_err(|e| GatewayError::InvalidTarget(format!("{}: {}", raw, e)))
    }

    /// Turn a prepared request into a hyper request. `Host` is filled in
    /// by the client from the URI.
    pub fn build(&self, outbound: &OutboundRequest) -> Result<Request<Body>, GatewayError> {
        let uri = self.target_uri(outbound)?;
        let body = match &outbound.body {
            Some(bytes) => Body::from(bytes.clone()),
            None => Body::empty(),
        };

        let mut request = Request::builder()
            .method(outbound.method.clone())
            .uri(uri)
            .body(body)
            .map_err(|e| GatewayError::InvalidTarget(e.to_string()))?;
        *request.headers_mut() = outbound.headers.clone();
        Ok(request)
    }

    /// Issue one buffered call.
    pub async fn forward(&self, outbound: OutboundRequest) -> Result<ForwardResult, GatewayError> {
        let request = self.build(&outbound)?;
        let method = outbound.method;
        let client = self.client.clone();
        let max_response_bytes = self.max_response_bytes;

        let call = async move {
            let response = client
                .request(request)
                .await
                .map_err(|e| GatewayError::connect(describe(&e)))?;
            let (parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(body), max_response_bytes)
                .await
                .map_err(|e| GatewayError::body(describe(&e)))?;
            Ok::<_, GatewayError>((parts, bytes))
        };

        let (parts, bytes) = tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| GatewayError::timeout(self.request_timeout))??;

        let malformed_json = claims_json(&parts.headers) && !parses_as_json(&bytes);
        let bodiless = is_bodiless(&method, parts.status);

        Ok(ForwardResult {
            status: parts.status,
            headers: sanitize_response_headers(&parts.headers, bodiless),
            body: ForwardBody::Buffered(bytes),
            malformed_json,
        })
    }
}

/// Whether the `Content-Type` announces a JSON document.
pub fn claims_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn parses_as_json(bytes: &Bytes) -> bool {
    bytes.is_empty() || serde_json::from_slice::<serde::de::IgnoredAny>(bytes).is_ok()
}

/// Flatten an error and its sources into one line.
pub(crate) fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}
