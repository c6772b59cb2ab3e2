//! Request-path error taxonomy.
//!
//! Every failure the gateway detects is converted into a well-formed HTTP
//! response with a stable JSON envelope:
//!
//! ```text
//! {"success": false, "data": null, "error": {"code": "...", "message": "...", "requestId": "..."}}
//! ```
//!
//! Upstream error statuses (`upstream_non_2xx`) and malformed upstream
//! bodies are *not* represented here: those responses are relayed as-is.

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use std::time::Duration;

/// Why an upstream call could not produce a usable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreachableReason {
    /// DNS, connection refused, reset before headers.
    Connect,
    /// Hard deadline or idle timeout expired.
    Timeout,
    /// Upstream body failed mid-read or exceeded the size bound.
    Body,
}

impl UnreachableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnreachableReason::Connect => "connect",
            UnreachableReason::Timeout => "timeout",
            UnreachableReason::Body => "body",
        }
    }
}

impl fmt::Display for UnreachableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while handling a single inbound request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("authentication required")]
    AuthRequired,

    #[error("no route for {path}")]
    RouteNotFound { path: String },

    #[error("method {method} not allowed")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("upstream unreachable ({reason}): {detail}")]
    UpstreamUnreachable {
        reason: UnreachableReason,
        detail: String,
    },

    #[error("streaming capacity of {limit} concurrent connections reached")]
    StreamingCapacityExceeded { limit: usize },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("request body could not be read: {0}")]
    BodyUnreadable(String),

    #[error("client closed the request before a response was sent")]
    ClientClosedRequest,

    #[error("cannot build upstream target: {0}")]
    InvalidTarget(String),
}

impl GatewayError {
    pub fn timeout(after: Duration) -> Self {
        GatewayError::UpstreamUnreachable {
            reason: UnreachableReason::Timeout,
            detail: format!("no response within {}ms", after.as_millis()),
        }
    }

    pub fn connect(err: impl fmt::Display) -> Self {
        GatewayError::UpstreamUnreachable {
            reason: UnreachableReason::Connect,
            detail: err.to_string(),
        }
    }

    pub fn body(err: impl fmt::Display) -> Self {
        GatewayError::UpstreamUnreachable {
            reason: UnreachableReason::Body,
            detail: err.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::AuthRequired => "auth_required",
            GatewayError::RouteNotFound { .. } => "route_not_found",
            GatewayError::MethodNotAllowed { .. } => "method_not_allowed",
            GatewayError::UpstreamUnreachable { .. } => "upstream_unreachable",
            GatewayError::StreamingCapacityExceeded { .. } => "streaming_capacity_exceeded",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::BodyUnreadable(_) => "request_body_unreadable",
            GatewayError::ClientClosedRequest => "client_closed_request",
            GatewayError::InvalidTarget(_) => "invalid_target",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::AuthRequired => StatusCode::UNAUTHORIZED,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::UpstreamUnreachable {
                reason: UnreachableReason::Timeout,
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamUnreachable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::StreamingCapacityExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BodyUnreadable(_) => StatusCode::BAD_REQUEST,
            GatewayError::ClientClosedRequest => client_closed_request(),
            GatewayError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Render the JSON envelope, tagging it with the per-call request id.
    pub fn into_response_with_id(self, request_id: Option<&str>) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "success": false,
            "data": null,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "requestId": request_id,
            }
        });

        let mut response = (status, Json(body)).into_response();
        if let GatewayError::MethodNotAllowed { allowed, .. } = &self {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}

/// Non-standard 499, as logged by nginx for calls the client abandoned.
fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.into_response_with_id(None)
    }
}
