//! Outbound forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (handler)
//!     → request.rs (read body once, compute method/path/query, sanitize headers)
//!     → engine.rs (buffered call under a hard deadline)
//!       or streaming.rs (SSE relay under an idle timeout and a concurrency cap)
//!     → ForwardResult → Response
//! ```
//!
//! # Design Decisions
//! - One outbound attempt per inbound request, no retries
//! - Redirects are never followed; 3xx responses are relayed
//! - Upstream bodies are relayed byte-for-byte, even when they claim JSON
//!   and fail to parse
//! - Dropping the response future or the stream body cancels the upstream call

pub mod engine;
pub mod request;
pub mod streaming;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, StatusCode},
    response::Response,
};

pub use engine::Forwarder;
pub use request::{ForwardRequest, OutboundRequest};
pub use streaming::{StreamLimiter, StreamPermit, StreamingRelay};

/// Upstream body as handed back to the client.
pub enum ForwardBody {
    /// Fully read before the response is produced.
    Buffered(Bytes),
    /// Chunks are relayed as they arrive.
    Stream(Body),
}

impl std::fmt::Debug for ForwardBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardBody::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            ForwardBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Outcome of a forwarded call that reached the backend.
#[derive(Debug)]
pub struct ForwardResult {
    pub status: StatusCode,
    /// Upstream headers, already sanitized.
    pub headers: HeaderMap,
    pub body: ForwardBody,
    /// Content-Type claimed JSON but the body did not parse.
    pub malformed_json: bool,
}

impl ForwardResult {
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, ForwardBody::Stream(_))
    }

    /// Taxonomy code recorded for this call, if any.
    pub fn error_code(&self) -> Option<&'static str> {
        if self.malformed_json {
            Some("malformed_upstream_body")
        } else if !(self.status.is_success() || self.status.is_redirection()) {
            Some("upstream_non_2xx")
        } else {
            None
        }
    }

    pub fn into_response(self) -> Response {
        let body = match self.body {
            ForwardBody::Buffered(bytes) => Body::from(bytes),
            ForwardBody::Stream(body) => body,
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
