//! Per-call request context.
//!
//! # Responsibilities
//! - Generate a fresh request ID (UUID v4) for every inbound call
//! - Capture what the observation record needs before the request is consumed
//! - Detect clients asking for an event stream
//!
//! # Design Decisions
//! - Inbound `x-request-id` values are never trusted or reused
//! - The ID is not sent upstream; it tags logs, records and the response

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request},
};
use std::time::Instant;
use uuid::Uuid;

use crate::observability::ObservationRecord;

/// Identity and timing of one inbound call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: String,
    pub method: Method,
    pub path: String,
    pub started: Instant,
    /// Wall-clock start in milliseconds since the epoch.
    pub timestamp: u64,
}

impl RequestContext {
    pub fn new(request: &Request<Body>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            started: Instant::now(),
            timestamp: ObservationRecord::now_millis(),
        }
    }
}

/// Route name and backend path once known; kept for the observation record.
#[derive(Debug, Clone)]
pub struct CallTrace {
    pub route: String,
    pub target_path: String,
}

impl CallTrace {
    pub const UNMATCHED: &'static str = "unmatched";
    pub const CATCH_ALL: &'static str = "catch_all";

    pub fn unmatched() -> Self {
        Self {
            route: Self::UNMATCHED.to_string(),
            target_path: String::new(),
        }
    }
}

/// Whether the client negotiates Server-Sent Events.
pub fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|item| {
            item.split(';')
                .next()
                .map(|mime| mime.trim().eq_ignore_ascii_case("text/event-stream"))
                .unwrap_or(false)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_ids_are_fresh() {
        let request = Request::builder()
            .uri("/a")
            .header("x-request-id", "client-chosen")
            .body(Body::empty())
            .unwrap();
        let a = RequestContext::new(&request);
        let b = RequestContext::new(&request);

        assert_ne!(a.id, b.id);
        assert_ne!(a.id, "client-chosen");
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_wants_event_stream() {
        let mut headers = HeaderMap::new();
        assert!(!wants_event_stream(&headers));

        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!wants_event_stream(&headers));

        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, Text/Event-Stream;q=0.9"),
        );
        assert!(wants_event_stream(&headers));
    }
}
