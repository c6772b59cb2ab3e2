//! Header sanitization and gateway response headers.
//!
//! # Responsibilities
//! - Strip hop-by-hop and request-specific headers before forwarding
//! - Strip hop-by-hop headers from upstream responses before relaying
//! - Name the headers the gateway adds to every response
//!
//! # Design Decisions
//! - Pure functions over `HeaderMap`; order and repeated values preserved
//! - Everything not listed passes through, including `authorization`,
//!   `cookie` and `x-forwarded-for`
//! - Headers nominated by the inbound `Connection` header are hop-by-hop too

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::collections::HashSet;

/// Marker proving a response went through the gateway.
pub const GATEWAY_MARKER: HeaderName = HeaderName::from_static("x-bff-gateway");
pub const GATEWAY_MARKER_VALUE: HeaderValue = HeaderValue::from_static("1");

/// Crawler exclusion; gateway paths are internal API surfaces.
pub const ROBOTS_TAG: HeaderName = HeaderName::from_static("x-robots-tag");
pub const ROBOTS_TAG_VALUE: HeaderValue = HeaderValue::from_static("noindex, nofollow");

/// Per-call correlation identifier.
pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Removed from inbound requests.
const REQUEST_STRIP: &[&str] = &[
    "connection",
    "content-length",
    "accept-encoding",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Removed from upstream responses. `content-length` is recomputed by the
/// server from the relayed body, unless the response is bodiless.
const RESPONSE_STRIP: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Copy of `incoming` safe to attach to a new outbound request.
pub fn sanitize_request_headers(incoming: &HeaderMap) -> HeaderMap {
    filter(incoming, REQUEST_STRIP)
}

/// Copy of an upstream response's headers safe to relay to the client.
///
/// For a bodiless response the upstream `content-length` describes the
/// entity, not the (empty) relayed body, so it is kept.
pub fn sanitize_response_headers(upstream: &HeaderMap, bodiless: bool) -> HeaderMap {
    let mut out = filter(upstream, RESPONSE_STRIP);
    if bodiless {
        if let Some(length) = upstream.get(header::CONTENT_LENGTH) {
            out.insert(header::CONTENT_LENGTH, length.clone());
        }
    }
    out
}

/// Responses that never carry a body: answers to HEAD, 204 and 304.
pub fn is_bodiless(method: &Method, status: StatusCode) -> bool {
    *method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

fn filter(source: &HeaderMap, strip: &[&str]) -> HeaderMap {
    let nominated = connection_tokens(source);
    let mut out = HeaderMap::with_capacity(source.len());

    for (name, value) in source.iter() {
        let name_str = name.as_str();
        if strip.contains(&name_str) || nominated.contains(name_str) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Header names listed in `Connection: a, b` values, lowercased.
fn connection_tokens(headers: &HeaderMap) -> HashSet<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Insert the per-call request id on a gateway response.
pub fn set_request_id(headers: &mut HeaderMap, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID, value);
    }
}
