//! Inbound capture and outbound preparation.
//!
//! # Responsibilities
//! - Read the inbound body exactly once, before any network activity
//! - Drop bodies on GET/HEAD
//! - Compute the outbound method, path and query for a route or the catch-all
//! - Sanitize headers for the new transport leg

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::error::GatewayError;
use crate::routing::ResolvedRoute;
use crate::security::headers::sanitize_request_headers;

/// An inbound request with its body already consumed.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub path: String,
    /// Raw query string, exactly as received, without the leading `?`.
    pub raw_query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ForwardRequest {
    /// Take apart an inbound request, reading at most `max_body` bytes.
    ///
    /// A body over the limit is rejected with 413. Any other read failure
    /// means the client broke off the upload.
    pub async fn from_request(request: Request<Body>, max_body: usize) -> Result<Self, GatewayError> {
        let (parts, body) = request.into_parts();

        let body = if carries_body(&parts.method) {
            let collected = Limited::new(body, max_body).collect().await.map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    GatewayError::PayloadTooLarge { limit: max_body }
                } else {
                    GatewayError::BodyUnreadable(e.to_string())
                }
            })?;
            Some(collected.to_bytes())
        } else {
            None
        };

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            raw_query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }
}

fn carries_body(method: &Method) -> bool {
    *method != Method::GET && *method != Method::HEAD
}

/// Everything needed to issue the outbound call.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Backend path without query.
    pub target_path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    /// Outbound request for a mapped route.
    pub fn for_route(request: ForwardRequest, route: &ResolvedRoute<'_>) -> Self {
        let mapping = route.mapping;
        let method = mapping.effective_method(&request.method);
        let query = if mapping.append_search {
            request.raw_query
        } else {
            None
        };
        Self::build(method, route.target_path.clone(), query, &request.headers, request.body)
    }

    /// Outbound request for the catch-all: same method, same sub-path, same query.
    pub fn passthrough(request: ForwardRequest, sub_path: &str) -> Self {
        let target_path = format!("/{}", sub_path.trim_start_matches('/'));
        Self::build(
            request.method,
            target_path,
            request.raw_query,
            &request.headers,
            request.body,
        )
    }

    fn build(
        method: Method,
        target_path: String,
        query: Option<String>,
        inbound_headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        let body = body.filter(|_| carries_body(&method));
        Self {
            method,
            target_path,
            query,
            headers: sanitize_request_headers(inbound_headers),
            body,
        }
    }

    /// Path plus query as it will appear on the wire. A bare `?` on the
    /// inbound request is kept.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.target_path, q),
            None => self.target_path.clone(),
        }
    }
}
