//! Response finalization.
//!
//! # Responsibilities
//! - Turn a forward outcome (success or taxonomy error) into a response
//! - Tag the response with the request ID
//! - Append the observation record, emit metrics and the access log line
//!
//! # Design Decisions
//! - Exactly one record per call, written here and nowhere else
//! - Streams are recorded when their headers are relayed
//! - A call whose handler is dropped before `finish` (client went away) is
//!   recorded by `PendingCall` as 499 `client_closed_request`
//! - Gateway marker headers are added by a router layer, not here

use axum::response::Response;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::forward::ForwardResult;
use crate::http::request::{CallTrace, RequestContext};
use crate::observability::{metrics, ObservabilitySink, ObservationRecord};
use crate::security::headers::set_request_id;

/// Produce the client response and record the call.
pub fn finish(
    sink: &ObservabilitySink,
    ctx: &RequestContext,
    trace: CallTrace,
    outcome: Result<ForwardResult, GatewayError>,
) -> Response {
    let (mut response, error) = match outcome {
        Ok(result) => {
            let error = result.error_code();
            if result.malformed_json {
                metrics::record_malformed_body(&trace.route);
                tracing::warn!(
                    request_id = %ctx.id,
                    route = %trace.route,
                    status = result.status.as_u16(),
                    "Upstream body is not valid JSON, relaying raw"
                );
            }
            (result.into_response(), error)
        }
        Err(err) => {
            if let GatewayError::UpstreamUnreachable { reason, detail } = &err {
                metrics::record_upstream_error(reason.as_str());
                tracing::error!(
                    request_id = %ctx.id,
                    route = %trace.route,
                    target = %trace.target_path,
                    reason = %reason,
                    error = %detail,
                    "Upstream unreachable"
                );
            } else {
                tracing::debug!(
                    request_id = %ctx.id,
                    route = %trace.route,
                    code = err.code(),
                    "Request rejected"
                );
            }
            let code = err.code();
            (err.into_response_with_id(Some(&ctx.id)), Some(code))
        }
    };

    set_request_id(response.headers_mut(), &ctx.id);

    let status = response.status().as_u16();
    let duration_ms = ctx.started.elapsed().as_millis() as u64;

    tracing::info!(
        request_id = %ctx.id,
        method = %ctx.method,
        path = %ctx.path,
        route = %trace.route,
        status,
        duration_ms,
        "Request completed"
    );
    metrics::record_request(ctx.method.as_str(), status, &trace.route, ctx.started);

    sink.record(ObservationRecord {
        timestamp: ctx.timestamp,
        method: ctx.method.to_string(),
        path: ctx.path.clone(),
        target_path: trace.target_path,
        status,
        duration_ms,
        request_id: ctx.id.clone(),
        route: trace.route,
        error: error.map(str::to_string),
    });

    response
}

/// An in-flight call. Either `finish` records it, or dropping it does.
pub struct PendingCall {
    sink: Arc<ObservabilitySink>,
    pub ctx: RequestContext,
    pub trace: CallTrace,
    recorded: bool,
}

impl PendingCall {
    pub fn new(sink: Arc<ObservabilitySink>, ctx: RequestContext, trace: CallTrace) -> Self {
        Self {
            sink,
            ctx,
            trace,
            recorded: false,
        }
    }

    pub fn finish(mut self, outcome: Result<ForwardResult, GatewayError>) -> Response {
        self.recorded = true;
        let trace = std::mem::replace(&mut self.trace, CallTrace::unmatched());
        finish(&self.sink, &self.ctx, trace, outcome)
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if self.recorded {
            return;
        }

        let err = GatewayError::ClientClosedRequest;
        let status = err.status().as_u16();
        let duration_ms = self.ctx.started.elapsed().as_millis() as u64;

        tracing::info!(
            request_id = %self.ctx.id,
            method = %self.ctx.method,
            path = %self.ctx.path,
            route = %self.trace.route,
            status,
            duration_ms,
            "Client closed request before response"
        );
        metrics::record_request(self.ctx.method.as_str(), status, &self.trace.route, self.ctx.started);

        self.sink.record(ObservationRecord {
            timestamp: self.ctx.timestamp,
            method: self.ctx.method.to_string(),
            path: self.ctx.path.clone(),
            target_path: std::mem::take(&mut self.trace.target_path),
            status,
            duration_ms,
            request_id: self.ctx.id.clone(),
            route: std::mem::take(&mut self.trace.route),
            error: Some(err.code().to_string()),
        });
    }
}
