//! Gateway request pipelines.
//!
//! # Data Flow
//! ```text
//! mapped:    resolve route → session → read body → outbound → inject auth → forward | relay
//! catch-all: strip prefix  → session → read body → outbound → inject auth → forward | relay
//!                                                                         → response.rs
//! ```
//!
//! Both pipelines short-circuit with a taxonomy error before any network
//! activity when the route, method, body or credential is unacceptable.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
};

use crate::error::GatewayError;
use crate::forward::{ForwardRequest, ForwardResult, OutboundRequest};
use crate::http::request::{wants_event_stream, CallTrace, RequestContext};
use crate::http::response::PendingCall;
use crate::http::server::AppState;
use crate::security::auth::{inject, AuthPolicy};

/// Route-table pipeline. Mounted as the router fallback.
pub async fn mapped_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let ctx = RequestContext::new(&request);
    let mut call = PendingCall::new(state.sink.clone(), ctx, CallTrace::unmatched());
    let outcome = forward_mapped(&state, &call.ctx, &mut call.trace, request).await;
    call.finish(outcome)
}

async fn forward_mapped(
    state: &AppState,
    ctx: &RequestContext,
    trace: &mut CallTrace,
    request: Request<Body>,
) -> Result<ForwardResult, GatewayError> {
    let resolved = state.routes.resolve(&ctx.method, &ctx.path)?;
    trace.route = resolved.mapping.name.clone();
    trace.target_path = resolved.target_path.clone();

    tracing::debug!(
        request_id = %ctx.id,
        route = %resolved.mapping.name,
        target = %resolved.target_path,
        "Route matched"
    );

    let policy = resolved.mapping.auth;
    let streaming = resolved.mapping.streaming;

    let (parts, body) = request.into_parts();
    let session = state.sessions.resolve(&parts.headers).await;
    if policy == AuthPolicy::Required && !session.present {
        return Err(GatewayError::AuthRequired);
    }

    let request = Request::from_parts(parts, body);
    let inbound = ForwardRequest::from_request(request, state.config.limits.max_body_bytes).await?;
    let mut outbound = OutboundRequest::for_route(inbound, &resolved);
    inject(policy, &session, &mut outbound.headers)?;

    dispatch(state, ctx, outbound, streaming).await
}

/// 1:1 pipeline under the catch-all prefix.
pub async fn catch_all_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let ctx = RequestContext::new(&request);
    let trace = CallTrace {
        route: CallTrace::CATCH_ALL.to_string(),
        target_path: String::new(),
    };
    let mut call = PendingCall::new(state.sink.clone(), ctx, trace);
    let outcome = forward_catch_all(&state, &call.ctx, &mut call.trace, request).await;
    call.finish(outcome)
}

async fn forward_catch_all(
    state: &AppState,
    ctx: &RequestContext,
    trace: &mut CallTrace,
    request: Request<Body>,
) -> Result<ForwardResult, GatewayError> {
    let prefix = state.config.catch_all.prefix.trim_end_matches('/');
    let sub_path = ctx
        .path
        .strip_prefix(prefix)
        .ok_or_else(|| GatewayError::RouteNotFound {
            path: ctx.path.clone(),
        })?
        .to_string();

    let policy = state.config.catch_all.auth;
    let streaming = wants_event_stream(request.headers());

    let (parts, body) = request.into_parts();
    let session = state.sessions.resolve(&parts.headers).await;
    if policy == AuthPolicy::Required && !session.present {
        return Err(GatewayError::AuthRequired);
    }

    let request = Request::from_parts(parts, body);
    let inbound = ForwardRequest::from_request(request, state.config.limits.max_body_bytes).await?;
    let mut outbound = OutboundRequest::passthrough(inbound, &sub_path);
    trace.target_path = outbound.target_path.clone();
    inject(policy, &session, &mut outbound.headers)?;

    dispatch(state, ctx, outbound, streaming).await
}

async fn dispatch(
    state: &AppState,
    ctx: &RequestContext,
    outbound: OutboundRequest,
    streaming: bool,
) -> Result<ForwardResult, GatewayError> {
    tracing::debug!(
        request_id = %ctx.id,
        method = %outbound.method,
        target = %outbound.path_and_query(),
        streaming,
        "Forwarding request"
    );

    if streaming {
        state.relay.relay(outbound, &ctx.id).await
    } else {
        state.forwarder.forward(outbound).await
    }
}
