//! Server-Sent Events relay.
//!
//! # Responsibilities
//! - Cap the number of concurrently open relays
//! - Open the upstream stream and relay chunks unmodified, in order
//! - Close the upstream side when the client goes away
//! - End the relay when the upstream is idle for too long
//!
//! # Data Flow
//! ```text
//! upstream body ──(pump task)──► bounded channel ──► client response body
//!                    │
//!                    ├─ tx.closed()   : client dropped the body → drop upstream
//!                    └─ idle timeout  : no chunk in time        → end stream
//! ```
//!
//! # Design Decisions
//! - The cap is a semaphore; acquisition never waits, a full cap is a 503
//! - The permit lives inside the pump task, so it is released on every exit path
//! - No buffering beyond the channel capacity

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, StatusCode},
};
use futures_util::StreamExt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::forward::engine::describe;
use crate::forward::{ForwardBody, ForwardResult, Forwarder, OutboundRequest};
use crate::observability::metrics;
use crate::security::headers::{is_bodiless, sanitize_response_headers};

const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

/// Ceiling on concurrently open relays.
#[derive(Debug, Clone)]
pub struct StreamLimiter {
    semaphore: Option<Arc<Semaphore>>,
    limit: usize,
    active: Arc<AtomicUsize>,
}

impl StreamLimiter {
    /// `None` disables the ceiling.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            semaphore: limit.map(|n| Arc::new(Semaphore::new(n))),
            limit: limit.unwrap_or(0),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Take a slot, or fail immediately when none is free.
    pub fn try_acquire(&self) -> Result<StreamPermit, GatewayError> {
        let permit = match &self.semaphore {
            Some(semaphore) => match semaphore.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    metrics::record_stream_rejected();
                    return Err(GatewayError::StreamingCapacityExceeded { limit: self.limit });
                }
            },
            None => None,
        };

        self.active.fetch_add(1, Ordering::SeqCst);
        metrics::record_stream_opened();
        Ok(StreamPermit {
            _permit: permit,
            active: self.active.clone(),
        })
    }

    /// Relays currently holding a slot.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|_| self.limit)
    }
}

/// A relay slot. Released on drop.
#[derive(Debug)]
pub struct StreamPermit {
    _permit: Option<OwnedSemaphorePermit>,
    active: Arc<AtomicUsize>,
}

impl Drop for StreamPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        metrics::record_stream_closed();
    }
}

/// Opens upstream event streams and pipes them to the client.
#[derive(Clone)]
pub struct StreamingRelay {
    forwarder: Forwarder,
    limiter: StreamLimiter,
    idle_timeout: Duration,
    channel_capacity: usize,
}

impl StreamingRelay {
    pub fn new(config: &GatewayConfig, forwarder: Forwarder) -> Self {
        let limit = config
            .streaming
            .cap_enabled
            .then_some(config.streaming.max_concurrent);
        Self {
            forwarder,
            limiter: StreamLimiter::new(limit),
            idle_timeout: config.timeouts.stream_idle(),
            channel_capacity: config.streaming.channel_capacity.max(1),
        }
    }

    pub fn limiter(&self) -> &StreamLimiter {
        &self.limiter
    }

    /// Open the upstream stream and return a response whose body relays it.
    ///
    /// Waiting for upstream headers is bounded by the idle timeout.
    pub async fn relay(
        &self,
        outbound: OutboundRequest,
        request_id: &str,
    ) -> Result<ForwardResult, GatewayError> {
        let permit = self.limiter.try_acquire().inspect_err(|_| {
            tracing::warn!(
                request_id = %request_id,
                active = self.limiter.active(),
                "Streaming capacity reached, rejecting relay"
            );
        })?;

        let request = self.forwarder.build(&outbound)?;
        let method = outbound.method;
        let response = tokio::time::timeout(self.idle_timeout, self.forwarder.client().request(request))
            .await
            .map_err(|_| GatewayError::timeout(self.idle_timeout))?
            .map_err(|e| GatewayError::connect(describe(&e)))?;

        let (parts, body) = response.into_parts();
        let headers = relay_headers(
            &parts.headers,
            parts.status,
            is_bodiless(&method, parts.status),
        );

        tracing::info!(
            request_id = %request_id,
            status = parts.status.as_u16(),
            active = self.limiter.active(),
            "Stream opened"
        );

        let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(self.channel_capacity);
        tokio::spawn(pump(
            Body::new(body),
            tx,
            self.idle_timeout,
            request_id.to_string(),
            permit,
        ));

        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        Ok(ForwardResult {
            status: parts.status,
            headers,
            body: ForwardBody::Stream(Body::from_stream(stream)),
            malformed_json: false,
        })
    }
}

/// Client-facing headers for a relayed stream. Event-stream framing is only
/// added to successful responses; an upstream error is relayed as sent.
fn relay_headers(upstream: &HeaderMap, status: StatusCode, bodiless: bool) -> HeaderMap {
    let mut headers = sanitize_response_headers(upstream, bodiless);
    if status.is_success() {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(X_ACCEL_BUFFERING, HeaderValue::from_static("no"));
        headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("text/event-stream"));
    }
    headers
}

/// Move chunks from upstream to the client channel until either side ends.
async fn pump(
    upstream: Body,
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
    idle: Duration,
    request_id: String,
    _permit: StreamPermit,
) {
    let mut upstream = upstream.into_data_stream();
    let mut chunks: u64 = 0;

    loop {
        tokio::select! {
            _ = tx.closed() => {
                tracing::info!(request_id = %request_id, chunks, "Client disconnected, cancelling upstream stream");
                break;
            }
            next = tokio::time::timeout(idle, upstream.next()) => match next {
                Ok(Some(Ok(chunk))) => {
                    chunks += 1;
                    if tx.send(Ok(chunk)).await.is_err() {
                        tracing::info!(request_id = %request_id, chunks, "Client disconnected, cancelling upstream stream");
                        break;
                    }
                }
                Ok(Some(Err(e))) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Upstream stream failed");
                    metrics::record_upstream_error("body");
                    let _ = tx.send(Err(io::Error::other(e.to_string()))).await;
                    break;
                }
                Ok(None) => {
                    tracing::info!(request_id = %request_id, chunks, "Upstream stream completed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(request_id = %request_id, idle_ms = idle.as_millis() as u64, "Upstream stream idle, closing");
                    metrics::record_upstream_error("timeout");
                    break;
                }
            }
        }
    }
}
