//! Shared utilities for integration testing.
#![allow(dead_code)]

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Request},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use bff_gateway::config::GatewayConfig;
use bff_gateway::http::GatewayServer;
use bff_gateway::lifecycle::Shutdown;
use bff_gateway::observability::ObservabilitySink;
use bff_gateway::security::auth::SessionResolver;

/// A gateway serving on an ephemeral port. Shuts down on drop.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub sink: Arc<ObservabilitySink>,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Gateway config pointing at `backend` with short timeouts.
pub fn test_config(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.backend.base_url = format!("http://{}", backend);
    config.timeouts.connect_secs = 2;
    config.timeouts.request_secs = 3;
    config.timeouts.stream_idle_secs = 5;
    config
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    start_gateway_with(config, None).await
}

pub async fn start_gateway_with(
    config: GatewayConfig,
    resolver: Option<Arc<dyn SessionResolver>>,
) -> TestGateway {
    let mut server = GatewayServer::new(config).expect("valid test config");
    if let Some(resolver) = resolver {
        server = server.with_session_resolver(resolver);
    }
    let sink = server.sink();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestGateway { addr, sink, shutdown }
}

/// Test client: no proxy, no redirects, no pooling.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// An address nothing listens on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// What a mock backend saw.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type Captures = Arc<Mutex<Vec<CapturedRequest>>>;

/// Start an axum backend that records every request and answers with
/// `respond`.
pub async fn start_capturing_backend<F>(respond: F) -> (SocketAddr, Captures)
where
    F: Fn(&CapturedRequest) -> Response + Send + Sync + 'static,
{
    let captures: Captures = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let seen = captures.clone();
    let app = Router::new().fallback(move |request: Request<axum::body::Body>| {
        let seen = seen.clone();
        let respond = respond.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, 1 << 20).await.unwrap_or_default();
            let captured = CapturedRequest {
                method: parts.method,
                path: parts.uri.path().to_string(),
                query: parts.uri.query().map(str::to_string),
                headers: parts.headers,
                body,
            };
            let response = respond(&captured);
            seen.lock().unwrap().push(captured);
            response
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, captures)
}

/// Capturing backend that answers `200 {"ok":true}`.
pub async fn start_json_backend() -> (SocketAddr, Captures) {
    start_capturing_backend(|_| {
        (
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            r#"{"ok":true}"#,
        )
            .into_response()
    })
    .await
}

/// Accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Raw-TCP backend that answers every request head with `response`
/// verbatim and keeps the connection open.
pub async fn start_raw_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    head.clear();
                    if socket.write_all(response.as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    addr
}

/// Raw-TCP SSE upstream. Emits one event every `interval` until the peer
/// goes away, then sets the flag.
pub struct SseUpstream {
    pub addr: SocketAddr,
    pub closed: Arc<AtomicBool>,
    pub connections: Arc<AtomicUsize>,
}

pub async fn start_sse_upstream(interval: Duration) -> SseUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let closed = Arc::new(AtomicBool::new(false));
    let connections = Arc::new(AtomicUsize::new(0));

    let flag = closed.clone();
    let count = connections.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let flag = flag.clone();
            count.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let (mut rd, mut wr) = socket.into_split();

                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match rd.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }

                let preamble = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n";
                if wr.write_all(preamble.as_bytes()).await.is_err() {
                    flag.store(true, Ordering::SeqCst);
                    return;
                }

                let mut ticker = tokio::time::interval(interval);
                let mut seq = 0u64;
                loop {
                    tokio::select! {
                        read = rd.read(&mut buf) => {
                            if matches!(read, Ok(0) | Err(_)) {
                                flag.store(true, Ordering::SeqCst);
                                return;
                            }
                        }
                        _ = ticker.tick() => {
                            let event = format!("data: {}\n\n", seq);
                            let chunk = format!("{:x}\r\n{}\r\n", event.len(), event);
                            seq += 1;
                            if wr.write_all(chunk.as_bytes()).await.is_err() {
                                flag.store(true, Ordering::SeqCst);
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    SseUpstream {
        addr,
        closed,
        connections,
    }
}

/// Poll `cond` until it holds or `within` elapses.
pub async fn eventually(within: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}
