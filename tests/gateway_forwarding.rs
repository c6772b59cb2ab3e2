//! End-to-end forwarding behaviour against a capturing backend.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use async_trait::async_trait;
use bff_gateway::security::auth::{AuthContext, SessionResolver};

mod common;

const TOKEN: &str = "Bearer session-token";

#[tokio::test]
async fn test_query_preserved_when_appended() {
    let (backend, captures) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .get(gateway.url("/api/v2/tasks/abc?x=1"))
        .header(header::AUTHORIZATION, TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), r#"{"ok":true}"#);

    let seen = captures.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].path, "/api/v2/tasks/abc");
    assert_eq!(seen[0].query.as_deref(), Some("x=1"));
    assert_eq!(seen[0].headers[header::AUTHORIZATION], TOKEN);
}

#[tokio::test]
async fn test_query_dropped_and_body_forwarded() {
    let (backend, captures) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let body = r#"{"urls":["a"]}"#;
    let res = common::client()
        .post(gateway.url("/api/v2/batchopen/silent/start?debug=1"))
        .header(header::AUTHORIZATION, TOKEN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let seen = captures.lock().unwrap();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].path, "/api/v2/batchopen/silent/start");
    assert_eq!(seen[0].query, None);
    assert_eq!(&seen[0].body[..], body.as_bytes());
    assert_eq!(seen[0].headers[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn test_method_override_applied() {
    let (backend, captures) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .post(gateway.url("/api/v2/tasks/t1/archive"))
        .header(header::AUTHORIZATION, TOKEN)
        .body(r#"{"archived":true}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let seen = captures.lock().unwrap();
    assert_eq!(seen[0].method, "PATCH");
    assert_eq!(seen[0].path, "/api/v2/tasks/t1");
    assert_eq!(&seen[0].body[..], br#"{"archived":true}"#);
}

#[tokio::test]
async fn test_no_body_on_get_or_head() {
    let (backend, captures) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;
    let client = common::client();

    let res = client
        .get(gateway.url("/api/go/v1/items"))
        .body("should not travel")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client.head(gateway.url("/api/go/v1/items")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let seen = captures.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].method, "HEAD");
    for request in seen.iter() {
        assert!(request.body.is_empty());
        assert!(request
            .headers
            .get(header::CONTENT_LENGTH)
            .map(|v| v == "0")
            .unwrap_or(true));
    }
}

#[tokio::test]
async fn test_head_keeps_declared_content_length() {
    let backend = common::start_raw_backend(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 1234\r\n\r\n",
    )
    .await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .head(gateway.url("/api/go/items"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[header::CONTENT_LENGTH], "1234");
    assert!(gateway.sink.recent(1)[0].error.is_none());
}

#[tokio::test]
async fn test_outbound_headers_sanitized() {
    let (backend, captures) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .get(gateway.url("/api/go/v1/items"))
        .header(header::ACCEPT_ENCODING, "gzip, br")
        .header("x-custom", "kept")
        .header(header::COOKIE, "a=1")
        .header("x-request-id", "client-chosen")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_ne!(res.headers()["x-request-id"], "client-chosen");

    let seen = captures.lock().unwrap();
    let headers = &seen[0].headers;
    assert!(headers.get(header::ACCEPT_ENCODING).is_none());
    assert_eq!(headers["x-custom"], "kept");
    assert_eq!(headers[header::COOKIE], "a=1");
    // Host is the backend's, not the gateway's.
    assert_eq!(headers[header::HOST], backend.to_string());
}

#[tokio::test]
async fn test_required_auth_rejected_without_network_call() {
    let (backend, captures) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .get(gateway.url("/api/v2/tasks/abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "auth_required");

    assert!(captures.lock().unwrap().is_empty());
}

struct FixedSession(AuthContext);

#[async_trait]
impl SessionResolver for FixedSession {
    async fn resolve(&self, _headers: &axum::http::HeaderMap) -> AuthContext {
        self.0.clone()
    }
}

#[tokio::test]
async fn test_injected_session_resolver_supplies_bearer() {
    let (backend, captures) = common::start_json_backend().await;
    let resolver: Arc<dyn SessionResolver> =
        Arc::new(FixedSession(AuthContext::bearer("from-session")));
    let gateway = common::start_gateway_with(common::test_config(backend), Some(resolver)).await;

    let res = common::client()
        .get(gateway.url("/api/v2/tasks"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        captures.lock().unwrap()[0].headers[header::AUTHORIZATION],
        "Bearer from-session"
    );
}

#[tokio::test]
async fn test_auth_none_route_never_injects() {
    let (backend, captures) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .get(gateway.url("/health"))
        .header(header::COOKIE, "bff_session=secret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(captures.lock().unwrap()[0]
        .headers
        .get(header::AUTHORIZATION)
        .is_none());
}

#[tokio::test]
async fn test_route_misses() {
    let (backend, captures) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;
    let client = common::client();

    let res = client.get(gateway.url("/api/v2/unknown")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["error"]["code"], "route_not_found");

    let res = client
        .put(gateway.url("/api/v2/batchopen/silent/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()[header::ALLOW], "POST");

    assert!(captures.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_gateway_headers_on_every_response() {
    let (backend, _) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;
    let client = common::client();

    for path in ["/health", "/api/v2/unknown", "/__gateway/status"] {
        let res = client.get(gateway.url(path)).send().await.unwrap();
        assert_eq!(res.headers()["x-bff-gateway"], "1", "{}", path);
        assert_eq!(res.headers()["x-robots-tag"], "noindex, nofollow", "{}", path);
    }

    let a = client.get(gateway.url("/health")).send().await.unwrap();
    let b = client.get(gateway.url("/health")).send().await.unwrap();
    assert_ne!(a.headers()["x-request-id"], b.headers()["x-request-id"]);
}

#[tokio::test]
async fn test_redirect_relayed_not_followed() {
    let (backend, captures) = common::start_capturing_backend(|_| {
        (
            StatusCode::FOUND,
            [(header::LOCATION, "/somewhere-else")],
            "",
        )
            .into_response()
    })
    .await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .get(gateway.url("/api/go/moved"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "/somewhere-else");
    assert_eq!(captures.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upstream_error_status_relayed_unchanged() {
    let (backend, _) = common::start_capturing_backend(|_| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"detail":"bad urls"}"#,
        )
            .into_response()
    })
    .await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .post(gateway.url("/api/v2/batchopen/silent/start"))
        .header(header::AUTHORIZATION, TOKEN)
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.text().await.unwrap(), r#"{"detail":"bad urls"}"#);

    let record = &gateway.sink.recent(1)[0];
    assert_eq!(record.status, 422);
    assert_eq!(record.error.as_deref(), Some("upstream_non_2xx"));
    assert_eq!(record.route, "batchopen_silent_start");
}

#[tokio::test]
async fn test_malformed_json_relayed_raw() {
    let (backend, _) = common::start_capturing_backend(|_| {
        (
            [(header::CONTENT_TYPE, "application/json")],
            "<html>proxy error</html>",
        )
            .into_response()
    })
    .await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .get(gateway.url("/api/go/v1/items"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(res.text().await.unwrap(), "<html>proxy error</html>");

    let record = &gateway.sink.recent(1)[0];
    assert_eq!(record.error.as_deref(), Some("malformed_upstream_body"));
}

#[tokio::test]
async fn test_catch_all_passthrough() {
    let (backend, captures) = common::start_json_backend().await;
    let gateway = common::start_gateway(common::test_config(backend)).await;

    let res = common::client()
        .delete(gateway.url("/api/go/v1/things/42?force=true&b=2"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let seen = captures.lock().unwrap();
    assert_eq!(seen[0].method, "DELETE");
    assert_eq!(seen[0].path, "/v1/things/42");
    assert_eq!(seen[0].query.as_deref(), Some("force=true&b=2"));

    let record = &gateway.sink.recent(1)[0];
    assert_eq!(record.route, "catch_all");
    assert_eq!(record.target_path, "/v1/things/42");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let (backend, captures) = common::start_json_backend().await;
    let mut config = common::test_config(backend);
    config.limits.max_body_bytes = 16;
    let gateway = common::start_gateway(config).await;

    let res = common::client()
        .post(gateway.url("/api/go/upload"))
        .body(vec![b'x'; 1024])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(captures.lock().unwrap().is_empty());
}
