//! Session-derived bearer credentials.
//!
//! The session store belongs to the web tier. The gateway only asks a
//! [`SessionResolver`] once per request for an [`AuthContext`] and then maps
//! it onto the outbound `Authorization` header according to the route's
//! [`AuthPolicy`]. Nothing is cached between requests.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::GatewayError;

/// Credential policy for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthPolicy {
    /// No credential means 401 before any network call.
    Required,
    /// Inject when present, proceed without otherwise.
    #[default]
    Optional,
    /// Never inject.
    None,
}

/// Result of a session lookup for one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub present: bool,
    pub bearer_token: Option<String>,
    pub principal_id: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            present: true,
            bearer_token: Some(token.into()),
            principal_id: None,
        }
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal_id = Some(principal.into());
        self
    }
}

/// External session collaborator.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> AuthContext;
}

/// Resolves sessions from what the web tier attaches to the request: an
/// `Authorization: Bearer` header, else the session cookie. The principal
/// comes from a header set by the web tier after it authenticated the user.
#[derive(Debug, Clone)]
pub struct RequestSessionResolver {
    session_cookie: String,
    principal_header: String,
}

impl RequestSessionResolver {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            session_cookie: config.session_cookie.clone(),
            principal_header: config.principal_header.to_ascii_lowercase(),
        }
    }

    fn bearer_from_header(headers: &HeaderMap) -> Option<String> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
    }

    fn token_from_cookie(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == self.session_cookie && !value.is_empty())
            .map(|(_, value)| value.to_string())
    }
}

#[async_trait]
impl SessionResolver for RequestSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> AuthContext {
        let token = Self::bearer_from_header(headers).or_else(|| self.token_from_cookie(headers));
        let principal = headers
            .get(self.principal_header.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        AuthContext {
            present: token.is_some(),
            bearer_token: token,
            principal_id: principal,
        }
    }
}

/// Apply `policy` to the sanitized outbound headers.
///
/// `Required` without a credential fails with [`GatewayError::AuthRequired`];
/// the caller must not touch the network in that case.
pub fn inject(
    policy: AuthPolicy,
    ctx: &AuthContext,
    headers: &mut HeaderMap,
) -> Result<(), GatewayError> {
    let token = ctx
        .bearer_token
        .as_deref()
        .filter(|_| ctx.present)
        .and_then(|t| HeaderValue::from_str(&format!("Bearer {}", t)).ok());

    match (policy, token) {
        (AuthPolicy::None, _) => Ok(()),
        (AuthPolicy::Required, None) => Err(GatewayError::AuthRequired),
        (AuthPolicy::Optional, None) => Ok(()),
        (_, Some(value)) => {
            headers.insert(header::AUTHORIZATION, value);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> RequestSessionResolver {
        RequestSessionResolver::new(&AuthConfig::default())
    }

    #[tokio::test]
    async fn test_bearer_header_wins_over_cookie() {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        h.insert(header::COOKIE, HeaderValue::from_static("bff_session=from-cookie"));
        h.insert("x-user-id", HeaderValue::from_static("user-7"));

        let ctx = resolver().resolve(&h).await;
        assert!(ctx.present);
        assert_eq!(ctx.bearer_token.as_deref(), Some("from-header"));
        assert_eq!(ctx.principal_id.as_deref(), Some("user-7"));
    }

    #[tokio::test]
    async fn test_cookie_fallback() {
        let mut h = HeaderMap::new();
        h.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; bff_session=tok123; other=1"),
        );

        let ctx = resolver().resolve(&h).await;
        assert_eq!(ctx.bearer_token.as_deref(), Some("tok123"));
    }

    #[tokio::test]
    async fn test_no_session() {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));

        let ctx = resolver().resolve(&h).await;
        assert_eq!(ctx, AuthContext::anonymous());
    }

    #[test]
    fn test_required_without_credential_fails() {
        let mut h = HeaderMap::new();
        let err = inject(AuthPolicy::Required, &AuthContext::anonymous(), &mut h).unwrap_err();
        assert!(matches!(err, GatewayError::AuthRequired));
        assert!(h.is_empty());
    }

    #[test]
    fn test_optional_injects_when_present() {
        let mut h = HeaderMap::new();
        inject(AuthPolicy::Optional, &AuthContext::anonymous(), &mut h).unwrap();
        assert!(!h.contains_key(header::AUTHORIZATION));

        inject(AuthPolicy::Optional, &AuthContext::bearer("t1"), &mut h).unwrap();
        assert_eq!(h[header::AUTHORIZATION], "Bearer t1");
    }

    #[test]
    fn test_none_never_injects() {
        let mut h = HeaderMap::new();
        inject(AuthPolicy::None, &AuthContext::bearer("t1"), &mut h).unwrap();
        assert!(h.is_empty());
    }

    #[test]
    fn test_injection_overrides_inbound_authorization() {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        inject(AuthPolicy::Required, &AuthContext::bearer("fresh"), &mut h).unwrap();
        assert_eq!(h[header::AUTHORIZATION], "Bearer fresh");
    }
}
