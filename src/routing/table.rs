//! The frontend's logical API and the route compiler.
//!
//! The built-in table is data, not code: each entry says which backend path
//! a frontend path maps to, whether the query string travels with it, and
//! which credential policy applies. Deployments can extend it with
//! `[[routes]]` entries in the config file.

use axum::http::Method;

use crate::config::{GatewayConfig, RouteConfig, ValidationError};
use crate::routing::matcher::{PathPattern, TargetTemplate};
use crate::routing::router::{MethodSet, RouteMapping, RouteTable};
use crate::security::auth::AuthPolicy;

/// A built-in route, `const`-friendly.
#[derive(Debug, Clone, Copy)]
pub struct RouteDef {
    pub name: &'static str,
    pub path: &'static str,
    /// Empty means any method.
    pub methods: &'static [&'static str],
    pub target: &'static str,
    pub append_search: bool,
    pub method_override: Option<&'static str>,
    pub auth: AuthPolicy,
    pub streaming: bool,
}

impl RouteDef {
    const fn new(
        name: &'static str,
        methods: &'static [&'static str],
        path: &'static str,
        target: &'static str,
    ) -> Self {
        Self {
            name,
            path,
            methods,
            target,
            append_search: false,
            method_override: None,
            auth: AuthPolicy::Required,
            streaming: false,
        }
    }

    const fn search(mut self) -> Self {
        self.append_search = true;
        self
    }

    const fn with_override(mut self, method: &'static str) -> Self {
        self.method_override = Some(method);
        self
    }

    const fn auth(mut self, policy: AuthPolicy) -> Self {
        self.auth = policy;
        self
    }

    const fn stream(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn to_config(&self) -> RouteConfig {
        RouteConfig {
            name: self.name.to_string(),
            path: self.path.to_string(),
            methods: self.methods.iter().map(|m| m.to_string()).collect(),
            target: self.target.to_string(),
            append_search: self.append_search,
            method_override: self.method_override.map(str::to_string),
            auth: self.auth,
            streaming: self.streaming,
        }
    }
}

const GET: &[&str] = &["GET"];
const POST: &[&str] = &["POST"];
const DELETE: &[&str] = &["DELETE"];
const GET_POST: &[&str] = &["GET", "POST"];
const GET_PUT: &[&str] = &["GET", "PUT"];
const GET_PUT_DELETE: &[&str] = &["GET", "PUT", "DELETE"];

/// Frontend paths served by the web tier and their backend targets.
pub const BUILTIN_ROUTES: &[RouteDef] = &[
    // Public
    RouteDef::new("health", GET, "/health", "/health").auth(AuthPolicy::None),
    RouteDef::new("public_config", GET, "/api/v2/public/config", "/api/v1/public/config")
        .search()
        .auth(AuthPolicy::None),
    // Tasks
    RouteDef::new("tasks_list", GET, "/api/v2/tasks", "/api/v2/tasks").search(),
    RouteDef::new("task_get", GET, "/api/v2/tasks/{id}", "/api/v2/tasks/{id}").search(),
    RouteDef::new("task_delete", DELETE, "/api/v2/tasks/{id}", "/api/v2/tasks/{id}"),
    RouteDef::new("task_cancel", POST, "/api/v2/tasks/{id}/cancel", "/api/v2/tasks/{id}:cancel"),
    RouteDef::new("task_archive", POST, "/api/v2/tasks/{id}/archive", "/api/v2/tasks/{id}")
        .with_override("PATCH"),
    RouteDef::new("task_live", GET, "/api/v2/tasks/{id}/live", "/api/v2/stream/tasks/{id}")
        .search()
        .stream(),
    // Batch open
    RouteDef::new(
        "batchopen_silent_start",
        POST,
        "/api/v2/batchopen/silent/start",
        "/api/v2/batchopen/silent/start",
    ),
    RouteDef::new(
        "batchopen_silent_progress",
        GET,
        "/api/v2/batchopen/silent/progress",
        "/api/v2/batchopen/silent/progress",
    )
    .search(),
    RouteDef::new(
        "batchopen_silent_terminate",
        POST,
        "/api/v2/batchopen/silent/terminate",
        "/api/v2/batchopen/silent/terminate",
    ),
    RouteDef::new(
        "batchopen_proxy_validate",
        POST,
        "/api/v2/batchopen/proxy/validate",
        "/api/v1/batchopen/proxy:validate",
    ),
    RouteDef::new(
        "autoclick_schedules",
        GET_POST,
        "/api/v2/batchopen/autoclick/schedules",
        "/api/v2/autoclick/schedules",
    )
    .search(),
    RouteDef::new(
        "autoclick_schedule",
        GET_PUT_DELETE,
        "/api/v2/batchopen/autoclick/schedules/{id}",
        "/api/v2/autoclick/schedules/{id}",
    ),
    RouteDef::new(
        "autoclick_schedule_toggle",
        POST,
        "/api/v2/batchopen/autoclick/schedules/{id}/toggle",
        "/api/v2/autoclick/schedules/{id}",
    )
    .with_override("PATCH"),
    // Site rank
    RouteDef::new("siterank_rank", GET, "/api/v2/siterank/rank", "/api/v1/siterank/rank").search(),
    RouteDef::new(
        "siterank_batch",
        POST,
        "/api/v2/siterank/batch",
        "/api/v1/siterank/batch:execute",
    ),
    RouteDef::new(
        "siterank_history",
        GET,
        "/api/v2/siterank/history",
        "/api/v1/siterank/history",
    )
    .search(),
    // Ads center
    RouteDef::new(
        "adscenter_accounts",
        GET,
        "/api/v2/adscenter/accounts",
        "/api/v1/adscenter/accounts",
    )
    .search(),
    RouteDef::new(
        "adscenter_campaigns",
        GET,
        "/api/v2/adscenter/accounts/{accountId}/campaigns",
        "/api/v1/adscenter/accounts/{accountId}/campaigns",
    )
    .search(),
    RouteDef::new(
        "adscenter_bulk_actions",
        POST,
        "/api/v2/adscenter/bulk-actions",
        "/api/v1/adscenter/bulk-actions",
    ),
    RouteDef::new(
        "adscenter_bulk_action",
        GET,
        "/api/v2/adscenter/bulk-actions/{id}",
        "/api/v1/adscenter/bulk-actions/{id}",
    ),
    RouteDef::new(
        "adscenter_preflight",
        POST,
        "/api/v2/adscenter/preflight",
        "/api/v1/adscenter/preflight",
    ),
    // Offers
    RouteDef::new("offers", GET_POST, "/api/v2/offers", "/api/v1/offers").search(),
    RouteDef::new("offer", GET_PUT, "/api/v2/offers/{id}", "/api/v1/offers/{id}"),
    RouteDef::new("offer_delete", POST, "/api/v2/offers/{id}/delete", "/api/v1/offers/{id}")
        .with_override("DELETE"),
    RouteDef::new(
        "offer_evaluate",
        POST,
        "/api/v2/offers/{id}/evaluate",
        "/api/v1/offers/{id}/evaluations",
    ),
    // Billing and account
    RouteDef::new(
        "billing_subscription",
        GET,
        "/api/v2/billing/subscription",
        "/api/v1/billing/subscriptions/me",
    ),
    RouteDef::new(
        "tokens_balance",
        GET,
        "/api/v2/billing/tokens/balance",
        "/api/v1/billing/tokens/balance",
    ),
    RouteDef::new(
        "tokens_transactions",
        GET,
        "/api/v2/billing/tokens/transactions",
        "/api/v1/billing/tokens/transactions",
    )
    .search(),
    RouteDef::new("user_profile", GET_PUT, "/api/v2/user/profile", "/api/v1/users/me"),
    RouteDef::new("user_checkin", POST, "/api/v2/user/checkin", "/api/v1/users/me/checkin"),
    // Notifications
    RouteDef::new("notifications", GET, "/api/v2/notifications", "/api/v1/notifications").search(),
    RouteDef::new(
        "notification_read",
        POST,
        "/api/v2/notifications/{id}/read",
        "/api/v1/notifications/{id}",
    )
    .with_override("PATCH"),
    RouteDef::new(
        "notifications_stream",
        GET,
        "/api/v2/notifications/stream",
        "/api/v1/notifications/stream",
    )
    .stream(),
];

impl RouteTable {
    /// Compile the built-in table (unless disabled) plus `config.routes`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, Vec<ValidationError>> {
        let mut sources: Vec<RouteConfig> = Vec::new();
        if config.include_builtin_routes {
            sources.extend(BUILTIN_ROUTES.iter().map(RouteDef::to_config));
        }
        sources.extend(config.routes.iter().cloned());
        compile(&sources)
    }
}

/// Compile and cross-check route configs. Returns every problem found.
pub fn compile(sources: &[RouteConfig]) -> Result<RouteTable, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut routes: Vec<RouteMapping> = Vec::with_capacity(sources.len());

    for source in sources {
        match compile_one(source) {
            Ok(mapping) => {
                if routes.iter().any(|r| r.name == mapping.name) {
                    errors.push(route_error(&mapping.name, "duplicate route name"));
                    continue;
                }
                if let Some(existing) = routes.iter().find(|r| {
                    r.pattern.shape() == mapping.pattern.shape() && r.methods.overlaps(&mapping.methods)
                }) {
                    let reason = format!(
                        "overlaps `{}` on path `{}` for the same methods",
                        existing.name, existing.pattern
                    );
                    errors.push(route_error(&mapping.name, reason));
                    continue;
                }
                routes.push(mapping);
            }
            Err(reason) => errors.push(route_error(&source.name, reason)),
        }
    }

    if errors.is_empty() {
        Ok(RouteTable::new(routes))
    } else {
        Err(errors)
    }
}

fn compile_one(source: &RouteConfig) -> Result<RouteMapping, String> {
    if source.name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }

    let pattern = PathPattern::parse(&source.path)?;
    let target = TargetTemplate::parse(&source.target)?;

    let captured: Vec<&str> = pattern.param_names().collect();
    if let Some(missing) = target.variables().find(|v| !captured.contains(v)) {
        return Err(format!(
            "target `{}` uses `{{{}}}` which `{}` does not capture",
            source.target, missing, source.path
        ));
    }

    let methods = if source.methods.is_empty() {
        MethodSet::Any
    } else {
        MethodSet::Only(
            source
                .methods
                .iter()
                .map(|m| parse_method(m))
                .collect::<Result<Vec<_>, _>>()?,
        )
    };

    let method_override = source
        .method_override
        .as_deref()
        .map(parse_method)
        .transpose()?;

    Ok(RouteMapping {
        name: source.name.clone(),
        pattern,
        methods,
        target,
        append_search: source.append_search,
        method_override,
        auth: source.auth,
        streaming: source.streaming,
    })
}

fn parse_method(raw: &str) -> Result<Method, String> {
    let upper = raw.trim().to_ascii_uppercase();
    match upper.as_str() {
        "GET" | "HEAD" | "POST" | "PUT" | "PATCH" | "DELETE" | "OPTIONS" => {
            Method::from_bytes(upper.as_bytes()).map_err(|e| e.to_string())
        }
        _ => Err(format!("unsupported method `{}`", raw)),
    }
}

fn route_error(route: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::Route {
        route: route.to_string(),
        reason: reason.into(),
    }
}
