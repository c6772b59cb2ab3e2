//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled route mappings
//! - Resolve (method, path) to exactly one mapping, or an explicit miss
//! - Render the backend target path for the matched mapping
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over mappings (acceptable for typical route counts)
//! - The most specific path wins first; the method is checked afterwards,
//!   so an uncovered method yields 405 instead of falling through

use axum::http::Method;
use serde::Serialize;

use crate::error::GatewayError;
use crate::routing::matcher::{Params, PathPattern, TargetTemplate};
use crate::security::auth::AuthPolicy;

/// Methods a mapping accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    Any,
    Only(Vec<Method>),
}

impl MethodSet {
    /// `HEAD` is accepted wherever `GET` is.
    pub fn contains(&self, method: &Method) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Only(methods) => {
                methods.contains(method) || (*method == Method::HEAD && methods.contains(&Method::GET))
            }
        }
    }

    pub fn overlaps(&self, other: &MethodSet) -> bool {
        match (self, other) {
            (MethodSet::Any, _) | (_, MethodSet::Any) => true,
            (MethodSet::Only(a), MethodSet::Only(b)) => a.iter().any(|m| b.contains(m)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        match self {
            MethodSet::Any => vec!["ANY".to_string()],
            MethodSet::Only(methods) => methods.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// A compiled route mapping.
#[derive(Debug, Clone)]
pub struct RouteMapping {
    pub name: String,
    pub pattern: PathPattern,
    pub methods: MethodSet,
    pub target: TargetTemplate,
    pub append_search: bool,
    pub method_override: Option<Method>,
    pub auth: AuthPolicy,
    pub streaming: bool,
}

impl RouteMapping {
    /// Outbound method for an inbound one.
    pub fn effective_method(&self, inbound: &Method) -> Method {
        self.method_override.clone().unwrap_or_else(|| inbound.clone())
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            name: self.name.clone(),
            path: self.pattern.as_str().to_string(),
            methods: self.methods.names(),
            target: self.target.as_str().to_string(),
            append_search: self.append_search,
            method_override: self.method_override.as_ref().map(Method::to_string),
            auth: self.auth,
            streaming: self.streaming,
        }
    }
}

/// Serializable view of a mapping for the diagnostics endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub name: String,
    pub path: String,
    pub methods: Vec<String>,
    pub target: String,
    pub append_search: bool,
    pub method_override: Option<String>,
    pub auth: AuthPolicy,
    pub streaming: bool,
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct ResolvedRoute<'a> {
    pub mapping: &'a RouteMapping,
    pub params: Params,
    /// Backend path with parameters substituted, no query.
    pub target_path: String,
}

/// Immutable route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteMapping>,
}

impl RouteTable {
    /// Build from already validated mappings; see [`crate::routing::table`].
    pub(crate) fn new(routes: Vec<RouteMapping>) -> Self {
        Self { routes }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteMapping> {
        self.routes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&RouteMapping> {
        self.routes.iter().find(|r| r.name == name)
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Result<ResolvedRoute<'_>, GatewayError> {
        let matching: Vec<(&RouteMapping, Params)> = self
            .routes
            .iter()
            .filter_map(|r| r.pattern.captures(path).map(|p| (r, p)))
            .collect();

        let best = matching
            .iter()
            .map(|(r, _)| r.pattern.specificity())
            .max()
            .ok_or_else(|| GatewayError::RouteNotFound {
                path: path.to_string(),
            })?;

        // Candidates: the first most-specific shape, in table order
        let shape = matching
            .iter()
            .find(|(r, _)| r.pattern.specificity() == best)
            .map(|(r, _)| r.pattern.shape())
            .unwrap_or_default();
        let candidates = matching
            .into_iter()
            .filter(|(r, _)| r.pattern.specificity() == best && r.pattern.shape() == shape);

        let mut allowed = Vec::new();
        for (route, params) in candidates {
            if route.methods.contains(method) {
                let target_path = route.target.render(&params);
                return Ok(ResolvedRoute {
                    mapping: route,
                    params,
                    target_path,
                });
            }
            if let MethodSet::Only(methods) = &route.methods {
                for m in methods {
                    if !allowed.contains(m) {
                        allowed.push(m.clone());
                    }
                }
            }
        }

        Err(GatewayError::MethodNotAllowed {
            method: method.clone(),
            allowed,
        })
    }
}
