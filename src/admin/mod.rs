//! Read-only diagnostics endpoints.
//!
//! Mounted under `diagnostics.prefix`. Unauthenticated by convention; the
//! mount is expected to be reachable only from inside the deployment.

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::http::server::AppState;

pub fn diagnostics_router() -> Router<AppState> {
    Router::new()
        .route("/recent", get(get_recent))
        .route("/routes", get(get_routes))
        .route("/status", get(get_status))
}
