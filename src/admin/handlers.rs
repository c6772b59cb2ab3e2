use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::observability::ObservationRecord;
use crate::routing::RouteSummary;

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub uptime_secs: u64,
    pub backend: String,
    pub routes: usize,
    pub active_streams: usize,
    pub stream_limit: Option<usize>,
    pub recorded_calls: usize,
}

/// Newest first. `limit` defaults to and is clamped at the ring capacity.
pub async fn get_recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<ObservationRecord>> {
    let capacity = state.sink.capacity();
    let limit = query.limit.unwrap_or(capacity).min(capacity);
    Json(state.sink.recent(limit))
}

pub async fn get_routes(State(state): State<AppState>) -> Json<Vec<RouteSummary>> {
    Json(state.routes.iter().map(|r| r.summary()).collect())
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let limiter = state.relay.limiter();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        backend: state.forwarder.base_url().to_string(),
        routes: state.routes.len(),
        active_streams: limiter.active(),
        stream_limit: limiter.limit(),
        recorded_calls: state.sink.len(),
    })
}
