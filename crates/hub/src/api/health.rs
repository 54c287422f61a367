//! Health, trace window, and external profiling reports.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::state::AppState;

/// GET /health — combined status + profiling snapshot.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (ticks, last_entry) = match &state.analyzer {
        Some(a) => (a.tick_count(), a.last_entry()),
        None => (0, None),
    };

    Json(serde_json::json!({
        "ok": true,
        "agent": {
            "enabled": state.analyzer.is_some(),
            "ticks": ticks,
            "lastEntry": last_entry,
        },
        "escalation": {
            "mode": state.orchestrator.mode(),
            "stats": state.orchestrator.stats(),
        },
        "buffers": {
            "feed": { "size": state.feed.len(), "version": state.feed.version() },
            "sense": { "size": state.sense.len(), "version": state.sense.version() },
        },
        "overlay": {
            "clients": state.overlay.client_count(),
            "connection": state.overlay.connection_state(),
        },
        "traces": state.tracer.summary(),
        "profiling": state.profiler.snapshot(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct TracesQuery {
    #[serde(default)]
    pub after: u64,
    #[serde(default = "d_limit")]
    pub limit: usize,
}

fn d_limit() -> usize {
    50
}

/// GET /traces?after=M&limit=K — the rolling trace window.
pub async fn traces(
    State(state): State<AppState>,
    Query(query): Query<TracesQuery>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "traces": state.tracer.get_traces(query.after, query.limit),
        "summary": state.tracer.summary(),
    }))
}

/// POST /profiling/sense — the screen client's periodic self-report.
/// The merged profiler snapshot is pushed to connected overlays.
pub async fn post_sense_profiling(
    State(state): State<AppState>,
    Json(snapshot): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.profiler.record_sense_snapshot(snapshot);
    state.overlay.broadcast_profiling(state.profiler.snapshot());
    Json(serde_json::json!({ "ok": true }))
}

/// POST /profiling/overlay — the overlay's HTTP-side self-report (the
/// socket `profiling` message is the other route in).
pub async fn post_overlay_profiling(
    State(state): State<AppState>,
    Json(snapshot): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.profiler.record_overlay_snapshot(snapshot);
    Json(serde_json::json!({ "ok": true }))
}
