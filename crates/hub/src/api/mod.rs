//! HTTP ingress surface: sense/feed ingestion, runtime agent config,
//! health, traces, and external profiling reports.

pub mod agent;
pub mod feed;
pub mod health;
pub mod sense;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Sense bodies (and everything else) are capped at 2 MiB.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the full router: ingress endpoints plus the overlay socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sense", post(sense::post_sense).get(sense::get_sense))
        .route("/feed", post(feed::post_feed).get(feed::get_feed))
        .route("/profiling/sense", post(health::post_sense_profiling))
        .route("/profiling/overlay", post(health::post_overlay_profiling))
        .route("/agent/config", post(agent::post_config))
        .route("/health", get(health::health))
        .route("/traces", get(health::traces))
        .route("/ws", get(crate::overlay::server::overlay_ws))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Standardized failure body: `{ "ok": false, "error": "<message>" }`.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "ok": false, "error": message.into() })),
    )
        .into_response()
}
