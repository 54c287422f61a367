//! Feed ingress: transcription results and test/system injections.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use sn_domain::feed::NewFeedItem;

use crate::api::api_error;
use crate::state::AppState;

/// POST /feed — inject a feed item. Published through the bus so overlays
/// see it live and the tick engine counts it as a new event.
pub async fn post_feed(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if body
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .is_none()
    {
        return api_error(StatusCode::BAD_REQUEST, "missing required field: text");
    }

    let new: NewFeedItem = match serde_json::from_value(body) {
        Ok(item) => item,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, format!("invalid feed item: {e}")),
    };

    let item = state.bus.publish(new);
    Json(serde_json::json!({ "ok": true, "id": item.id })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub after: u64,
}

/// GET /feed?after=N — the overlay-visible slice (periodic HUD items are
/// skipped).
pub async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> impl IntoResponse {
    let items = state.feed.query_for_overlay(query.after);
    Json(serde_json::json!({
        "ok": true,
        "items": items,
        "version": state.feed.version(),
    }))
}
