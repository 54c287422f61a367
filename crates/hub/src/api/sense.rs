//! Sense ingress: screen-capture events posted by the external OCR client.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use sn_domain::sense::NewSenseEvent;

use crate::api::api_error;
use crate::state::AppState;

/// POST /sense — requires `type` and `ts`; assigns an id and wakes the
/// tick engine. Body is size-capped by the router layer (413 beyond it).
pub async fn post_sense(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if body.get("type").and_then(|v| v.as_str()).is_none() {
        return api_error(StatusCode::BAD_REQUEST, "missing required field: type");
    }
    if body.get("ts").and_then(|v| v.as_i64()).is_none() {
        return api_error(StatusCode::BAD_REQUEST, "missing required field: ts");
    }

    let new: NewSenseEvent = match serde_json::from_value(body) {
        Ok(ev) => ev,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, format!("invalid sense event: {e}")),
    };

    let event = state.sense.push(new);
    state.analyzer_wake.notify_one();
    Json(serde_json::json!({ "ok": true, "id": event.id })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SenseQuery {
    #[serde(default)]
    pub after: u64,
    #[serde(default)]
    pub meta_only: bool,
}

/// GET /sense?after=N&meta_only=bool
pub async fn get_sense(
    State(state): State<AppState>,
    Query(query): Query<SenseQuery>,
) -> impl IntoResponse {
    let events = state.sense.query(query.after, query.meta_only);
    Json(serde_json::json!({
        "ok": true,
        "events": events,
        "version": state.sense.version(),
    }))
}
