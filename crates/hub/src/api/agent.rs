//! Runtime agent configuration: the escalation-mode hot swap.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use sn_domain::config::EscalationMode;

use crate::api::api_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AgentConfigRequest {
    pub mode: String,
}

/// POST /agent/config — switch the escalation mode. Crossing the
/// off/non-off edge brings the assistant RPC socket up or down.
pub async fn post_config(
    State(state): State<AppState>,
    Json(req): Json<AgentConfigRequest>,
) -> Response {
    let mode: EscalationMode =
        match serde_json::from_value(serde_json::Value::String(req.mode.clone())) {
            Ok(m) => m,
            Err(_) => {
                return api_error(
                    StatusCode::BAD_REQUEST,
                    format!("unknown escalation mode: {}", req.mode),
                )
            }
        };

    state.orchestrator.set_mode(mode);
    Json(serde_json::json!({ "ok": true, "mode": mode })).into_response()
}
