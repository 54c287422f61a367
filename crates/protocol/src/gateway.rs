//! Assistant-gateway RPC framing.
//!
//! The gateway speaks a small request/response protocol over one persistent
//! WebSocket. On connect the gateway emits a `connect.challenge` event; the
//! client answers with a `connect` request carrying its auth token, and the
//! gateway acknowledges with an `ok` response. After that, requests and
//! responses are correlated by id. Non-response frames from the gateway are
//! events (assistant-pushed feed items, spawn-task lifecycle updates).

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 3;

/// Event name the gateway sends right after the socket opens.
pub const EVENT_CONNECT_CHALLENGE: &str = "connect.challenge";
/// Event carrying a spawn-task lifecycle update.
pub const EVENT_TASK_LIFECYCLE: &str = "task.lifecycle";
/// Event carrying an assistant-pushed feed item.
pub const EVENT_FEED_ITEM: &str = "feed.item";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayFrame {
    /// Gateway → client push.
    Event {
        event: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    /// Client → gateway request.
    Request {
        id: String,
        method: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    /// Gateway → client reply, correlated by `id`.
    Response {
        id: String,
        ok: bool,
        #[serde(default)]
        result: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<serde_json::Value>,
    },
}

impl GatewayFrame {
    /// The authentication request answering a `connect.challenge`.
    pub fn connect_request(id: String, token: &str, nonce: &str) -> GatewayFrame {
        GatewayFrame::Request {
            id,
            method: "connect".into(),
            params: serde_json::json!({
                "auth": { "token": token, "nonce": nonce },
                "minProtocol": PROTOCOL_VERSION,
                "maxProtocol": PROTOCOL_VERSION,
                "client": { "mode": "backend" },
            }),
        }
    }

    /// An `agent.wait` request: deliver a message and wait for the
    /// assistant's reply payloads.
    pub fn agent_wait_request(
        id: String,
        message: &str,
        idem_key: &str,
        session_key: &str,
        timeout_ms: u64,
    ) -> GatewayFrame {
        GatewayFrame::Request {
            id,
            method: "agent.wait".into(),
            params: serde_json::json!({
                "message": message,
                "idemKey": idem_key,
                "sessionKey": session_key,
                "timeoutMs": timeout_ms,
            }),
        }
    }
}

/// One reply payload inside an `agent.wait` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaitPayload {
    #[serde(default)]
    pub text: String,
}

/// Outcome of an `agent.wait` round-trip.
///
/// `Timeout` is a first-class outcome: the assistant may still be working,
/// so the caller must not retry or fall back on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The gateway answered; payloads may be empty (no reply).
    Reply(Vec<WaitPayload>),
    /// The gateway returned an RPC-level error object.
    Error(String),
    /// The wait deadline passed without a response.
    Timeout,
}

impl WaitOutcome {
    /// Interpret a successful response's `result` value.
    pub fn from_result(result: &serde_json::Value) -> WaitOutcome {
        let payloads = result
            .get("payloads")
            .and_then(|p| p.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value::<WaitPayload>(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        WaitOutcome::Reply(payloads)
    }

    /// Join payload texts on newlines, skipping blanks.
    pub fn joined_text(&self) -> Option<String> {
        match self {
            WaitOutcome::Reply(payloads) => {
                let joined = payloads
                    .iter()
                    .map(|p| p.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");
                if joined.is_empty() {
                    None
                } else {
                    Some(joined)
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_request_carries_protocol_bounds() {
        let frame = GatewayFrame::connect_request("r1".into(), "tok", "n0nce");
        let json = serde_json::to_value(&frame).expect("serialize");
        assert_eq!(json["type"], "request");
        assert_eq!(json["method"], "connect");
        assert_eq!(json["params"]["minProtocol"], 3);
        assert_eq!(json["params"]["maxProtocol"], 3);
        assert_eq!(json["params"]["client"]["mode"], "backend");
        assert_eq!(json["params"]["auth"]["token"], "tok");
    }

    #[test]
    fn challenge_event_parses() {
        let frame: GatewayFrame = serde_json::from_str(
            r#"{"type":"event","event":"connect.challenge","payload":{"nonce":"abc"}}"#,
        )
        .expect("parse");
        match frame {
            GatewayFrame::Event { event, payload } => {
                assert_eq!(event, EVENT_CONNECT_CHALLENGE);
                assert_eq!(payload["nonce"], "abc");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn wait_outcome_joins_non_empty_payloads() {
        let result = serde_json::json!({
            "payloads": [{"text": "first"}, {"text": "  "}, {"text": "second"}]
        });
        let outcome = WaitOutcome::from_result(&result);
        assert_eq!(outcome.joined_text().as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn wait_outcome_empty_payloads_is_no_reply() {
        let outcome = WaitOutcome::from_result(&serde_json::json!({"payloads": []}));
        assert_eq!(outcome, WaitOutcome::Reply(vec![]));
        assert!(outcome.joined_text().is_none());
    }
}
