//! Overlay WebSocket endpoint.
//!
//! Flow per connection:
//! 1. Upgrade, register with the fan-out server (which queues the status
//!    snapshot and replays).
//! 2. Writer task drains the client queue into the socket.
//! 3. Reader loop handles inbound messages; any traffic counts as liveness.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;

use sn_protocol::overlay::{OverlayCommand, OverlayIn};

use crate::overlay::Outbound;
use crate::state::AppState;

/// GET /ws — upgrade to the overlay push socket.
pub async fn overlay_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (client_id, mut rx, alive) = state.overlay.register();

    // Writer: client queue → socket.
    let writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            let result = match out {
                Outbound::Msg(msg) => match serde_json::to_string(&msg) {
                    Ok(json) => sink.send(Message::Text(json)).await,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize overlay message");
                        continue;
                    }
                },
                Outbound::ProtoPing => sink.send(Message::Ping(Vec::new())).await,
                Outbound::Close { code, reason } => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            };
            if result.is_err() {
                break;
            }
        }
    });

    // Reader: inbound traffic marks the client alive.
    while let Some(Ok(msg)) = stream.next().await {
        alive.store(true, Ordering::SeqCst);
        match msg {
            Message::Text(text) => match serde_json::from_str::<OverlayIn>(&text) {
                Ok(inbound) => handle_inbound(&state, client_id, inbound),
                Err(_) => {
                    tracing::debug!(client_id, "ignoring unknown overlay message");
                }
            },
            Message::Pong(_) | Message::Ping(_) => {}
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.overlay.remove(client_id);
    writer.abort();
    tracing::debug!(client_id, "overlay socket closed");
}

fn handle_inbound(state: &AppState, client_id: u64, inbound: OverlayIn) {
    match inbound {
        OverlayIn::Message { text } => {
            tracing::info!(client_id, chars = text.len(), "user message from overlay");
            let orchestrator = state.orchestrator.clone();
            tokio::spawn(orchestrator.direct_send(text));
        }
        OverlayIn::Command { action } => handle_command(state, client_id, action),
        OverlayIn::Pong { .. } => {
            // Liveness was already recorded by the reader loop.
        }
        OverlayIn::Profiling { rss_mb, uptime_s, ts } => {
            state.profiler.record_overlay_snapshot(serde_json::json!({
                "rssMb": rss_mb,
                "uptimeS": uptime_s,
                "ts": ts,
            }));
        }
    }
}

fn handle_command(state: &AppState, client_id: u64, action: OverlayCommand) {
    match action {
        OverlayCommand::ToggleAudio => {
            let active = state.capture.toggle_audio();
            tracing::info!(client_id, active, "audio capture toggled");
            state.overlay.broadcast_status();
        }
        OverlayCommand::ToggleScreen => {
            let active = state.capture.toggle_screen();
            tracing::info!(client_id, active, "screen capture toggled");
            state.overlay.broadcast_status();
        }
        OverlayCommand::SwitchDevice => {
            let alternate = state.capture.switch_device();
            tracing::info!(client_id, alternate, "audio device switched");
            state.overlay.broadcast_status();
        }
        OverlayCommand::Other(name) => {
            tracing::info!(client_id, action = %name, "ignoring unknown overlay command");
        }
    }
}
