//! Persistent RPC socket to the assistant gateway.
//!
//! Protocol:
//! 1. Connect; the gateway first emits a `connect.challenge` event.
//! 2. Client answers with a `connect` request carrying the auth token.
//! 3. Gateway replies `ok` — the socket is authenticated.
//! 4. `agent.wait` requests are correlated by id against a pending map.
//!
//! On close the client waits five seconds and reconnects, re-running the
//! handshake. Callers observe liveness through `is_connected()` and fall
//! back to the HTTP hook when it is false or a call dies mid-flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use sn_domain::error::{Error, Result};
use sn_domain::feed::FeedPriority;
use sn_domain::spawn::SpawnTask;
use sn_protocol::gateway::{
    GatewayFrame, WaitOutcome, EVENT_CONNECT_CHALLENGE, EVENT_FEED_ITEM, EVENT_TASK_LIFECYCLE,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Inbound pushes surfaced to the hub.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Assistant-pushed feed item.
    Feed { text: String, priority: FeedPriority },
    /// Spawn-task lifecycle update.
    Task(SpawnTask),
}

pub type EventHandler = Arc<dyn Fn(GatewayEvent) + Send + Sync>;

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<GatewayFrame>>>>;

pub struct GatewayClient {
    ws_url: String,
    token: Option<String>,
    connected: AtomicBool,
    outbound: Mutex<Option<mpsc::Sender<GatewayFrame>>>,
    pending: PendingMap,
    handler: EventHandler,
    run_cancel: Mutex<Option<CancellationToken>>,
}

impl GatewayClient {
    pub fn new(ws_url: impl Into<String>, token: Option<String>, handler: EventHandler) -> Arc<Self> {
        Arc::new(Self {
            ws_url: ws_url.into(),
            token,
            connected: AtomicBool::new(false),
            outbound: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            handler,
            run_cancel: Mutex::new(None),
        })
    }

    /// Whether the socket is up and authenticated.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Start the connection loop. Idempotent while running; a missing
    /// gateway URL downgrades to a warning (the hook may still be usable).
    pub fn start(self: &Arc<Self>) {
        if self.ws_url.is_empty() {
            tracing::warn!("no gateway ws url configured, RPC transport stays down");
            return;
        }
        let mut slot = self.run_cancel.lock();
        if slot.as_ref().is_some_and(|c| !c.is_cancelled()) {
            return;
        }
        let cancel = CancellationToken::new();
        *slot = Some(cancel.clone());
        drop(slot);

        let client = self.clone();
        tokio::spawn(async move {
            client.run(cancel).await;
        });
    }

    /// Tear the socket down and stop reconnecting.
    pub fn stop(&self) {
        if let Some(cancel) = self.run_cancel.lock().take() {
            cancel.cancel();
        }
        self.connected.store(false, Ordering::SeqCst);
        self.fail_pending();
        tracing::info!("gateway client stopped");
    }

    /// Issue `agent.wait` and wait for the assistant's reply.
    ///
    /// Returns `Ok(WaitOutcome::Timeout)` when the deadline passes — the
    /// assistant may still be working, so the caller must not retry. A
    /// transport failure (not connected, socket died mid-call) is an `Err`
    /// and is the caller's cue to fall back to the HTTP hook.
    pub async fn agent_wait(
        &self,
        message: &str,
        idem_key: &str,
        session_key: &str,
        timeout_ms: u64,
    ) -> Result<WaitOutcome> {
        let sender = self
            .outbound
            .lock()
            .clone()
            .ok_or_else(|| Error::Gateway("not connected".into()))?;

        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);

        let frame = GatewayFrame::agent_wait_request(id.clone(), message, idem_key, session_key, timeout_ms);
        if sender.send(frame).await.is_err() {
            self.pending.lock().remove(&id);
            return Err(Error::Gateway("socket closed before send".into()));
        }

        let reply = tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await;
        match reply {
            Err(_) => {
                self.pending.lock().remove(&id);
                Ok(WaitOutcome::Timeout)
            }
            // Sender dropped: the connection died with the call in flight.
            Ok(Err(_)) => Err(Error::Gateway("socket closed mid-call".into())),
            Ok(Ok(GatewayFrame::Response {
                ok, result, error, ..
            })) => {
                if ok {
                    Ok(WaitOutcome::from_result(&result))
                } else {
                    let detail = error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unknown gateway error".into());
                    Ok(WaitOutcome::Error(detail))
                }
            }
            Ok(Ok(other)) => Err(Error::Gateway(format!(
                "unexpected frame in response slot: {other:?}"
            ))),
        }
    }

    // ── Connection loop ────────────────────────────────────────────

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let session = tokio::select! {
                r = self.connect_and_serve() => r,
                _ = cancel.cancelled() => {
                    self.teardown_connection();
                    return;
                }
            };

            self.teardown_connection();
            match session {
                Ok(()) => tracing::info!("gateway connection closed"),
                Err(e) => tracing::warn!(error = %e, "gateway connection lost"),
            }

            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                _ = cancel.cancelled() => return,
            }
        }
    }

    fn teardown_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.outbound.lock() = None;
        self.fail_pending();
    }

    /// Drop all pending senders so in-flight calls observe the close.
    fn fail_pending(&self) {
        let failed = {
            let mut pending = self.pending.lock();
            let n = pending.len();
            pending.clear();
            n
        };
        if failed > 0 {
            tracing::warn!(failed, "failed in-flight gateway calls on disconnect");
        }
    }

    /// Single connection lifecycle: connect → challenge → auth → loop.
    async fn connect_and_serve(&self) -> Result<()> {
        tracing::info!(url = %self.ws_url, "connecting to assistant gateway");
        let (ws, _resp) = tokio_tungstenite::connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| Error::Gateway(format!("connect: {e}")))?;
        let (mut sink, mut stream) = ws.split();

        // 1. Wait for connect.challenge.
        let nonce = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(Ok(msg)) = stream.next().await {
                if let Message::Text(text) = msg {
                    if let Ok(GatewayFrame::Event { event, payload }) = serde_json::from_str(&text)
                    {
                        if event == EVENT_CONNECT_CHALLENGE {
                            return payload
                                .get("nonce")
                                .and_then(|n| n.as_str())
                                .map(String::from);
                        }
                    }
                }
            }
            None
        })
        .await
        .map_err(|_| Error::Timeout("connect.challenge".into()))?
        .ok_or_else(|| Error::Gateway("closed before challenge".into()))?;

        // 2. Answer with the connect request.
        let token = self.token.clone().unwrap_or_default();
        let auth_id = uuid::Uuid::new_v4().to_string();
        let frame = GatewayFrame::connect_request(auth_id.clone(), &token, &nonce);
        let json = serde_json::to_string(&frame)?;
        sink.send(Message::Text(json))
            .await
            .map_err(|e| Error::Gateway(format!("send connect: {e}")))?;

        // 3. Wait for the ok.
        let authed = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(Ok(msg)) = stream.next().await {
                if let Message::Text(text) = msg {
                    if let Ok(GatewayFrame::Response { id, ok, .. }) = serde_json::from_str(&text) {
                        if id == auth_id {
                            return ok;
                        }
                    }
                }
            }
            false
        })
        .await
        .map_err(|_| Error::Timeout("connect response".into()))?;

        if !authed {
            return Err(Error::Gateway("authentication rejected".into()));
        }
        tracing::info!("gateway authenticated");

        // 4. Wire up outbound channel + writer task, then read until close.
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<GatewayFrame>(64);
        *self.outbound.lock() = Some(outbound_tx);
        self.connected.store(true, Ordering::SeqCst);

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize outbound frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        });

        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => self.handle_inbound(&text),
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => break,
                _ => {}
            }
        }

        writer.abort();
        Ok(())
    }

    fn handle_inbound(&self, text: &str) {
        let frame: GatewayFrame = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unparseable gateway frame");
                return;
            }
        };

        match frame {
            GatewayFrame::Response { ref id, .. } => {
                let id = id.clone();
                let waiter = self.pending.lock().remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(frame);
                    }
                    None => tracing::debug!(id = %id, "response with no pending call"),
                }
            }
            GatewayFrame::Event { event, payload } => self.handle_event(&event, payload),
            GatewayFrame::Request { method, .. } => {
                tracing::debug!(method = %method, "ignoring gateway-originated request");
            }
        }
    }

    fn handle_event(&self, event: &str, payload: serde_json::Value) {
        match event {
            EVENT_TASK_LIFECYCLE => match serde_json::from_value::<SpawnTask>(payload) {
                Ok(task) => (self.handler)(GatewayEvent::Task(task)),
                Err(e) => tracing::warn!(error = %e, "bad task.lifecycle payload"),
            },
            EVENT_FEED_ITEM => {
                let text = payload
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string();
                if text.is_empty() {
                    return;
                }
                let priority = payload
                    .get("priority")
                    .cloned()
                    .and_then(|p| serde_json::from_value(p).ok())
                    .unwrap_or(FeedPriority::Normal);
                (self.handler)(GatewayEvent::Feed { text, priority });
            }
            EVENT_CONNECT_CHALLENGE => {
                tracing::debug!("ignoring repeated connect.challenge");
            }
            other => {
                tracing::debug!(event = %other, "ignoring unknown gateway event");
            }
        }
    }
}
