//! Overlay fan-out: client registry, replay buffers, heartbeat, broadcast.
//!
//! Lock order is always clients → replay → spawn_tasks. Sends are
//! non-blocking (`try_send` into each client's queue); a client that cannot
//! keep up loses messages and is closed by the heartbeat soon after.

pub mod replay;
pub mod server;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sn_domain::feed::FeedItem;
use sn_domain::now_ms;
use sn_domain::spawn::SpawnTask;
use sn_protocol::overlay::{ConnectionState, OverlayOut};

use crate::capture::CaptureState;
use replay::{ReplayBuffer, SpawnTaskBuffer};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
/// Close code for a client that missed two consecutive heartbeats.
pub const CLOSE_UNRESPONSIVE: u16 = 4000;
/// Close code sent to all clients on graceful shutdown.
pub const CLOSE_GOING_AWAY: u16 = 1001;

const CLIENT_QUEUE: usize = 256;

/// What the writer task pulls from a client's queue.
#[derive(Debug)]
pub enum Outbound {
    Msg(OverlayOut),
    /// Protocol-level WebSocket ping (some clients only answer these).
    ProtoPing,
    Close { code: u16, reason: &'static str },
}

struct ClientHandle {
    tx: mpsc::Sender<Outbound>,
    alive: Arc<AtomicBool>,
}

pub struct OverlayServer {
    clients: RwLock<HashMap<u64, ClientHandle>>,
    next_client_id: AtomicU64,
    replay: Mutex<ReplayBuffer>,
    spawn_tasks: Mutex<SpawnTaskBuffer>,
    capture: Arc<CaptureState>,
}

impl OverlayServer {
    pub fn new(capture: Arc<CaptureState>) -> Arc<Self> {
        Arc::new(Self {
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(0),
            replay: Mutex::new(ReplayBuffer::default()),
            spawn_tasks: Mutex::new(SpawnTaskBuffer::default()),
            capture,
        })
    }

    pub fn connection_state(&self) -> ConnectionState {
        if self.clients.read().is_empty() {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    fn status_for(&self, connection: ConnectionState) -> OverlayOut {
        OverlayOut::Status {
            audio: self.capture.audio_state(),
            screen: self.capture.screen_state(),
            connection,
        }
    }

    /// Accept a new client: register it, then queue the connect sequence —
    /// one status snapshot, the feed replay in id order, and the surviving
    /// spawn tasks in insertion order. Holding the registry lock for the
    /// whole sequence keeps concurrent broadcasts ordered after the replay.
    pub fn register(&self) -> (u64, mpsc::Receiver<Outbound>, Arc<AtomicBool>) {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        let alive = Arc::new(AtomicBool::new(true));

        let mut clients = self.clients.write();
        let was_disconnected = clients.is_empty();
        clients.insert(
            id,
            ClientHandle {
                tx: tx.clone(),
                alive: alive.clone(),
            },
        );
        if was_disconnected {
            tracing::info!(client_id = id, "overlay connection established");
        }

        let _ = tx.try_send(Outbound::Msg(self.status_for(ConnectionState::Connected)));

        for msg in self.replay.lock().snapshot() {
            let _ = tx.try_send(Outbound::Msg(msg));
        }

        let now = now_ms();
        let mut tasks = self.spawn_tasks.lock();
        tasks.prune(now);
        for task in tasks.snapshot() {
            let _ = tx.try_send(Outbound::Msg(OverlayOut::SpawnTask(task)));
        }
        drop(tasks);
        drop(clients);

        tracing::debug!(client_id = id, "overlay client registered");
        (id, rx, alive)
    }

    pub fn remove(&self, id: u64) {
        let mut clients = self.clients.write();
        if clients.remove(&id).is_some() {
            tracing::debug!(client_id = id, remaining = clients.len(), "overlay client removed");
            if clients.is_empty() {
                tracing::info!("last overlay client disconnected");
            }
        }
    }

    // ── Broadcast ──────────────────────────────────────────────────

    /// Broadcast a feed item, recording it in the replay buffer first.
    pub fn broadcast_feed(&self, item: &FeedItem) {
        let msg = OverlayOut::feed(item);
        let clients = self.clients.read();
        self.replay.lock().push(msg.clone());
        for client in clients.values() {
            let _ = client.tx.try_send(Outbound::Msg(msg.clone()));
        }
    }

    /// Upsert a spawn task, prune expired terminal tasks, broadcast the
    /// merged record.
    pub fn broadcast_spawn_task(&self, update: SpawnTask) {
        let now = now_ms();
        let clients = self.clients.read();
        let merged = {
            let mut tasks = self.spawn_tasks.lock();
            let merged = tasks.upsert(update, now);
            tasks.prune(now);
            merged
        };
        let msg = OverlayOut::SpawnTask(merged);
        for client in clients.values() {
            let _ = client.tx.try_send(Outbound::Msg(msg.clone()));
        }
    }

    pub fn broadcast_status(&self) {
        let clients = self.clients.read();
        let connection = if clients.is_empty() {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        };
        let msg = self.status_for(connection);
        for client in clients.values() {
            let _ = client.tx.try_send(Outbound::Msg(msg.clone()));
        }
    }

    pub fn broadcast_profiling(&self, snapshot: serde_json::Value) {
        let clients = self.clients.read();
        let msg = OverlayOut::Profiling { snapshot };
        for client in clients.values() {
            let _ = client.tx.try_send(Outbound::Msg(msg.clone()));
        }
    }

    // ── Heartbeat ──────────────────────────────────────────────────

    /// Every interval: a client still marked dead from the previous round is
    /// closed with code 4000; everyone else is marked dead and pinged at
    /// both the protocol and application level. Any inbound traffic marks a
    /// client alive again.
    pub fn spawn_heartbeat(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => server.heartbeat_round(),
                    _ = cancel.cancelled() => return,
                }
            }
        })
    }

    fn heartbeat_round(&self) {
        let snapshot: Vec<(u64, mpsc::Sender<Outbound>, Arc<AtomicBool>)> = self
            .clients
            .read()
            .iter()
            .map(|(id, c)| (*id, c.tx.clone(), c.alive.clone()))
            .collect();

        let ts = now_ms();
        for (id, tx, alive) in snapshot {
            if !alive.load(Ordering::SeqCst) {
                tracing::warn!(client_id = id, "overlay client unresponsive, closing");
                let _ = tx.try_send(Outbound::Close {
                    code: CLOSE_UNRESPONSIVE,
                    reason: "heartbeat timeout",
                });
                self.remove(id);
                continue;
            }
            alive.store(false, Ordering::SeqCst);
            let _ = tx.try_send(Outbound::ProtoPing);
            let _ = tx.try_send(Outbound::Msg(OverlayOut::Ping { ts }));
        }
    }

    /// Graceful shutdown: close every client with 1001.
    pub fn close_all(&self) {
        let mut clients = self.clients.write();
        for (id, client) in clients.drain() {
            tracing::debug!(client_id = id, "closing overlay client for shutdown");
            let _ = client.tx.try_send(Outbound::Close {
                code: CLOSE_GOING_AWAY,
                reason: "server shutting down",
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_domain::feed::{FeedChannel, FeedPriority, FeedSource};
    use sn_domain::spawn::{SpawnStatus, SpawnTask};

    fn server() -> Arc<OverlayServer> {
        OverlayServer::new(Arc::new(CaptureState::new()))
    }

    fn feed_item(id: u64, text: &str) -> FeedItem {
        FeedItem {
            id,
            ts: id as i64,
            source: FeedSource::System,
            channel: FeedChannel::Stream,
            priority: FeedPriority::Normal,
            text: text.into(),
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn late_joiner_gets_status_then_last_twenty() {
        let server = server();
        for i in 1..=25 {
            server.broadcast_feed(&feed_item(i, &format!("item {i}")));
        }

        let (_id, mut rx, _alive) = server.register();
        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 21);
        assert!(matches!(&msgs[0], Outbound::Msg(OverlayOut::Status { .. })));
        let texts: Vec<String> = msgs[1..]
            .iter()
            .map(|m| match m {
                Outbound::Msg(OverlayOut::Feed { text, .. }) => text.clone(),
                other => panic!("unexpected message: {other:?}"),
            })
            .collect();
        assert_eq!(texts.first().map(String::as_str), Some("item 6"));
        assert_eq!(texts.last().map(String::as_str), Some("item 25"));
    }

    #[tokio::test]
    async fn expired_spawn_task_is_not_replayed() {
        let server = server();
        // Completed two minutes and one second ago.
        let stale = SpawnTask {
            task_id: "old".into(),
            label: "old task".into(),
            status: SpawnStatus::Completed,
            started_at: 0,
            completed_at: Some(now_ms() - replay::SPAWN_TASK_TTL_MS - 1_000),
            result_preview: None,
        };
        server.broadcast_spawn_task(stale);
        let live = SpawnTask {
            task_id: "live".into(),
            label: "live task".into(),
            status: SpawnStatus::Polling,
            started_at: 0,
            completed_at: None,
            result_preview: None,
        };
        server.broadcast_spawn_task(live);

        let (_id, mut rx, _alive) = server.register();
        let replayed: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|m| match m {
                Outbound::Msg(OverlayOut::SpawnTask(t)) => Some(t.task_id),
                _ => None,
            })
            .collect();
        assert_eq!(replayed, vec!["live"]);
    }

    #[tokio::test]
    async fn live_clients_see_spawn_updates() {
        let server = server();
        let (_id, mut rx, _alive) = server.register();
        drain(&mut rx);

        server.broadcast_spawn_task(SpawnTask {
            task_id: "t".into(),
            label: "work".into(),
            status: SpawnStatus::Spawned,
            started_at: 1,
            completed_at: None,
            result_preview: None,
        });
        let msgs = drain(&mut rx);
        assert!(matches!(
            msgs.as_slice(),
            [Outbound::Msg(OverlayOut::SpawnTask(_))]
        ));
    }

    #[tokio::test]
    async fn heartbeat_closes_after_two_silent_rounds() {
        let server = server();
        let (id, mut rx, alive) = server.register();
        drain(&mut rx);

        // Round one: client was alive; gets pinged and marked dead.
        server.heartbeat_round();
        let msgs = drain(&mut rx);
        assert!(msgs.iter().any(|m| matches!(m, Outbound::ProtoPing)));
        assert!(msgs
            .iter()
            .any(|m| matches!(m, Outbound::Msg(OverlayOut::Ping { .. }))));
        assert!(!alive.load(Ordering::SeqCst));

        // No pong arrives. Round two: closed with 4000 and removed.
        server.heartbeat_round();
        let msgs = drain(&mut rx);
        assert!(msgs.iter().any(|m| matches!(
            m,
            Outbound::Close {
                code: CLOSE_UNRESPONSIVE,
                ..
            }
        )));
        assert_eq!(server.client_count(), 0);

        // A pong in between would have kept it open.
        let (_id2, mut rx2, alive2) = server.register();
        drain(&mut rx2);
        server.heartbeat_round();
        alive2.store(true, Ordering::SeqCst);
        server.heartbeat_round();
        assert!(!drain(&mut rx2)
            .iter()
            .any(|m| matches!(m, Outbound::Close { .. })));
        let _ = id;
    }

    #[tokio::test]
    async fn broadcast_reaches_all_clients_in_order() {
        let server = server();
        let (_a, mut rx_a, _) = server.register();
        let (_b, mut rx_b, _) = server.register();
        drain(&mut rx_a);
        drain(&mut rx_b);

        server.broadcast_feed(&feed_item(1, "one"));
        server.broadcast_feed(&feed_item(2, "two"));

        for rx in [&mut rx_a, &mut rx_b] {
            let texts: Vec<String> = drain(rx)
                .into_iter()
                .filter_map(|m| match m {
                    Outbound::Msg(OverlayOut::Feed { text, .. }) => Some(text),
                    _ => None,
                })
                .collect();
            assert_eq!(texts, vec!["one", "two"]);
        }
    }
}
