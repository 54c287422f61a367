//! Escalation orchestration: cooldown/dedup bookkeeping, message build,
//! transport selection, and response handling.
//!
//! The orchestrator owns the escalation clock and the RPC client handle.
//! Cooldown is marked atomically at decision time — before any I/O — so a
//! slow delivery cannot let a second escalation slip through. Delivery runs
//! in a spawned task and never blocks the tick engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use sn_domain::config::EscalationMode;
use sn_domain::entry::AgentEntry;
use sn_domain::feed::{FeedChannel, FeedPriority, FeedSource, NewFeedItem};
use sn_domain::now_ms;
use sn_gateway_client::{GatewayClient, HookClient};
use sn_protocol::gateway::WaitOutcome;

use crate::bus::FeedBus;
use crate::context::ContextWindow;
use crate::escalation::message::build_escalation_message;
use crate::escalation::score::{self, GateState};
use crate::util::truncate_chars;

/// `agent.wait` deadline.
pub const RPC_WAIT_TIMEOUT_MS: u64 = 60_000;
/// Assistant replies pushed to the feed are capped at this many chars.
const REPLY_CAP: usize = 2_000;
const ROBOT_GLYPH: &str = "🤖";

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationStats {
    pub total_escalations: u64,
    pub total_responses: u64,
    pub total_errors: u64,
    pub total_no_reply: u64,
    pub last_escalation_ts: i64,
    pub last_response_ts: i64,
}

/// What the tick engine records in its trace.
#[derive(Debug, Clone)]
pub struct EscalationDecision {
    pub escalated: bool,
    pub score_total: u32,
    pub reasons: Vec<String>,
}

struct DedupState {
    last_escalation_ts: i64,
    last_escalated_digest: Option<String>,
}

struct Counters {
    escalations: AtomicU64,
    responses: AtomicU64,
    errors: AtomicU64,
    no_reply: AtomicU64,
    last_escalation_ts: Mutex<i64>,
    last_response_ts: Mutex<i64>,
}

pub struct Orchestrator {
    mode: RwLock<EscalationMode>,
    cooldown_ms: i64,
    session_key: String,
    gateway: Arc<GatewayClient>,
    hook: Option<HookClient>,
    bus: FeedBus,
    dedup: Mutex<DedupState>,
    counters: Counters,
}

impl Orchestrator {
    pub fn new(
        mode: EscalationMode,
        cooldown_ms: i64,
        session_key: String,
        gateway: Arc<GatewayClient>,
        hook: Option<HookClient>,
        bus: FeedBus,
    ) -> Arc<Self> {
        Arc::new(Self {
            mode: RwLock::new(mode),
            cooldown_ms,
            session_key,
            gateway,
            hook,
            bus,
            dedup: Mutex::new(DedupState {
                last_escalation_ts: 0,
                last_escalated_digest: None,
            }),
            counters: Counters {
                escalations: AtomicU64::new(0),
                responses: AtomicU64::new(0),
                errors: AtomicU64::new(0),
                no_reply: AtomicU64::new(0),
                last_escalation_ts: Mutex::new(0),
                last_response_ts: Mutex::new(0),
            },
        })
    }

    pub fn mode(&self) -> EscalationMode {
        *self.mode.read()
    }

    /// Runtime mode swap. Crossing the off/non-off edge brings the RPC
    /// socket up or tears it down.
    pub fn set_mode(self: &Arc<Self>, mode: EscalationMode) {
        let previous = {
            let mut slot = self.mode.write();
            std::mem::replace(&mut *slot, mode)
        };
        if previous == mode {
            return;
        }
        tracing::info!(from = %previous, to = %mode, "escalation mode changed");
        match (previous, mode) {
            (EscalationMode::Off, _) => self.gateway.start(),
            (_, EscalationMode::Off) => self.gateway.stop(),
            _ => {}
        }
    }

    pub fn stats(&self) -> EscalationStats {
        EscalationStats {
            total_escalations: self.counters.escalations.load(Ordering::SeqCst),
            total_responses: self.counters.responses.load(Ordering::SeqCst),
            total_errors: self.counters.errors.load(Ordering::SeqCst),
            total_no_reply: self.counters.no_reply.load(Ordering::SeqCst),
            last_escalation_ts: *self.counters.last_escalation_ts.lock(),
            last_response_ts: *self.counters.last_response_ts.lock(),
        }
    }

    // ── Tick entry point ───────────────────────────────────────────

    /// Score the tick and, if the gate passes, mark the cooldown and spawn
    /// the delivery. Returns what the trace should record.
    pub fn on_tick(self: &Arc<Self>, entry: &AgentEntry, window: &ContextWindow) -> EscalationDecision {
        let mode = self.mode();
        let breakdown = score::calculate_escalation_score(&entry.digest, window);
        let now = now_ms();

        let escalate = {
            let mut dedup = self.dedup.lock();
            let gate = GateState {
                mode,
                now_ms: now,
                last_escalation_ts: dedup.last_escalation_ts,
                cooldown_ms: self.cooldown_ms,
                last_escalated_digest: dedup.last_escalated_digest.as_deref(),
            };
            let go = score::should_escalate(&gate, &entry.hud, &entry.digest, breakdown.total);
            if go {
                // Cooldown starts at decision time, not delivery time.
                dedup.last_escalation_ts = now;
                dedup.last_escalated_digest = Some(entry.digest.clone());
            }
            go
        };

        if !escalate {
            return EscalationDecision {
                escalated: false,
                score_total: breakdown.total,
                reasons: breakdown.reasons,
            };
        }

        self.counters.escalations.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_escalation_ts.lock() = now;

        let message = build_escalation_message(mode, entry, window);
        let idem_key = format!("hud-{}-{}", entry.id, now);
        tracing::info!(
            tick_id = entry.id,
            score = breakdown.total,
            bytes = message.len(),
            "escalating to assistant"
        );

        let this = self.clone();
        tokio::spawn(async move {
            this.deliver(message, idem_key, mode).await;
        });

        EscalationDecision {
            escalated: true,
            score_total: breakdown.total,
            reasons: breakdown.reasons,
        }
    }

    /// Overlay user-message path: skips scoring, same transport rules.
    pub async fn direct_send(self: Arc<Self>, text: String) {
        let mode = self.mode();
        let idem_key = format!("msg-{}", now_ms());
        self.deliver(text, idem_key, mode).await;
    }

    // ── Delivery ───────────────────────────────────────────────────

    /// RPC primary, HTTP hook fallback, fire-and-forget degradation.
    async fn deliver(&self, message: String, idem_key: String, mode: EscalationMode) {
        let rpc_up = self.gateway.is_connected();
        if rpc_up {
            match self
                .gateway
                .agent_wait(&message, &idem_key, &self.session_key, RPC_WAIT_TIMEOUT_MS)
                .await
            {
                Ok(outcome) => {
                    self.handle_wait_outcome(outcome, &message, mode);
                    return;
                }
                Err(e) => {
                    // Transport exception: surface it, then fall through to
                    // the hook.
                    tracing::warn!(error = %e, "RPC delivery failed, falling back to hook");
                    self.counters.errors.fetch_add(1, Ordering::SeqCst);
                    self.push_error_note(&format!("escalation RPC failed: {e}"));
                }
            }
        }

        match &self.hook {
            Some(hook) => {
                if let Err(e) = hook.post_wake(&message, &self.session_key).await {
                    tracing::warn!(error = %e, "hook delivery failed");
                    self.counters.errors.fetch_add(1, Ordering::SeqCst);
                }
            }
            None => {
                if !rpc_up {
                    tracing::debug!("no assistant transport available, skipping delivery");
                }
            }
        }
    }

    fn handle_wait_outcome(&self, outcome: WaitOutcome, message: &str, mode: EscalationMode) {
        match outcome {
            WaitOutcome::Reply(_) => {
                if let Some(text) = outcome.joined_text() {
                    self.counters.responses.fetch_add(1, Ordering::SeqCst);
                    *self.counters.last_response_ts.lock() = now_ms();
                    self.bus.publish(NewFeedItem {
                        source: FeedSource::Assistant,
                        channel: FeedChannel::Agent,
                        priority: FeedPriority::High,
                        text: truncate_chars(&format!("{ROBOT_GLYPH} {text}"), REPLY_CAP),
                    });
                } else {
                    self.counters.no_reply.fetch_add(1, Ordering::SeqCst);
                    if mode.always_escalates() {
                        // In focus/rich the user expects something on the
                        // HUD; fall back to echoing the digest we sent.
                        let digest = extract_digest(message).unwrap_or(message);
                        self.bus.publish(NewFeedItem {
                            source: FeedSource::Agent,
                            channel: FeedChannel::Agent,
                            priority: FeedPriority::Normal,
                            text: truncate_chars(digest, REPLY_CAP),
                        });
                    } else {
                        tracing::debug!("assistant had no reply");
                    }
                }
            }
            WaitOutcome::Error(detail) => {
                self.counters.errors.fetch_add(1, Ordering::SeqCst);
                self.push_error_note(&format!("escalation error: {detail}"));
            }
            WaitOutcome::Timeout => {
                // The assistant may still be processing; no retry, no
                // fallback.
                self.counters.no_reply.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("agent.wait timed out");
            }
        }
    }

    fn push_error_note(&self, note: &str) {
        self.bus.publish(NewFeedItem {
            source: FeedSource::System,
            channel: FeedChannel::Stream,
            priority: FeedPriority::Normal,
            text: format!("[err] {}", truncate_chars(note, 400)),
        });
    }
}

/// Pull the `## Digest` section back out of an escalation message.
fn extract_digest(message: &str) -> Option<&str> {
    let start = message.find("## Digest\n")? + "## Digest\n".len();
    let rest = &message[start..];
    let end = rest.find("\n\n").unwrap_or(rest.len());
    Some(rest[..end].trim())
}
