//! The tick engine: debounce/interval scheduling, context assembly, model
//! invocation with the fallback chain, parsing, and the per-tick trace.
//!
//! At most one tick is ever in flight — the scheduler task awaits each tick
//! inline. Debounced triggers are rejected inside the post-tick cooldown;
//! the max-interval tick fires regardless.

pub mod prompt;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sn_domain::config::AgentConfig;
use sn_domain::entry::{AgentEntry, ContextStats};
use sn_domain::feed::{FeedChannel, FeedPriority, FeedSource, NewFeedItem};
use sn_domain::now_ms;
use sn_domain::richness::RichnessPreset;
use sn_domain::trace::TraceMetrics;
use sn_model::chain::{Attempt, ModelChain};
use sn_model::client::ChatTransport;
use sn_model::parse::parse_hud_digest;

use crate::buffers::{FeedBuffer, SenseBuffer, PERIODIC_PREFIX};
use crate::bus::FeedBus;
use crate::context;
use crate::escalation::Orchestrator;
use crate::obs::{Profiler, TickTrace, TraceJournal, Tracer};
use crate::overlay::OverlayServer;
use crate::situation;

/// Everything the analyzer needs, wired once at startup.
pub struct AnalyzerParts {
    pub cfg: AgentConfig,
    pub transport: Arc<dyn ChatTransport>,
    pub feed: Arc<FeedBuffer>,
    pub sense: Arc<SenseBuffer>,
    pub bus: FeedBus,
    pub overlay: Arc<OverlayServer>,
    pub orchestrator: Arc<Orchestrator>,
    pub tracer: Arc<Tracer>,
    pub journal: Arc<TraceJournal>,
    pub profiler: Arc<Profiler>,
    /// Situation snapshot target; `None` disables the write.
    pub situation_path: Option<PathBuf>,
    pub wake: Arc<Notify>,
}

pub struct Analyzer {
    parts: AnalyzerParts,
    preset: RichnessPreset,
    chain: ModelChain,
    tick_seq: AtomicU64,
    last_hud: Mutex<String>,
    last_entry: Mutex<Option<AgentEntry>>,
}

impl Analyzer {
    pub fn new(parts: AnalyzerParts) -> Arc<Self> {
        let preset = RichnessPreset::for_level(parts.cfg.richness);
        let chain = ModelChain::new(parts.cfg.model.clone(), parts.cfg.fallback_models.clone());
        Arc::new(Self {
            parts,
            preset,
            chain,
            tick_seq: AtomicU64::new(0),
            last_hud: Mutex::new(String::new()),
            last_entry: Mutex::new(None),
        })
    }

    pub fn last_entry(&self) -> Option<AgentEntry> {
        self.last_entry.lock().clone()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_seq.load(Ordering::SeqCst)
    }

    /// Run the scheduler until cancelled.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let analyzer = self.clone();
        tokio::spawn(async move { analyzer.run_loop(cancel).await })
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        let debounce = Duration::from_millis(self.parts.cfg.debounce_ms);
        let max_interval = Duration::from_millis(self.parts.cfg.max_interval_ms);
        let cooldown = Duration::from_millis(self.parts.cfg.cooldown_ms);

        let mut debounce_deadline: Option<Instant> = None;
        let mut next_interval = Instant::now() + max_interval;
        let mut last_tick_end: Option<Instant> = None;

        tracing::info!(
            debounce_ms = self.parts.cfg.debounce_ms,
            max_interval_ms = self.parts.cfg.max_interval_ms,
            cooldown_ms = self.parts.cfg.cooldown_ms,
            model = %self.chain.primary,
            fallbacks = self.chain.fallbacks.len(),
            "tick engine running"
        );

        loop {
            let next_fire = match debounce_deadline {
                Some(d) => d.min(next_interval),
                None => next_interval,
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("tick engine stopping");
                    return;
                }
                _ = self.parts.wake.notified() => {
                    let in_cooldown = last_tick_end
                        .is_some_and(|end| end.elapsed() < cooldown);
                    if in_cooldown {
                        tracing::trace!("debounce trigger rejected inside cooldown");
                    } else {
                        debounce_deadline = Some(Instant::now() + debounce);
                    }
                }
                _ = tokio::time::sleep_until(next_fire) => {
                    debounce_deadline = None;
                    self.run_tick().await;
                    last_tick_end = Some(Instant::now());
                    next_interval = Instant::now() + max_interval;
                }
            }
        }
    }

    // ── One tick ───────────────────────────────────────────────────

    async fn run_tick(&self) {
        let tick_id = self.tick_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let tick_start = std::time::Instant::now();
        let mut trace = TickTrace::new(tick_id);

        // Context assembly over one snapshot of each buffer.
        trace.start_span("contextBuild");
        let window = context::assemble(
            &self.parts.feed,
            &self.parts.sense,
            self.parts.cfg.max_age_ms,
            self.preset,
        );
        let mut attrs = serde_json::Map::new();
        attrs.insert("screenEvents".into(), window.screen.len().into());
        attrs.insert("audioEntries".into(), window.audio.len().into());
        attrs.insert("currentApp".into(), window.current_app.clone().into());
        trace.end_span_ok(attrs);

        let prompt = prompt::build_prompt(&window);

        // Model chain: one llmCall span per attempt.
        let mut attempts: Vec<Attempt> = Vec::new();
        let result = self
            .chain
            .invoke(self.parts.transport.as_ref(), &prompt, &mut |a| {
                attempts.push(a)
            })
            .await;
        for attempt in &attempts {
            trace.push_llm_attempt(attempt);
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(tick_id, error = %e, "tick failed");
                let metrics = TraceMetrics {
                    total_latency_ms: tick_start.elapsed().as_millis() as u64,
                    context_screen_events: window.screen.len(),
                    context_audio_entries: window.audio.len(),
                    context_richness: self.preset.name().into(),
                    ..TraceMetrics::default()
                };
                self.finish_trace(trace, metrics);
                return;
            }
        };

        let parsed = parse_hud_digest(&outcome.content);
        if !parsed.parsed_ok {
            tracing::debug!(tick_id, "model output was not strict JSON, using raw fallback");
        }

        let hud_changed = {
            let mut last = self.last_hud.lock();
            let changed = *last != parsed.hud;
            if changed {
                *last = parsed.hud.clone();
            }
            changed
        };

        let now = now_ms();
        let entry = AgentEntry {
            id: tick_id,
            ts: now,
            model: outcome.model.clone(),
            latency_ms: outcome.latency_ms,
            tokens_in: outcome.tokens_in,
            tokens_out: outcome.tokens_out,
            parsed_ok: parsed.parsed_ok,
            hud: parsed.hud.clone(),
            digest: parsed.digest.clone(),
            context_freshness_ms: if window.newest_event_ts > 0 {
                (now - window.newest_event_ts).max(0)
            } else {
                0
            },
            context: ContextStats {
                current_app: window.current_app.clone(),
                app_history_names: window.app_history_names(),
                audio_count: window.audio.len(),
                screen_count: window.screen.len(),
            },
        };

        // HUD to feed only on change, tagged so overlay queries skip it.
        if self.parts.cfg.push_to_feed && hud_changed && !parsed.hud.is_empty() {
            self.parts.bus.publish(NewFeedItem {
                source: FeedSource::Agent,
                channel: FeedChannel::Stream,
                priority: FeedPriority::Normal,
                text: format!("{PERIODIC_PREFIX} {}", parsed.hud),
            });
        }
        self.parts.overlay.broadcast_status();

        if let Some(path) = &self.parts.situation_path {
            trace.start_span("situationWrite");
            match situation::write_situation(path, &entry, &window) {
                Ok(()) => trace.end_span_ok(serde_json::Map::new()),
                Err(e) => {
                    tracing::warn!(error = %e, "situation snapshot write failed");
                    trace.end_span_error(serde_json::Map::new(), e.to_string());
                }
            }
        }

        // Escalation decision (delivery is spawned, never awaited here).
        trace.start_span("escalate");
        let escalate_start = std::time::Instant::now();
        let decision = self.parts.orchestrator.on_tick(&entry, &window);
        let escalation_latency_ms = escalate_start.elapsed().as_millis() as u64;
        let mut attrs = serde_json::Map::new();
        attrs.insert("escalated".into(), decision.escalated.into());
        attrs.insert("score".into(), decision.score_total.into());
        attrs.insert("reasons".into(), decision.reasons.clone().into());
        trace.end_span_ok(attrs);

        let metrics = TraceMetrics {
            total_latency_ms: tick_start.elapsed().as_millis() as u64,
            llm_latency_ms: outcome.latency_ms,
            llm_input_tokens: outcome.tokens_in,
            llm_output_tokens: outcome.tokens_out,
            llm_cost: sn_model::cost::estimate(&outcome.model, outcome.tokens_in, outcome.tokens_out),
            escalated: decision.escalated,
            escalation_score: decision.score_total,
            escalation_latency_ms: decision.escalated.then_some(escalation_latency_ms),
            context_screen_events: window.screen.len(),
            context_audio_entries: window.audio.len(),
            context_richness: self.preset.name().into(),
            digest_length: parsed.digest.len(),
            hud_changed,
        };

        self.parts
            .profiler
            .timer_record("tick", metrics.total_latency_ms as f64);
        self.parts.profiler.gauge("tick.lastId", tick_id as f64);

        *self.last_entry.lock() = Some(entry);
        self.finish_trace(trace, metrics);
        tracing::debug!(tick_id, hud = %parsed.hud, hud_changed, "tick complete");
    }

    fn finish_trace(&self, trace: TickTrace, metrics: TraceMetrics) {
        let finished = trace.finish(metrics);
        self.parts.journal.append(&finished);
        self.parts.tracer.record(finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use sn_domain::config::EscalationMode;
    use sn_domain::error::{Error, Result};
    use sn_domain::sense::{NewSenseEvent, SenseKind, SenseMeta};
    use sn_domain::trace::SpanStatus;
    use sn_gateway_client::GatewayClient;
    use sn_model::client::ChatOutcome;

    use crate::capture::CaptureState;

    /// Scripted transport: pops canned results in order.
    struct ScriptedTransport {
        script: Vec<Result<&'static str>>,
        cursor: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn chat(&self, model: &str, _prompt: &str) -> Result<ChatOutcome> {
            let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
            match self.script.get(idx) {
                Some(Ok(content)) => Ok(ChatOutcome {
                    content: (*content).into(),
                    model: model.into(),
                    tokens_in: 50,
                    tokens_out: 10,
                    latency_ms: 3,
                }),
                Some(Err(_)) | None => Err(Error::Model {
                    model: model.into(),
                    message: "HTTP 500 - scripted failure".into(),
                }),
            }
        }
    }

    fn analyzer_with(script: Vec<Result<&'static str>>, cfg: AgentConfig) -> Arc<Analyzer> {
        let feed = Arc::new(FeedBuffer::new());
        let sense = Arc::new(SenseBuffer::new());
        let overlay = OverlayServer::new(Arc::new(CaptureState::new()));
        let wake = Arc::new(Notify::new());
        let bus = FeedBus::new(feed.clone(), overlay.clone(), wake.clone());
        let gateway = GatewayClient::new("ws://127.0.0.1:9/rpc", None, Arc::new(|_| {}));
        let orchestrator = Orchestrator::new(
            EscalationMode::Off,
            90_000,
            "sess".into(),
            gateway,
            None,
            bus.clone(),
        );
        Analyzer::new(AnalyzerParts {
            cfg,
            transport: Arc::new(ScriptedTransport {
                script,
                cursor: AtomicUsize::new(0),
            }),
            feed,
            sense,
            bus,
            overlay,
            orchestrator,
            tracer: Arc::new(Tracer::new()),
            journal: Arc::new(TraceJournal::disabled()),
            profiler: Arc::new(Profiler::new()),
            situation_path: None,
            wake,
        })
    }

    fn cfg_with_fallback() -> AgentConfig {
        AgentConfig {
            fallback_models: vec!["backup-model".into()],
            ..AgentConfig::default()
        }
    }

    const GOOD_JSON: &str = r#"{"hud":"Editing Rust code","digest":"The user edits a Rust file. Tests are green. Nothing is blocked."}"#;

    #[tokio::test]
    async fn tick_records_entry_and_trace() {
        let analyzer = analyzer_with(vec![Ok(GOOD_JSON)], AgentConfig::default());
        analyzer.parts.sense.push(NewSenseEvent {
            ts: now_ms(),
            kind: SenseKind::Text,
            ocr: "fn main".into(),
            meta: SenseMeta {
                app: "code".into(),
                window_title: None,
                screen: 0,
                ssim: 1.0,
            },
            roi: None,
            diff: None,
        });

        analyzer.run_tick().await;

        let entry = analyzer.last_entry().expect("entry recorded");
        assert_eq!(entry.id, 1);
        assert!(entry.parsed_ok);
        assert_eq!(entry.hud, "Editing Rust code");
        assert_eq!(entry.context.screen_count, 1);

        let traces = analyzer.parts.tracer.get_traces(0, 10);
        assert_eq!(traces.len(), 1);
        let trace = &traces[0];
        assert!(trace.metrics.total_latency_ms >= trace.metrics.llm_latency_ms);
        assert!(trace.spans.iter().any(|s| s.name == "contextBuild"));
        assert_eq!(
            trace.spans.iter().filter(|s| s.name == "llmCall").count(),
            1
        );
        assert!(trace.metrics.hud_changed);
    }

    #[tokio::test]
    async fn model_chain_walks_to_fallback() {
        let analyzer = analyzer_with(
            vec![
                Err(Error::Other("scripted".into())),
                Err(Error::Other("scripted".into())),
                Ok(GOOD_JSON),
            ],
            AgentConfig {
                fallback_models: vec!["backup-a".into(), "backup-b".into()],
                ..AgentConfig::default()
            },
        );
        // Two scripted failures consume primary + backup-a.
        analyzer.run_tick().await;

        let entry = analyzer.last_entry().expect("fallback answered");
        assert_eq!(entry.model, "backup-b");

        let trace = &analyzer.parts.tracer.get_traces(0, 10)[0];
        let llm_spans: Vec<_> = trace.spans.iter().filter(|s| s.name == "llmCall").collect();
        assert_eq!(llm_spans.len(), 3);
        assert_eq!(llm_spans[0].status, SpanStatus::Error);
        assert_eq!(llm_spans[1].status, SpanStatus::Error);
        assert_eq!(llm_spans[2].status, SpanStatus::Ok);
    }

    #[tokio::test]
    async fn exhausted_chain_still_produces_a_trace() {
        let analyzer = analyzer_with(vec![], cfg_with_fallback());
        analyzer.run_tick().await;

        assert!(analyzer.last_entry().is_none());
        let traces = analyzer.parts.tracer.get_traces(0, 10);
        assert_eq!(traces.len(), 1);
        assert!(traces[0]
            .spans
            .iter()
            .filter(|s| s.name == "llmCall")
            .all(|s| s.status == SpanStatus::Error));
        // The engine survives and the next tick runs.
        analyzer.run_tick().await;
        assert_eq!(analyzer.parts.tracer.get_traces(0, 10).len(), 2);
    }

    #[tokio::test]
    async fn hud_change_is_pushed_with_periodic_prefix() {
        let analyzer = analyzer_with(vec![Ok(GOOD_JSON), Ok(GOOD_JSON)], AgentConfig::default());
        analyzer.run_tick().await;

        let items = analyzer.parts.feed.query(0);
        assert_eq!(items.len(), 1);
        assert!(items[0].text.starts_with(PERIODIC_PREFIX));
        assert!(items[0].text.contains("Editing Rust code"));
        // Overlay-visible queries skip it.
        assert!(analyzer.parts.feed.query_for_overlay(0).is_empty());

        // Same HUD again: no second push.
        analyzer.run_tick().await;
        assert_eq!(analyzer.parts.feed.query(0).len(), 1);
    }

    #[tokio::test]
    async fn unparseable_output_uses_raw_fallback() {
        let analyzer = analyzer_with(
            vec![Ok("the user seems to be reading the news")],
            AgentConfig::default(),
        );
        analyzer.run_tick().await;
        let entry = analyzer.last_entry().expect("entry");
        assert!(!entry.parsed_ok);
        assert_eq!(entry.digest, "the user seems to be reading the news");
    }
}
