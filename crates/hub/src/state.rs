//! Shared application state passed to all HTTP and WebSocket handlers.

use std::sync::Arc;

use tokio::sync::Notify;

use sn_domain::config::Config;

use crate::analyzer::Analyzer;
use crate::buffers::{FeedBuffer, SenseBuffer};
use crate::bus::FeedBus;
use crate::capture::CaptureState;
use crate::escalation::Orchestrator;
use crate::obs::{Profiler, Tracer};
use crate::overlay::OverlayServer;

/// Process-wide singletons, initialized at startup, torn down on shutdown.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Buffers ───────────────────────────────────────────────────
    pub feed: Arc<FeedBuffer>,
    pub sense: Arc<SenseBuffer>,
    /// Publish path: buffer push + overlay broadcast + analyzer wake.
    pub bus: FeedBus,
    /// New-event signal for the tick engine's debounce.
    pub analyzer_wake: Arc<Notify>,

    // ── Fan-out & capture ─────────────────────────────────────────
    pub capture: Arc<CaptureState>,
    pub overlay: Arc<OverlayServer>,

    // ── Escalation & analysis ─────────────────────────────────────
    pub orchestrator: Arc<Orchestrator>,
    /// `None` when the agent is disabled (no model key).
    pub analyzer: Option<Arc<Analyzer>>,

    // ── Observability ─────────────────────────────────────────────
    pub tracer: Arc<Tracer>,
    pub profiler: Arc<Profiler>,
}
