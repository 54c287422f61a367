//! Agent tick results.

use serde::{Deserialize, Serialize};

/// Summary of the context window a tick observed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContextStats {
    pub current_app: String,
    pub app_history_names: Vec<String>,
    pub audio_count: usize,
    pub screen_count: usize,
}

/// The outcome of one analyzer tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEntry {
    /// Tick sequence number.
    pub id: u64,
    pub ts: i64,
    /// Model that actually answered (may be a fallback).
    pub model: String,
    pub latency_ms: u64,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub parsed_ok: bool,
    pub hud: String,
    pub digest: String,
    /// Age of the newest observed event at tick time.
    pub context_freshness_ms: i64,
    pub context: ContextStats,
}
