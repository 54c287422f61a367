//! Per-tick trace model: spans with attributes plus roll-up metrics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub name: String,
    pub start_ts: i64,
    pub end_ts: i64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub status: SpanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TraceMetrics {
    pub total_latency_ms: u64,
    pub llm_latency_ms: u64,
    pub llm_input_tokens: u32,
    pub llm_output_tokens: u32,
    pub llm_cost: f64,
    pub escalated: bool,
    pub escalation_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_latency_ms: Option<u64>,
    pub context_screen_events: usize,
    pub context_audio_entries: usize,
    pub context_richness: String,
    pub digest_length: usize,
    pub hud_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub trace_id: String,
    pub tick_id: u64,
    pub ts: i64,
    pub spans: Vec<Span>,
    pub metrics: TraceMetrics,
}
