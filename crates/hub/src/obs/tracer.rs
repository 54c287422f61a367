//! Per-tick tracing: span recording during a tick, a rolling window of
//! finished traces, and running latency/cost summaries.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use sn_domain::now_ms;
use sn_domain::trace::{Span, SpanStatus, Trace, TraceMetrics};

use sn_model::chain::Attempt;

/// Finished traces retained in memory.
pub const MAX_TRACES: usize = 500;

/// Builder a tick carries while running. Spans are closed in the order they
/// were opened; `finish` seals the trace.
pub struct TickTrace {
    trace: Trace,
    open: Option<usize>,
}

impl TickTrace {
    pub fn new(tick_id: u64) -> Self {
        Self {
            trace: Trace {
                trace_id: uuid::Uuid::new_v4().to_string(),
                tick_id,
                ts: now_ms(),
                spans: Vec::new(),
                metrics: TraceMetrics::default(),
            },
            open: None,
        }
    }

    pub fn tick_id(&self) -> u64 {
        self.trace.tick_id
    }

    pub fn start_span(&mut self, name: &str) {
        self.trace.spans.push(Span {
            name: name.to_string(),
            start_ts: now_ms(),
            end_ts: 0,
            attributes: serde_json::Map::new(),
            status: SpanStatus::Ok,
            error: None,
        });
        self.open = Some(self.trace.spans.len() - 1);
    }

    pub fn end_span_ok(&mut self, attributes: serde_json::Map<String, serde_json::Value>) {
        self.close_span(attributes, SpanStatus::Ok, None);
    }

    pub fn end_span_error(
        &mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
        error: impl Into<String>,
    ) {
        self.close_span(attributes, SpanStatus::Error, Some(error.into()));
    }

    fn close_span(
        &mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
        status: SpanStatus,
        error: Option<String>,
    ) {
        if let Some(idx) = self.open.take() {
            let span = &mut self.trace.spans[idx];
            span.end_ts = now_ms();
            span.attributes = attributes;
            span.status = status;
            span.error = error;
        }
    }

    /// Record one model-chain attempt as a completed `llmCall` span.
    pub fn push_llm_attempt(&mut self, attempt: &Attempt) {
        let mut attributes = serde_json::Map::new();
        attributes.insert("model".into(), attempt.model.clone().into());
        attributes.insert("tokensIn".into(), attempt.tokens_in.into());
        attributes.insert("tokensOut".into(), attempt.tokens_out.into());
        let (status, error) = match &attempt.error {
            Some(e) => (SpanStatus::Error, Some(e.clone())),
            None => (SpanStatus::Ok, None),
        };
        self.trace.spans.push(Span {
            name: "llmCall".into(),
            start_ts: attempt.started_at,
            end_ts: attempt.started_at + attempt.latency_ms as i64,
            attributes,
            status,
            error,
        });
    }

    pub fn finish(mut self, metrics: TraceMetrics) -> Trace {
        // Seal any span left open by an early exit.
        if self.open.is_some() {
            self.end_span_error(serde_json::Map::new(), "span left open at finish");
        }
        self.trace.metrics = metrics;
        self.trace
    }
}

/// Running summary over everything ever recorded plus the retained window.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub count: u64,
    pub latency_p50: u64,
    pub latency_p95: u64,
    pub avg_cost_per_tick: f64,
    pub total_cost: f64,
}

struct TracerInner {
    traces: VecDeque<Trace>,
    count: u64,
    total_cost: f64,
}

/// Rolling window of the last [`MAX_TRACES`] traces.
pub struct Tracer {
    inner: Mutex<TracerInner>,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TracerInner {
                traces: VecDeque::new(),
                count: 0,
                total_cost: 0.0,
            }),
        }
    }

    pub fn record(&self, trace: Trace) {
        let mut inner = self.inner.lock();
        inner.count += 1;
        inner.total_cost += trace.metrics.llm_cost;
        inner.traces.push_back(trace);
        while inner.traces.len() > MAX_TRACES {
            inner.traces.pop_front();
        }
    }

    /// Traces with tick id strictly greater than `after`, oldest first,
    /// capped at `limit`.
    pub fn get_traces(&self, after: u64, limit: usize) -> Vec<Trace> {
        self.inner
            .lock()
            .traces
            .iter()
            .filter(|t| t.tick_id > after)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> TraceSummary {
        let inner = self.inner.lock();
        let mut latencies: Vec<u64> = inner
            .traces
            .iter()
            .map(|t| t.metrics.total_latency_ms)
            .collect();
        latencies.sort_unstable();

        let pick = |q: f64| -> u64 {
            if latencies.is_empty() {
                return 0;
            }
            let idx = ((latencies.len() as f64 - 1.0) * q).round() as usize;
            latencies[idx]
        };

        TraceSummary {
            count: inner.count,
            latency_p50: pick(0.50),
            latency_p95: pick(0.95),
            avg_cost_per_tick: if inner.count > 0 {
                inner.total_cost / inner.count as f64
            } else {
                0.0
            },
            total_cost: inner.total_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace_with_latency(tick_id: u64, latency: u64, cost: f64) -> Trace {
        let tick = TickTrace::new(tick_id);
        tick.finish(TraceMetrics {
            total_latency_ms: latency,
            llm_latency_ms: latency / 2,
            llm_cost: cost,
            ..TraceMetrics::default()
        })
    }

    #[test]
    fn spans_are_kept_in_insertion_order() {
        let mut tick = TickTrace::new(1);
        tick.start_span("contextBuild");
        tick.end_span_ok(serde_json::Map::new());
        tick.push_llm_attempt(&Attempt {
            model: "primary".into(),
            started_at: 100,
            latency_ms: 40,
            tokens_in: 0,
            tokens_out: 0,
            error: Some("HTTP 500".into()),
        });
        tick.push_llm_attempt(&Attempt {
            model: "backup".into(),
            started_at: 150,
            latency_ms: 30,
            tokens_in: 20,
            tokens_out: 10,
            error: None,
        });
        let trace = tick.finish(TraceMetrics::default());

        assert_eq!(trace.spans.len(), 3);
        assert_eq!(trace.spans[0].name, "contextBuild");
        assert_eq!(trace.spans[1].status, SpanStatus::Error);
        assert_eq!(trace.spans[2].status, SpanStatus::Ok);
        assert_eq!(trace.spans[2].end_ts, 180);
    }

    #[test]
    fn unclosed_span_is_sealed_as_error() {
        let mut tick = TickTrace::new(1);
        tick.start_span("contextBuild");
        let trace = tick.finish(TraceMetrics::default());
        assert_eq!(trace.spans[0].status, SpanStatus::Error);
        assert!(trace.spans[0].end_ts >= trace.spans[0].start_ts);
    }

    #[test]
    fn window_is_bounded_and_count_keeps_running() {
        let tracer = Tracer::new();
        for i in 0..(MAX_TRACES as u64 + 20) {
            tracer.record(trace_with_latency(i + 1, 10, 0.001));
        }
        let summary = tracer.summary();
        assert_eq!(summary.count, MAX_TRACES as u64 + 20);
        assert_eq!(tracer.get_traces(0, usize::MAX).len(), MAX_TRACES);
    }

    #[test]
    fn get_traces_filters_by_tick_and_limit() {
        let tracer = Tracer::new();
        for i in 1..=10 {
            tracer.record(trace_with_latency(i, 10, 0.0));
        }
        let traces = tracer.get_traces(7, 2);
        let ids: Vec<u64> = traces.iter().map(|t| t.tick_id).collect();
        assert_eq!(ids, vec![8, 9]);
    }

    #[test]
    fn percentiles_and_cost() {
        let tracer = Tracer::new();
        for latency in [10, 20, 30, 40, 100] {
            tracer.record(trace_with_latency(latency, latency, 0.01));
        }
        let summary = tracer.summary();
        assert_eq!(summary.latency_p50, 30);
        assert_eq!(summary.latency_p95, 100);
        assert!((summary.total_cost - 0.05).abs() < 1e-9);
        assert!((summary.avg_cost_per_tick - 0.01).abs() < 1e-9);
    }
}
