use std::collections::VecDeque;

use parking_lot::RwLock;

use sn_domain::now_ms;
use sn_domain::sense::{NewSenseEvent, SenseEvent};

pub const SENSE_CAPACITY: usize = 30;

struct Inner {
    events: VecDeque<SenseEvent>,
    next_id: u64,
    version: u64,
}

/// Bounded store for screen-capture observations.
pub struct SenseBuffer {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl Default for SenseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SenseBuffer {
    pub fn new() -> Self {
        Self::with_capacity(SENSE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                events: VecDeque::new(),
                next_id: 1,
                version: 0,
            }),
            capacity,
        }
    }

    /// Assign the next id, stamp `received_at` with the local clock, bump
    /// the version, truncate from the head if over capacity. The producer's
    /// `ts` is taken as-is, future-dated or not.
    pub fn push(&self, new: NewSenseEvent) -> SenseEvent {
        let mut inner = self.inner.write();
        let event = SenseEvent {
            id: inner.next_id,
            ts: new.ts,
            received_at: now_ms(),
            kind: new.kind,
            ocr: new.ocr,
            meta: new.meta,
            roi: new.roi,
            diff: new.diff,
        };
        inner.next_id += 1;
        inner.version += 1;
        inner.events.push_back(event.clone());
        while inner.events.len() > self.capacity {
            inner.events.pop_front();
        }
        event
    }

    /// Events with id strictly greater than `after_id`, in id order. When
    /// `meta_only`, binary image data is deep-stripped from the copies.
    pub fn query(&self, after_id: u64, meta_only: bool) -> Vec<SenseEvent> {
        self.inner
            .read()
            .events
            .iter()
            .filter(|e| e.id > after_id)
            .map(|e| if meta_only { e.strip_binary() } else { e.clone() })
            .collect()
    }

    pub fn query_by_time(&self, since_ms: i64) -> Vec<SenseEvent> {
        self.inner
            .read()
            .events
            .iter()
            .filter(|e| e.ts >= since_ms)
            .cloned()
            .collect()
    }

    /// Most recent `meta.app`, or `"unknown"` when the buffer is empty or
    /// the newest event has no app.
    pub fn latest_app(&self) -> String {
        self.inner
            .read()
            .events
            .back()
            .map(|e| e.meta.app.clone())
            .filter(|app| !app.is_empty())
            .unwrap_or_else(|| "unknown".into())
    }

    /// Distinct adjacent `meta.app` values since `since_ms`, paired with the
    /// producer timestamp of the transition. Non-adjacent repeats are kept.
    pub fn app_history(&self, since_ms: i64) -> Vec<(String, i64)> {
        let inner = self.inner.read();
        let mut out: Vec<(String, i64)> = Vec::new();
        for event in inner.events.iter().filter(|e| e.ts >= since_ms) {
            let app = event.meta.app.as_str();
            if app.is_empty() {
                continue;
            }
            if out.last().map(|(a, _)| a.as_str()) != Some(app) {
                out.push((app.to_string(), event.ts));
            }
        }
        out
    }

    pub fn latest(&self) -> Option<SenseEvent> {
        self.inner.read().events.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().events.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_domain::sense::{BinaryPayload, SenseKind, SenseMeta};

    fn event_for(app: &str, ts: i64) -> NewSenseEvent {
        NewSenseEvent {
            ts,
            kind: SenseKind::Text,
            ocr: "text".into(),
            meta: SenseMeta {
                app: app.into(),
                window_title: None,
                screen: 0,
                ssim: 0.9,
            },
            roi: None,
            diff: None,
        }
    }

    #[test]
    fn capacity_prunes_oldest_only() {
        let buf = SenseBuffer::with_capacity(3);
        for i in 0..5 {
            buf.push(event_for("app", i));
        }
        let ids: Vec<u64> = buf.query(0, false).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(buf.version(), 5);
    }

    #[test]
    fn meta_only_strips_binary_data() {
        let buf = SenseBuffer::new();
        let mut ev = event_for("app", 1);
        ev.roi = Some(BinaryPayload {
            data: Some("aGVsbG8=".into()),
            width: 10,
            height: 10,
        });
        buf.push(ev);

        let full = buf.query(0, false);
        assert!(full[0].roi.as_ref().and_then(|r| r.data.as_ref()).is_some());

        let stripped = buf.query(0, true);
        let roi = stripped[0].roi.as_ref().expect("roi kept");
        assert!(roi.data.is_none());
        assert_eq!(roi.width, 10);
        // The stored copy is untouched.
        assert!(buf.query(0, false)[0]
            .roi
            .as_ref()
            .and_then(|r| r.data.as_ref())
            .is_some());
    }

    #[test]
    fn latest_app_falls_back_to_unknown() {
        let buf = SenseBuffer::new();
        assert_eq!(buf.latest_app(), "unknown");
        buf.push(event_for("Terminal", 1));
        assert_eq!(buf.latest_app(), "Terminal");
        buf.push(event_for("", 2));
        assert_eq!(buf.latest_app(), "unknown");
    }

    #[test]
    fn app_history_keeps_non_adjacent_repeats() {
        let buf = SenseBuffer::new();
        for (app, ts) in [
            ("code", 1),
            ("code", 2),
            ("chrome", 3),
            ("code", 4),
            ("code", 5),
            ("slack", 6),
        ] {
            buf.push(event_for(app, ts));
        }
        let history = buf.app_history(0);
        let apps: Vec<&str> = history.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(apps, vec!["code", "chrome", "code", "slack"]);
        // Transition timestamps come from the first event of each run.
        assert_eq!(history[0].1, 1);
        assert_eq!(history[2].1, 4);
    }

    #[test]
    fn app_history_honours_time_bound() {
        let buf = SenseBuffer::new();
        buf.push(event_for("old", 10));
        buf.push(event_for("new", 100));
        let history = buf.app_history(50);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].0, "new");
    }

    #[test]
    fn future_ts_is_accepted() {
        let buf = SenseBuffer::new();
        let future = now_ms() + 3_600_000;
        let ev = buf.push(event_for("app", future));
        assert_eq!(ev.ts, future);
        assert!(ev.received_at <= future);
    }
}
