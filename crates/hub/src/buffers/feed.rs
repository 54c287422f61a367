use std::collections::VecDeque;

use parking_lot::RwLock;

use sn_domain::feed::{FeedItem, FeedSource, NewFeedItem};
use sn_domain::now_ms;

pub const FEED_CAPACITY: usize = 100;

/// Items whose text starts with this prefix are periodic HUD updates; they
/// stay in the buffer but are skipped when answering overlay-directed
/// queries.
pub const PERIODIC_PREFIX: &str = "[PERIODIC]";

struct Inner {
    items: VecDeque<FeedItem>,
    next_id: u64,
    version: u64,
}

/// Bounded store for the unified activity stream.
pub struct FeedBuffer {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl Default for FeedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedBuffer {
    pub fn new() -> Self {
        Self::with_capacity(FEED_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: VecDeque::new(),
                next_id: 1,
                version: 0,
            }),
            capacity,
        }
    }

    /// Assign the next id, stamp the timestamp, bump the version, and
    /// truncate from the head if over capacity.
    pub fn push(&self, new: NewFeedItem) -> FeedItem {
        let mut inner = self.inner.write();
        let item = FeedItem {
            id: inner.next_id,
            ts: now_ms(),
            source: new.source,
            channel: new.channel,
            priority: new.priority,
            text: new.text,
        };
        inner.next_id += 1;
        inner.version += 1;
        inner.items.push_back(item.clone());
        while inner.items.len() > self.capacity {
            inner.items.pop_front();
        }
        item
    }

    /// All retained items with id strictly greater than `after_id`, in order.
    pub fn query(&self, after_id: u64) -> Vec<FeedItem> {
        self.inner
            .read()
            .items
            .iter()
            .filter(|i| i.id > after_id)
            .cloned()
            .collect()
    }

    /// The overlay-visible slice: like [`query`](Self::query) but skipping
    /// periodic HUD items.
    pub fn query_for_overlay(&self, after_id: u64) -> Vec<FeedItem> {
        self.inner
            .read()
            .items
            .iter()
            .filter(|i| i.id > after_id && !i.text.starts_with(PERIODIC_PREFIX))
            .cloned()
            .collect()
    }

    pub fn query_by_time(&self, since_ms: i64) -> Vec<FeedItem> {
        self.inner
            .read()
            .items
            .iter()
            .filter(|i| i.ts >= since_ms)
            .cloned()
            .collect()
    }

    pub fn query_by_source(&self, source: FeedSource, since_ms: i64) -> Vec<FeedItem> {
        self.inner
            .read()
            .items
            .iter()
            .filter(|i| i.source == source && i.ts >= since_ms)
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<FeedItem> {
        self.inner.read().items.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }
}
