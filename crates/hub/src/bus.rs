//! Feed publishing: one path for every producer.
//!
//! A published item is pushed into the feed buffer (id assignment, pruning),
//! broadcast to connected overlays, and counts as a new event for the tick
//! engine's debounce.

use std::sync::Arc;

use tokio::sync::Notify;

use sn_domain::feed::{FeedItem, NewFeedItem};

use crate::buffers::FeedBuffer;
use crate::overlay::OverlayServer;

#[derive(Clone)]
pub struct FeedBus {
    pub feed: Arc<FeedBuffer>,
    pub overlay: Arc<OverlayServer>,
    pub analyzer_wake: Arc<Notify>,
}

impl FeedBus {
    pub fn new(
        feed: Arc<FeedBuffer>,
        overlay: Arc<OverlayServer>,
        analyzer_wake: Arc<Notify>,
    ) -> Self {
        Self {
            feed,
            overlay,
            analyzer_wake,
        }
    }

    pub fn publish(&self, new: NewFeedItem) -> FeedItem {
        let item = self.feed.push(new);
        self.overlay.broadcast_feed(&item);
        self.analyzer_wake.notify_one();
        item
    }
}
