//! Feed items — the unified activity stream consumed by the overlay.

use serde::{Deserialize, Serialize};

/// Where a feed item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Audio,
    Sense,
    Agent,
    Assistant,
    System,
}

/// Which overlay lane the item renders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedChannel {
    #[default]
    Stream,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedPriority {
    #[default]
    Normal,
    High,
    Urgent,
}

/// One entry in the feed buffer. `id` is assigned by the buffer, is strictly
/// increasing, and is never reused or mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: u64,
    /// Milliseconds since epoch, stamped at push time.
    pub ts: i64,
    pub source: FeedSource,
    pub channel: FeedChannel,
    pub priority: FeedPriority,
    pub text: String,
}

/// A feed item before the buffer assigns identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFeedItem {
    #[serde(default = "d_source")]
    pub source: FeedSource,
    #[serde(default)]
    pub channel: FeedChannel,
    #[serde(default)]
    pub priority: FeedPriority,
    pub text: String,
}

fn d_source() -> FeedSource {
    FeedSource::System
}

impl NewFeedItem {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            source: FeedSource::System,
            channel: FeedChannel::Stream,
            priority: FeedPriority::Normal,
            text: text.into(),
        }
    }
}
