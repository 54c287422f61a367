//! Bounded, monotonically-versioned in-memory buffers.
//!
//! Ids are strictly increasing and never reused; pruning removes from the
//! oldest end only; the version counter bumps on every push and never
//! decreases. Readers always receive value copies taken under one lock
//! acquisition, never a torn entry.

mod feed;
mod sense;

pub use feed::{FeedBuffer, FEED_CAPACITY, PERIODIC_PREFIX};
pub use sense::{SenseBuffer, SENSE_CAPACITY};
