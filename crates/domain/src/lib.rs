//! Shared domain types for the sinain hub.
//!
//! Everything that crosses a crate boundary lives here: the feed/sense data
//! model, spawn-task lifecycle, agent tick results, richness presets, the
//! per-tick trace model, the configuration tree, and the shared error type.

pub mod config;
pub mod entry;
pub mod error;
pub mod feed;
pub mod richness;
pub mod sense;
pub mod spawn;
pub mod trace;

pub use error::{Error, Result};

/// Current wall clock as milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
