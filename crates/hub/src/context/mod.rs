//! Context-window assembly: one richness-bounded snapshot of the buffers
//! for a tick. No I/O — a pure function over consistent buffer snapshots.

pub mod appname;

use sn_domain::feed::{FeedItem, FeedSource};
use sn_domain::now_ms;
use sn_domain::richness::RichnessPreset;
use sn_domain::sense::SenseEvent;

use crate::buffers::{FeedBuffer, SenseBuffer};

/// One app-to-app transition inside the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTransition {
    pub app: String,
    pub ts: i64,
}

/// Ephemeral snapshot a tick works from.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    /// Screen events inside the bound, newest first, capped by the preset.
    pub screen: Vec<SenseEvent>,
    /// Audio transcripts inside the bound, newest first, capped by the preset.
    pub audio: Vec<FeedItem>,
    /// Timestamp of the newest selected event, or 0 with no events.
    pub newest_event_ts: i64,
    pub current_app: String,
    /// De-duplicated adjacent app chain over the same window.
    pub app_history: Vec<AppTransition>,
    pub richness: RichnessPreset,
}

impl ContextWindow {
    pub fn app_history_names(&self) -> Vec<String> {
        self.app_history.iter().map(|t| t.app.clone()).collect()
    }
}

/// Snapshot both buffers and assemble the window for `[now - age_ms, now]`.
pub fn assemble(
    feed: &FeedBuffer,
    sense: &SenseBuffer,
    age_ms: i64,
    richness: RichnessPreset,
) -> ContextWindow {
    let now = now_ms();
    let since = now - age_ms;

    let mut screen = sense.query_by_time(since);
    screen.sort_by(|a, b| b.ts.cmp(&a.ts));
    screen.truncate(richness.max_screen_events);

    let mut audio: Vec<FeedItem> = feed
        .query_by_source(FeedSource::Audio, since)
        .into_iter()
        .collect();
    audio.sort_by(|a, b| b.ts.cmp(&a.ts));
    audio.truncate(richness.max_audio_entries);

    let newest_event_ts = screen
        .iter()
        .map(|e| e.ts)
        .chain(audio.iter().map(|i| i.ts))
        .max()
        .unwrap_or(0)
        .max(0);

    let current_app = appname::normalize(&sense.latest_app());

    // Normalize history names, then re-deduplicate adjacent entries: two
    // raw names may collapse into the same canonical one.
    let mut app_history: Vec<AppTransition> = Vec::new();
    for (raw, ts) in sense.app_history(since) {
        let app = appname::normalize(&raw);
        if app_history.last().map(|t| t.app.as_str()) != Some(app.as_str()) {
            app_history.push(AppTransition { app, ts });
        }
    }

    ContextWindow {
        screen,
        audio,
        newest_event_ts,
        current_app,
        app_history,
        richness,
    }
}
