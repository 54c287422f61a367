//! Escalation message construction.
//!
//! The message is mode-sized structured text: header, digest, active
//! context, error OCR excerpts, recent screen and audio lines, and a
//! mode-dependent instructions block. Richness bounds keep lean messages a
//! few KB and rich ones around 100 KB, always under the 256 KB envelope.

use sn_domain::config::EscalationMode;
use sn_domain::entry::AgentEntry;
use sn_domain::now_ms;

use crate::context::ContextWindow;
use crate::escalation::score;
use crate::util::{age_label, single_line, truncate_chars};

pub fn build_escalation_message(
    mode: EscalationMode,
    entry: &AgentEntry,
    window: &ContextWindow,
) -> String {
    let now = now_ms();
    let ocr_cap = window.richness.max_ocr_chars;
    let transcript_cap = window.richness.max_transcript_chars;

    let mut out = String::new();
    out.push_str(&format!(
        "[sinain-hud live context — tick #{}]\n\n",
        entry.id
    ));

    out.push_str("## Digest\n");
    out.push_str(&entry.digest);
    out.push_str("\n\n");

    out.push_str("## Active Context\n");
    out.push_str(&format!("App: {}\n", window.current_app));
    if !window.app_history.is_empty() {
        out.push_str(&format!(
            "History: {}\n",
            window.app_history_names().join(" → ")
        ));
    }
    out.push('\n');

    let error_events: Vec<_> = window
        .screen
        .iter()
        .filter(|e| score::contains_error_marker(&e.ocr))
        .collect();
    if !error_events.is_empty() {
        out.push_str("## Errors (high priority)\n");
        for event in &error_events {
            out.push_str("```\n");
            out.push_str(&truncate_chars(&event.ocr, ocr_cap));
            out.push_str("\n```\n");
        }
        out.push('\n');
    }

    if !window.screen.is_empty() {
        out.push_str("## Screen (recent OCR)\n");
        for event in &window.screen {
            out.push_str(&format!(
                "- [{}] [{}] {}\n",
                age_label(now, event.ts),
                crate::context::appname::normalize(&event.meta.app),
                truncate_chars(&single_line(&event.ocr), ocr_cap)
            ));
        }
        out.push('\n');
    }

    if !window.audio.is_empty() {
        out.push_str("## Audio (recent transcripts)\n");
        for item in &window.audio {
            out.push_str(&format!(
                "- [{}] \"{}\"\n",
                age_label(now, item.ts),
                truncate_chars(&single_line(&item.text), transcript_cap)
            ));
        }
        out.push('\n');
    }

    match mode {
        EscalationMode::Focus | EscalationMode::Rich => {
            out.push_str(
                "Reply with concrete guidance for this situation. \
                 Do not answer NO_REPLY — a response is required.\n",
            );
        }
        _ => {
            out.push_str(
                "If you have something genuinely useful to add, reply in 2-5 \
                 sentences, actionable when relevant. Otherwise keep it brief.\n",
            );
        }
    }
    out.push_str("\nRespond naturally — this will appear on the user's HUD overlay.\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_domain::entry::{AgentEntry, ContextStats};
    use sn_domain::feed::{FeedChannel, FeedItem, FeedPriority, FeedSource};
    use sn_domain::richness;
    use sn_domain::sense::{SenseEvent, SenseKind, SenseMeta};

    use crate::context::AppTransition;

    fn entry(digest: &str) -> AgentEntry {
        AgentEntry {
            id: 7,
            ts: 0,
            model: "gpt-4o-mini".into(),
            latency_ms: 10,
            tokens_in: 100,
            tokens_out: 20,
            parsed_ok: true,
            hud: "Debugging tests".into(),
            digest: digest.into(),
            context_freshness_ms: 0,
            context: ContextStats::default(),
        }
    }

    fn screen_event(ocr: &str) -> SenseEvent {
        SenseEvent {
            id: 1,
            ts: now_ms() - 5_000,
            received_at: now_ms(),
            kind: SenseKind::Text,
            ocr: ocr.into(),
            meta: SenseMeta {
                app: "code".into(),
                window_title: None,
                screen: 0,
                ssim: 1.0,
            },
            roi: None,
            diff: None,
        }
    }

    fn window_with(screen: Vec<SenseEvent>, audio: Vec<FeedItem>) -> ContextWindow {
        ContextWindow {
            screen,
            audio,
            newest_event_ts: 0,
            current_app: "VS Code".into(),
            app_history: vec![
                AppTransition { app: "Chrome".into(), ts: 1 },
                AppTransition { app: "VS Code".into(), ts: 2 },
            ],
            richness: richness::STANDARD,
        }
    }

    #[test]
    fn header_names_the_tick() {
        let w = window_with(vec![], vec![]);
        let msg = build_escalation_message(EscalationMode::Selective, &entry("d"), &w);
        assert!(msg.starts_with("[sinain-hud live context — tick #7]"));
        assert!(msg.contains("## Digest\nd\n"));
        assert!(msg.contains("App: VS Code"));
        assert!(msg.contains("History: Chrome → VS Code"));
    }

    #[test]
    fn error_ocr_gets_a_fenced_block() {
        let w = window_with(
            vec![
                screen_event("TypeError: cannot read 'x' of undefined"),
                screen_event("all quiet here"),
            ],
            vec![],
        );
        let msg = build_escalation_message(EscalationMode::Selective, &entry("d"), &w);
        assert!(msg.contains("## Errors (high priority)"));
        assert!(msg.contains("```\nTypeError: cannot read 'x' of undefined\n```"));
        // The quiet event appears only in the Screen section.
        let errors_section = msg
            .split("## Screen")
            .next()
            .expect("sections");
        assert!(!errors_section.contains("all quiet here"));
    }

    #[test]
    fn focus_forbids_no_reply_selective_does_not() {
        let w = window_with(vec![], vec![]);
        let focus = build_escalation_message(EscalationMode::Focus, &entry("d"), &w);
        assert!(focus.contains("NO_REPLY"));
        let selective = build_escalation_message(EscalationMode::Selective, &entry("d"), &w);
        assert!(!selective.contains("NO_REPLY"));
        assert!(selective.contains("2-5"));
    }

    #[test]
    fn sections_for_empty_slices_are_omitted() {
        let w = window_with(vec![], vec![]);
        let msg = build_escalation_message(EscalationMode::Selective, &entry("d"), &w);
        assert!(!msg.contains("## Screen"));
        assert!(!msg.contains("## Audio"));
        assert!(!msg.contains("## Errors"));
        assert!(msg.ends_with("Respond naturally — this will appear on the user's HUD overlay.\n"));
    }

    #[test]
    fn audio_lines_are_quoted_and_capped() {
        let audio = FeedItem {
            id: 1,
            ts: now_ms() - 3_000,
            source: FeedSource::Audio,
            channel: FeedChannel::Stream,
            priority: FeedPriority::Normal,
            text: "line one\nline two".into(),
        };
        let w = window_with(vec![], vec![audio]);
        let msg = build_escalation_message(EscalationMode::Selective, &entry("d"), &w);
        assert!(msg.contains("\"line one line two\""));
    }
}
