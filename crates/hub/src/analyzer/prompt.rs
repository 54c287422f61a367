//! Tick prompt construction.
//!
//! Fixed structure: activity intro, active app, app chain, newest-first
//! screen OCR lines, newest-first audio lines, then strict JSON output
//! instructions. Per-event text is capped by the richness preset and
//! newlines are collapsed so each event stays on one line.

use sn_domain::now_ms;

use crate::context::ContextWindow;
use crate::util::{age_label, single_line, truncate_chars};

pub fn build_prompt(window: &ContextWindow) -> String {
    let now = now_ms();
    let mut out = String::new();

    out.push_str(
        "You are watching one user's desktop activity through screen OCR and \
         audio transcripts. Summarize what is happening right now.\n\n",
    );

    out.push_str(&format!("Active app: {}\n", window.current_app));
    if !window.app_history.is_empty() {
        out.push_str(&format!(
            "App chain: {}\n",
            window.app_history_names().join(" → ")
        ));
    }
    out.push('\n');

    if window.screen.is_empty() {
        out.push_str("Screen: no recent capture.\n");
    } else {
        out.push_str("Screen (newest first):\n");
        for event in &window.screen {
            out.push_str(&format!(
                "- [{}] [{}] {}\n",
                age_label(now, event.ts),
                crate::context::appname::normalize(&event.meta.app),
                truncate_chars(&single_line(&event.ocr), window.richness.max_ocr_chars)
            ));
        }
    }
    out.push('\n');

    if window.audio.is_empty() {
        out.push_str("Audio: no recent transcripts.\n");
    } else {
        out.push_str("Audio (newest first):\n");
        for item in &window.audio {
            out.push_str(&format!(
                "- [{}] \"{}\"\n",
                age_label(now, item.ts),
                truncate_chars(
                    &single_line(&item.text),
                    window.richness.max_transcript_chars
                )
            ));
        }
    }
    out.push('\n');

    out.push_str(
        "Respond with strict JSON only, no prose and no code fences:\n\
         {\"hud\": \"<current activity in at most 15 words>\", \
         \"digest\": \"<3-5 factual sentences describing the situation>\"}\n\
         If nothing is happening, use \"Idle\" as the hud.\n",
    );

    out
}
