//! Situation snapshot file.
//!
//! A markdown file other processes poll for the latest picture of what the
//! user is doing. Written atomically: content goes to a `.tmp` sibling which
//! is then renamed over the target, so a reader never observes a partial
//! file. Consumers key on the first line being exactly `# Situation`.

use std::path::Path;

use sn_domain::entry::AgentEntry;
use sn_domain::error::Result;
use sn_domain::now_ms;

use crate::context::ContextWindow;
use crate::util::{age_label, single_line, truncate_chars};

/// Per-line cap for OCR and transcript excerpts.
const LINE_CAP: usize = 500;

/// Render the snapshot document.
pub fn build_situation_text(entry: &AgentEntry, window: &ContextWindow) -> String {
    let now = now_ms();
    let mut out = String::new();

    out.push_str("# Situation\n");
    out.push_str(&format!(
        "Updated {} | Tick #{} | Model {}\n\n",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        entry.id,
        entry.model,
    ));

    out.push_str("## Digest\n");
    out.push_str(&entry.digest);
    out.push_str("\n\n");

    out.push_str("## Active Application\n");
    out.push_str(&window.current_app);
    out.push_str("\n\n");

    if !window.app_history.is_empty() {
        out.push_str("## App History\n");
        out.push_str(&window.app_history_names().join(" → "));
        out.push_str("\n\n");
    }

    if !window.screen.is_empty() {
        out.push_str("## Screen (OCR)\n");
        for event in &window.screen {
            out.push_str(&format!(
                "- [{}] [{}] {}\n",
                age_label(now, event.ts),
                crate::context::appname::normalize(&event.meta.app),
                truncate_chars(&single_line(&event.ocr), LINE_CAP)
            ));
        }
        out.push('\n');
    }

    if !window.audio.is_empty() {
        out.push_str("## Audio Transcripts\n");
        for item in &window.audio {
            out.push_str(&format!(
                "- [{}] {}\n",
                age_label(now, item.ts),
                truncate_chars(&single_line(&item.text), LINE_CAP)
            ));
        }
        out.push('\n');
    }

    out.push_str("## Metadata\n");
    out.push_str(&format!("Screen events: {}\n", window.screen.len()));
    out.push_str(&format!("Audio entries: {}\n", window.audio.len()));
    out.push_str(&format!("App switches: {}\n", window.app_history.len()));
    out.push_str(&format!("Parsed OK: {}\n", entry.parsed_ok));

    out
}

/// Write the snapshot atomically: `.tmp` then rename. On any failure the
/// `.tmp` sibling is removed best-effort so it is never left observable.
pub fn write_situation(path: &Path, entry: &AgentEntry, window: &ContextWindow) -> Result<()> {
    let text = build_situation_text(entry, window);
    let tmp = path.with_extension("md.tmp");

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let result = std::fs::write(&tmp, &text).and_then(|_| std::fs::rename(&tmp, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_domain::entry::{AgentEntry, ContextStats};
    use sn_domain::richness;

    fn entry() -> AgentEntry {
        AgentEntry {
            id: 3,
            ts: 0,
            model: "gpt-4o-mini".into(),
            latency_ms: 10,
            tokens_in: 1,
            tokens_out: 1,
            parsed_ok: true,
            hud: "Writing docs".into(),
            digest: "The user is editing documentation.".into(),
            context_freshness_ms: 0,
            context: ContextStats::default(),
        }
    }

    fn window() -> ContextWindow {
        ContextWindow {
            screen: Vec::new(),
            audio: Vec::new(),
            newest_event_ts: 0,
            current_app: "VS Code".into(),
            app_history: Vec::new(),
            richness: richness::STANDARD,
        }
    }

    #[test]
    fn first_line_is_the_header() {
        let text = build_situation_text(&entry(), &window());
        assert_eq!(text.lines().next(), Some("# Situation"));
        assert!(text.contains("## Digest"));
        assert!(text.contains("## Active Application\nVS Code"));
        assert!(text.contains("Parsed OK: true"));
        // Empty optional sections are omitted.
        assert!(!text.contains("## App History"));
        assert!(!text.contains("## Screen (OCR)"));
    }

    #[test]
    fn write_is_atomic_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("situation.md");
        write_situation(&path, &entry(), &window()).expect("write");

        let content = std::fs::read_to_string(&path).expect("read back");
        assert!(content.starts_with("# Situation"));
        assert!(!dir.path().join("situation.md.tmp").exists());

        // Overwrite works and still leaves no tmp.
        write_situation(&path, &entry(), &window()).expect("rewrite");
        assert!(!dir.path().join("situation.md.tmp").exists());
    }

    #[test]
    fn failed_write_cleans_up_tmp() {
        let err = write_situation(Path::new("/dev/null/nope/situation.md"), &entry(), &window());
        assert!(err.is_err());
    }
}
