//! Deterministic escalation scoring and the mode-aware decision gate.
//!
//! Scoring is additive over four signal categories; each category
//! contributes at most once. The gate is a pure function of the mode,
//! clock, cooldown, HUD, digest, and score.

use sn_domain::config::EscalationMode;

use crate::context::ContextWindow;

pub const ESCALATION_THRESHOLD: u32 = 3;

const ERROR_MARKERS: &[&str] = &[
    "error",
    "failed",
    "failure",
    "exception",
    "crash",
    "traceback",
    "typeerror",
    "referenceerror",
    "syntaxerror",
    "cannot read",
    "undefined is not",
    "exit code",
    "segfault",
    "panic",
    "fatal",
    "enoent",
];

const HELP_MARKERS: &[&str] = &[
    "how do i",
    "how to",
    "what if",
    "why is",
    "help me",
    "not working",
    "stuck",
    "confused",
    "any ideas",
    "suggestions",
];

const CODE_ISSUE_MARKERS: &[&str] = &["todo", "fixme", "hack", "workaround", "deprecated"];

const APP_CHURN_MIN: usize = 4;

/// True when the text contains any member of the fixed error word-set.
/// Shared with the escalation message builder for its Errors section.
pub fn contains_error_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    ERROR_MARKERS.iter().any(|m| lower.contains(m))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub total: u32,
    pub reasons: Vec<String>,
}

/// Score a digest against its context window.
pub fn calculate_escalation_score(digest: &str, window: &ContextWindow) -> ScoreBreakdown {
    let mut total = 0;
    let mut reasons = Vec::new();
    let digest_lower = digest.to_lowercase();

    if ERROR_MARKERS.iter().any(|m| digest_lower.contains(m)) {
        total += 3;
        reasons.push("error signal in digest".to_string());
    }

    let asked_for_help = window.audio.iter().any(|item| {
        let lower = item.text.to_lowercase();
        HELP_MARKERS.iter().any(|m| lower.contains(m))
    });
    if asked_for_help {
        total += 2;
        reasons.push("question or help request in audio".to_string());
    }

    if CODE_ISSUE_MARKERS.iter().any(|m| digest_lower.contains(m)) {
        total += 1;
        reasons.push("code issue marker in digest".to_string());
    }

    if window.app_history.len() >= APP_CHURN_MIN {
        total += 1;
        reasons.push(format!("app churn ({} switches)", window.app_history.len()));
    }

    ScoreBreakdown { total, reasons }
}

/// Inputs to the decision gate beyond the tick itself.
#[derive(Debug, Clone)]
pub struct GateState<'a> {
    pub mode: EscalationMode,
    pub now_ms: i64,
    pub last_escalation_ts: i64,
    pub cooldown_ms: i64,
    pub last_escalated_digest: Option<&'a str>,
}

/// The pure decision gate.
pub fn should_escalate(gate: &GateState<'_>, hud: &str, digest: &str, score_total: u32) -> bool {
    if gate.mode == EscalationMode::Off {
        return false;
    }
    if gate.now_ms - gate.last_escalation_ts < gate.cooldown_ms {
        return false;
    }
    if hud == "Idle" || hud == "—" {
        return false;
    }
    if gate.mode.always_escalates() {
        return true;
    }
    // Selective: exact-equality dedup against the last escalated digest,
    // then the score threshold.
    if gate.last_escalated_digest == Some(digest) {
        return false;
    }
    score_total >= ESCALATION_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_domain::feed::{FeedChannel, FeedItem, FeedPriority, FeedSource};
    use sn_domain::richness;

    use crate::context::AppTransition;

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

    fn audio(text: &str) -> FeedItem {
        FeedItem {
            id: 1,
            ts: 0,
            source: FeedSource::Audio,
            channel: FeedChannel::Stream,
            priority: FeedPriority::Normal,
            text: text.into(),
        }
    }

    #[test]
    fn score_is_deterministic() {
        let w = window();
        let digest = "A TypeError crashed the build. TODO left in the handler.";
        let a = calculate_escalation_score(digest, &w);
        let b = calculate_escalation_score(digest, &w);
        assert_eq!(a, b);
        // error (+3) + code issue (+1)
        assert_eq!(a.total, 4);
        assert_eq!(a.reasons.len(), 2);
    }

    #[test]
    fn each_category_counts_once() {
        let w = window();
        let digest = "error error failed crash panic fatal";
        assert_eq!(calculate_escalation_score(digest, &w).total, 3);
    }

    #[test]
    fn help_markers_come_from_audio_not_digest() {
        let mut w = window();
        assert_eq!(calculate_escalation_score("how do i fix this", &w).total, 0);
        w.audio.push(audio("how do I get this test passing?"));
        assert_eq!(calculate_escalation_score("quiet digest", &w).total, 2);
    }

    #[test]
    fn app_churn_needs_four_entries() {
        let mut w = window();
        for (i, app) in ["a", "b", "c"].iter().enumerate() {
            w.app_history.push(AppTransition {
                app: (*app).into(),
                ts: i as i64,
            });
        }
        assert_eq!(calculate_escalation_score("calm", &w).total, 0);
        w.app_history.push(AppTransition { app: "d".into(), ts: 4 });
        assert_eq!(calculate_escalation_score("calm", &w).total, 1);
    }

    #[test]
    fn error_scenario_reaches_threshold() {
        let w = window();
        let digest = "The screen shows TypeError: cannot read 'x' of undefined in the console.";
        let score = calculate_escalation_score(digest, &w);
        assert!(score.total >= ESCALATION_THRESHOLD);
    }

    // ── Gate ───────────────────────────────────────────────────────

    fn gate(mode: EscalationMode) -> GateState<'static> {
        GateState {
            mode,
            now_ms: 1_000_000,
            last_escalation_ts: 0,
            cooldown_ms: 90_000,
            last_escalated_digest: None,
        }
    }

    #[test]
    fn off_never_escalates() {
        let g = gate(EscalationMode::Off);
        assert!(!should_escalate(&g, "Busy", "error crash panic", 99));
    }

    #[test]
    fn cooldown_blocks_everything() {
        let mut g = gate(EscalationMode::Focus);
        g.last_escalation_ts = g.now_ms - 10;
        assert!(!should_escalate(&g, "Busy", "digest", 99));
    }

    #[test]
    fn idle_hud_blocks() {
        let g = gate(EscalationMode::Focus);
        assert!(!should_escalate(&g, "Idle", "digest", 99));
        assert!(!should_escalate(&g, "—", "digest", 99));
    }

    #[test]
    fn focus_ignores_score_and_dedup() {
        let mut g = gate(EscalationMode::Focus);
        g.last_escalated_digest = Some("same digest");
        assert!(should_escalate(&g, "Busy", "same digest", 0));
    }

    #[test]
    fn selective_dedups_exact_digest() {
        let mut g = gate(EscalationMode::Selective);
        g.last_escalated_digest = Some("the same digest");
        assert!(!should_escalate(&g, "Busy", "the same digest", 99));
        // A different digest with enough score goes through.
        assert!(should_escalate(&g, "Busy", "a new digest", 3));
    }

    #[test]
    fn selective_requires_threshold() {
        let g = gate(EscalationMode::Selective);
        assert!(!should_escalate(&g, "Busy", "digest", 2));
        assert!(should_escalate(&g, "Busy", "digest", 3));
    }
}
