//! Small text helpers shared by the prompt and escalation message builders.

/// `"12s ago"`-style age label from two epoch-millisecond stamps.
pub fn age_label(now_ms: i64, ts: i64) -> String {
    let secs = ((now_ms - ts).max(0) + 500) / 1_000;
    format!("{secs}s ago")
}

/// Collapse all whitespace runs (including newlines) into single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_label_rounds_to_seconds() {
        assert_eq!(age_label(10_000, 8_000), "2s ago");
        assert_eq!(age_label(10_000, 9_600), "0s ago");
        assert_eq!(age_label(10_000, 9_400), "1s ago");
        // A future-dated event clamps to zero.
        assert_eq!(age_label(10_000, 20_000), "0s ago");
    }

    #[test]
    fn single_line_collapses_newlines() {
        assert_eq!(single_line("a\nb\t c\n\nd"), "a b c d");
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 3), "hél");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }
}
