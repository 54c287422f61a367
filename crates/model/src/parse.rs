//! HUD/digest output parsing.
//!
//! The model is instructed to answer with strict JSON, but real output may
//! arrive wrapped in a fenced code block, surrounded by prose, or not be
//! JSON at all. Parsing never fails: the last resort treats the raw text as
//! the digest and its first 80 characters as the HUD.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HudDigest {
    pub hud: String,
    pub digest: String,
    pub parsed_ok: bool,
}

#[derive(Deserialize)]
struct RawOutput {
    hud: String,
    digest: String,
}

/// Parse a model response into `{hud, digest}`.
///
/// 1. Strip a fenced-code wrapper, then strict JSON parse.
/// 2. Extract the first `{…}` substring and retry.
/// 3. Fall back to `hud = raw[0..80]`, `digest = raw`, `parsed_ok = false`.
pub fn parse_hud_digest(raw: &str) -> HudDigest {
    let unfenced = strip_fence(raw.trim());

    if let Ok(out) = serde_json::from_str::<RawOutput>(unfenced) {
        return ok(out);
    }

    if let Some(candidate) = extract_braced(unfenced) {
        if let Ok(out) = serde_json::from_str::<RawOutput>(candidate) {
            return ok(out);
        }
    }

    HudDigest {
        hud: truncate_chars(raw.trim(), 80),
        digest: raw.trim().to_string(),
        parsed_ok: false,
    }
}

fn ok(out: RawOutput) -> HudDigest {
    HudDigest {
        hud: out.hud.trim().to_string(),
        digest: out.digest.trim().to_string(),
        parsed_ok: true,
    }
}

/// Remove a ```…``` wrapper (with or without a language tag) if the whole
/// text is one fenced block.
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(stripped) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the language tag line, if any.
    match stripped.split_once('\n') {
        Some((_tag, body)) => body.trim(),
        None => stripped.trim(),
    }
}

/// The substring spanning the first `{` to the last `}`, if both exist.
fn extract_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
