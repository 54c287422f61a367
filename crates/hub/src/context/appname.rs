//! App-name normalization: extension stripping plus a small alias table so
//! the prompt and escalation text show stable human-readable names.

const EXTENSIONS: &[&str] = &[".exe", ".app", ".desktop", ".appimage", ".bin"];

const ALIASES: &[(&str, &str)] = &[
    ("code", "VS Code"),
    ("code-oss", "VS Code"),
    ("vscodium", "VS Code"),
    ("google-chrome", "Chrome"),
    ("chromium", "Chrome"),
    ("chrome", "Chrome"),
    ("firefox", "Firefox"),
    ("gnome-terminal", "Terminal"),
    ("gnome-terminal-server", "Terminal"),
    ("konsole", "Terminal"),
    ("alacritty", "Terminal"),
    ("kitty", "Terminal"),
    ("iterm2", "Terminal"),
    ("slack", "Slack"),
    ("discord", "Discord"),
    ("spotify", "Spotify"),
    ("obsidian", "Obsidian"),
];

/// Normalize a raw capture-reported app name. Unknown names pass through
/// trimmed, minus any stripped extension; empty input becomes `"unknown"`.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "unknown".into();
    }

    let mut stem = trimmed.to_string();
    let lower = trimmed.to_lowercase();
    for ext in EXTENSIONS {
        if lower.ends_with(ext)
            && stem.len() >= ext.len()
            && stem.is_char_boundary(stem.len() - ext.len())
        {
            stem.truncate(stem.len() - ext.len());
            break;
        }
    }

    let key = stem.to_lowercase();
    for (alias, canonical) in ALIASES {
        if key == *alias {
            return (*canonical).into();
        }
    }
    stem
}
