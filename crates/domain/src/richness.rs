//! Richness presets — bounds on how much raw context goes into prompts and
//! escalation messages.

use serde::{Deserialize, Serialize};

use crate::config::RichnessLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichnessPreset {
    pub max_screen_events: usize,
    pub max_audio_entries: usize,
    pub max_ocr_chars: usize,
    pub max_transcript_chars: usize,
}

pub const LEAN: RichnessPreset = RichnessPreset {
    max_screen_events: 3,
    max_audio_entries: 5,
    max_ocr_chars: 400,
    max_transcript_chars: 200,
};

pub const STANDARD: RichnessPreset = RichnessPreset {
    max_screen_events: 8,
    max_audio_entries: 12,
    max_ocr_chars: 1_500,
    max_transcript_chars: 500,
};

pub const RICH: RichnessPreset = RichnessPreset {
    max_screen_events: 20,
    max_audio_entries: 30,
    max_ocr_chars: 4_000,
    max_transcript_chars: 1_500,
};

impl RichnessPreset {
    pub fn for_level(level: RichnessLevel) -> RichnessPreset {
        match level {
            RichnessLevel::Lean => LEAN,
            RichnessLevel::Standard => STANDARD,
            RichnessLevel::Rich => RICH,
        }
    }

    pub fn name(&self) -> &'static str {
        if *self == LEAN {
            "lean"
        } else if *self == RICH {
            "rich"
        } else {
            "standard"
        }
    }
}
