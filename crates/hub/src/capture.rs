//! Capture-collaborator state.
//!
//! Audio/screen capture and device selection run in external processes; the
//! hub only tracks the toggles the overlay flips and reflects them in
//! status broadcasts.

use std::sync::atomic::{AtomicBool, Ordering};

use sn_protocol::overlay::{AudioState, ScreenState};

pub struct CaptureState {
    audio_active: AtomicBool,
    screen_active: AtomicBool,
    alternate_device: AtomicBool,
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureState {
    pub fn new() -> Self {
        Self {
            audio_active: AtomicBool::new(true),
            screen_active: AtomicBool::new(true),
            alternate_device: AtomicBool::new(false),
        }
    }

    /// Flip audio capture; returns the new active state.
    pub fn toggle_audio(&self) -> bool {
        !self.audio_active.fetch_xor(true, Ordering::SeqCst)
    }

    /// Flip screen capture; returns the new active state.
    pub fn toggle_screen(&self) -> bool {
        !self.screen_active.fetch_xor(true, Ordering::SeqCst)
    }

    /// Rotate between the primary and alternate audio device; returns
    /// `true` when the alternate is now selected.
    pub fn switch_device(&self) -> bool {
        !self.alternate_device.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn audio_state(&self) -> AudioState {
        if self.audio_active.load(Ordering::SeqCst) {
            AudioState::Active
        } else {
            AudioState::Muted
        }
    }

    pub fn screen_state(&self) -> ScreenState {
        if self.screen_active.load(Ordering::SeqCst) {
            ScreenState::Active
        } else {
            ScreenState::Off
        }
    }
}
