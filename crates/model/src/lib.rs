//! Remote language-model access for the tick engine.
//!
//! One HTTP adapter for any OpenAI-compatible chat-completions endpoint,
//! a fallback chain that walks `[primary, ...fallbacks]` on failure, and
//! the strict-then-lenient parser for the model's HUD/digest output.

pub mod chain;
pub mod client;
pub mod cost;
pub mod parse;

pub use chain::{Attempt, ModelChain};
pub use client::{ChatClient, ChatOutcome, ChatTransport};
pub use parse::{parse_hud_digest, HudDigest};
