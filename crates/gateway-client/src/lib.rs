//! Assistant-gateway access: the persistent challenge-response RPC socket
//! and the fire-and-forget HTTP hook fallback.
//!
//! The orchestrator owns a [`GatewayClient`]; inbound pushes (assistant feed
//! items, spawn-task lifecycle updates) flow back through a callback rather
//! than a back-pointer, keeping the dependency one-way.

pub mod client;
pub mod hook;

pub use client::{GatewayClient, GatewayEvent};
pub use hook::HookClient;
