//! Wire protocols: overlay fan-out messages and assistant-gateway RPC frames.
//!
//! Both protocols are JSON objects tagged by `type`. Unknown inbound types
//! are logged and ignored by the receivers, never treated as errors.

pub mod gateway;
pub mod overlay;

pub use gateway::{GatewayFrame, WaitOutcome, WaitPayload};
pub use overlay::{OverlayCommand, OverlayIn, OverlayOut};
