//! Attack backend plumbing
//!
//! HTTP client for the attack and topology lifecycle APIs, and the
//! push channel that delivers task status frames. The orchestrator is
//! transport-agnostic: it consumes [`PushFrames`], not a socket.

pub mod client;
pub mod push;

pub use client::{BackendClient, TopologyAction, TopologyReport};
pub use push::{FrameLog, PushFrames, StatusFrame, StepStatus, WsPushChannel};
