//! Attack task lifecycle
//!
//! Task records, kill-chain phase ordering, and the registry that owns
//! them. The registry is deliberately permissive about field merges;
//! lifecycle invariants are enforced at the orchestrator boundary.

pub mod registry;
pub mod types;

pub use registry::AttackTaskRegistry;
pub use types::{
    KillChainPhase, LogEntry, LogLevel, Task, TaskId, TaskPayload, TaskStatus, TaskUpdate,
};
