//! Task record types
//!
//! A [`Task`] tracks one attack from submission through the kill chain
//! to a terminal result, accumulating an append-only log stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::topology::DeviceId;

/// Newtype wrapper for task ids.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Allocates a fresh task id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task status. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet submitted to the backend
    Pending,
    /// Submitted; phase and progress advance while here
    Running,
    /// Finished with a result payload
    Completed,
    /// Finished with an error payload
    Failed,
}

impl TaskStatus {
    /// Whether this status permits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving to `next` is a forward transition.
    ///
    /// The order is pending → running → terminal; a terminal status
    /// admits nothing, and equal status is not an advance.
    #[must_use]
    pub fn admits(self, next: Self) -> bool {
        !self.is_terminal() && next > self
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Ordered kill-chain stage.
///
/// Derived ordering follows declaration order, which is the intrusion
/// order; phase must be non-decreasing while a task runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum KillChainPhase {
    #[default]
    Reconnaissance,
    Weaponization,
    Delivery,
    Exploitation,
    Installation,
    CommandAndControl,
    ActionsOnObjectives,
}

impl KillChainPhase {
    /// All phases in kill-chain order.
    pub const ALL: [Self; 7] = [
        Self::Reconnaissance,
        Self::Weaponization,
        Self::Delivery,
        Self::Exploitation,
        Self::Installation,
        Self::CommandAndControl,
        Self::ActionsOnObjectives,
    ];

    /// Stable snake_case name, matching the wire format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reconnaissance => "reconnaissance",
            Self::Weaponization => "weaponization",
            Self::Delivery => "delivery",
            Self::Exploitation => "exploitation",
            Self::Installation => "installation",
            Self::CommandAndControl => "command_and_control",
            Self::ActionsOnObjectives => "actions_on_objectives",
        }
    }
}

impl std::fmt::Display for KillChainPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log entry severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
    Debug,
}

/// One line of the append-only task log stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Severity
    pub level: LogLevel,
    /// Origin label (e.g. `attack-agent`, `system`)
    pub source: String,
    /// Free-text message
    pub message: String,
    /// When the entry was appended
    pub timestamp: DateTime<Utc>,
}

/// What an attack task was asked to do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Attacking device, if one was marked on the diagram
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attacker: Option<DeviceId>,
    /// Target device, if one was marked on the diagram
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<DeviceId>,
    /// Attack type code forwarded to the backend (`auto`, `port_scan`, ...)
    pub attack_type: String,
    /// Target host URL the backend should aim at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_host: Option<String>,
}

/// Partial update applied by [`AttackTaskRegistry::update`](super::AttackTaskRegistry::update).
///
/// The registry merges these as given and does not clamp; callers own
/// the monotonicity invariant.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub phase: Option<KillChainPhase>,
    pub progress: Option<u8>,
}

impl TaskUpdate {
    /// Update that only moves the status.
    #[must_use]
    pub const fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            phase: None,
            progress: None,
        }
    }
}

/// One attack task record.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    /// Stable id
    pub id: TaskId,
    /// What was asked
    pub payload: TaskPayload,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Current kill-chain phase
    pub phase: KillChainPhase,
    /// Progress in [0, 100]
    pub progress: u8,
    /// Append-only log stream
    pub logs: Vec<LogEntry>,
    /// Result payload, set on completion
    pub result: Option<serde_json::Value>,
    /// Error text, set on failure
    pub error: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub(crate) fn new(id: TaskId, payload: TaskPayload) -> Self {
        let now = Utc::now();
        Self {
            id,
            payload,
            status: TaskStatus::Pending,
            phase: KillChainPhase::Reconnaissance,
            progress: 0,
            logs: Vec::new(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
