//! Typed in-process event bus
//!
//! Decoupled notifications so UI components can observe orchestrator
//! state without polling the registry. Built on a broadcast channel; a
//! lagged subscriber skips messages, it never blocks the publisher.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::task::{KillChainPhase, TaskId, TaskStatus};
use crate::topology::{DeviceId, DeviceStatus};

/// Default buffered capacity per subscriber.
const BUS_CAPACITY: usize = 256;

/// A typed bus event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BusEvent {
    /// Task state advanced (status, phase or progress changed).
    AttackProgress {
        task_id: TaskId,
        status: TaskStatus,
        phase: KillChainPhase,
        progress: u8,
    },

    /// Task reached a terminal state.
    AttackCompleted {
        task_id: TaskId,
        success: bool,
        /// Result payload on success
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        /// Error text on failure
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A device's status was changed by the orchestrator.
    DeviceStatusChanged {
        device_id: DeviceId,
        status: DeviceStatus,
    },
}

/// Publish/subscribe handle for [`BusEvent`]s.
///
/// Cloning shares the underlying channel; publishing with no live
/// subscribers is fine and simply drops the event.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Creates a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    pub fn publish(&self, event: BusEvent) {
        // A send error only means nobody is listening right now.
        let _ = self.sender.send(event);
    }

    /// Subscribes to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Subscribes as a `Stream`, for UI consumers that select over
    /// several sources. Lag errors surface as stream items.
    #[must_use]
    pub fn stream(&self) -> tokio_stream::wrappers::BroadcastStream<BusEvent> {
        tokio_stream::wrappers::BroadcastStream::new(self.subscribe())
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
