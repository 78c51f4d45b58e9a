//! Shared integration-test harness: a full in-process stack with an
//! accounting renderer, an unreachable backend, and a scripted push
//! channel.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rangeview::backend::{BackendClient, PushFrames, StatusFrame};
use rangeview::bus::EventBus;
use rangeview::effects::{EffectScheduler, NullRenderer, Renderer};
use rangeview::orchestrator::{AttackOrchestrator, OrchestratorTiming};
use rangeview::task::{AttackTaskRegistry, TaskId, TaskPayload, TaskStatus, TaskUpdate};
use rangeview::topology::{
    ConnectionMedium, DeviceCategory, DeviceId, DeviceSpec, Position, TopologyGraph,
};

/// Fully wired in-process stack.
pub struct TestStack {
    pub graph: Arc<RwLock<TopologyGraph>>,
    pub renderer: Arc<NullRenderer>,
    pub scheduler: Arc<EffectScheduler>,
    pub registry: Arc<AttackTaskRegistry>,
    pub bus: EventBus,
    pub orchestrator: Arc<AttackOrchestrator>,
}

/// Builds the standard four-device range:
/// kali — fw-1 (no address) — web — db-server.
pub fn stack() -> TestStack {
    let mut graph = TopologyGraph::new();
    for (id, name, category, address, x) in [
        ("kali", "Attacker", DeviceCategory::Workstation, Some("199.203.100.5"), 0.0),
        ("fw-1", "Edge Firewall", DeviceCategory::Firewall, None, 200.0),
        ("web", "Web Server", DeviceCategory::Web, Some("172.16.100.10"), 400.0),
        ("db-server", "DB Server", DeviceCategory::Database, Some("192.168.214.7"), 600.0),
    ] {
        graph
            .add_device(DeviceSpec {
                id: DeviceId::from(id),
                name: name.to_string(),
                category,
                address: address.map(String::from),
                position: Position::new(x, 100.0),
            })
            .unwrap();
    }
    for (a, b) in [("kali", "fw-1"), ("fw-1", "web"), ("web", "db-server")] {
        graph
            .add_connection(
                &DeviceId::from(a),
                &DeviceId::from(b),
                ConnectionMedium::Wired,
            )
            .unwrap();
    }

    let graph = Arc::new(RwLock::new(graph));
    let renderer = Arc::new(NullRenderer::new());
    let scheduler = Arc::new(EffectScheduler::new(
        Arc::clone(&renderer) as Arc<dyn Renderer>
    ));
    let registry = Arc::new(AttackTaskRegistry::new());
    let bus = EventBus::new();
    // Port 9 (discard) refuses connections; backend calls fail fast.
    let backend = BackendClient::new("http://127.0.0.1:9", Duration::from_secs(2));

    let orchestrator = Arc::new(AttackOrchestrator::new(
        Arc::clone(&graph),
        Arc::clone(&registry),
        Arc::clone(&scheduler),
        backend,
        bus.clone(),
        OrchestratorTiming {
            scan_interval: Duration::from_millis(500),
            traffic_interval: Duration::from_millis(200),
            poll_interval: Duration::from_millis(100),
        },
    ));

    TestStack {
        graph,
        renderer,
        scheduler,
        registry,
        bus,
        orchestrator,
    }
}

/// Creates a running task targeting db-server from kali, bypassing the
/// backend submission path.
pub fn running_task(stack: &TestStack) -> TaskId {
    let task_id = stack.registry.create_task(TaskPayload {
        attacker: Some(DeviceId::from("kali")),
        target: Some(DeviceId::from("db-server")),
        attack_type: "auto".to_string(),
        target_host: None,
    });
    stack
        .registry
        .update(task_id, TaskUpdate::status(TaskStatus::Running));
    task_id
}

/// Bare frame with only the task id set.
pub fn frame(task_id: TaskId) -> StatusFrame {
    serde_json::from_value(serde_json::json!({ "taskId": task_id })).unwrap()
}

/// Push channel that replays a fixed script, then ends.
pub struct ScriptedChannel {
    frames: VecDeque<StatusFrame>,
}

impl ScriptedChannel {
    pub fn new(frames: Vec<StatusFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

#[async_trait::async_trait]
impl PushFrames for ScriptedChannel {
    async fn next_frame(&mut self) -> Option<StatusFrame> {
        self.frames.pop_front()
    }
}

/// Yields enough times for spawned sequences to settle.
pub async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

/// Advances the paused clock by `total` in small increments, letting
/// spawned tasks make progress between steps. A single `advance` jump only
/// fires one generation of timers, so re-arming timed sequences need the
/// clock stepped forward for each tick to elapse.
pub async fn advance_stepped(total: Duration) {
    let step = Duration::from_millis(25);
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        let next = step.min(total - elapsed);
        tokio::time::advance(next).await;
        elapsed += next;
        tokio::task::yield_now().await;
    }
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}
