//! Attack orchestration
//!
//! Composes the topology graph, the task registry and the effect
//! scheduler: submits attacks to the backend, applies push-channel
//! frames to task state, and translates phase/technique signals into
//! scheduler effects. Lifecycle invariants (no status regression, one
//! exit from `running`) are enforced here, not in the registry.

pub mod dispatch;
pub mod heuristic;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::backend::{BackendClient, PushFrames, StatusFrame};
use crate::bus::{BusEvent, EventBus};
use crate::effects::{EffectScheduler, producers};
use crate::error::BackendError;
use crate::observability::metrics;
use crate::task::{
    AttackTaskRegistry, KillChainPhase, LogLevel, Task, TaskId, TaskPayload, TaskStatus,
    TaskUpdate,
};
use crate::topology::{DeviceId, DeviceStatus, Position, TopologyGraph};

use dispatch::EffectDirective;

/// Timing knobs for dispatched effects and the polling fallback.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorTiming {
    /// Gap between repeated scan pulses
    pub scan_interval: Duration,
    /// Gap between background traffic packets
    pub traffic_interval: Duration,
    /// Polling fallback cadence
    pub poll_interval: Duration,
}

impl Default for OrchestratorTiming {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(3000),
            traffic_interval: Duration::from_millis(800),
            poll_interval: Duration::from_millis(2000),
        }
    }
}

/// The session-wide orchestrator.
///
/// Constructed once per session and shared by reference; all state it
/// owns is behind concurrent maps or locks, so every method takes
/// `&self`.
pub struct AttackOrchestrator {
    graph: Arc<RwLock<TopologyGraph>>,
    registry: Arc<AttackTaskRegistry>,
    scheduler: Arc<EffectScheduler>,
    backend: BackendClient,
    bus: EventBus,
    timing: OrchestratorTiming,
    /// Continuous effect ids started per task (scan-*, traffic-*),
    /// stopped when the task reaches a terminal state.
    started_effects: DashMap<TaskId, Vec<String>>,
}

impl AttackOrchestrator {
    /// Wires the orchestrator to its collaborators.
    #[must_use]
    pub fn new(
        graph: Arc<RwLock<TopologyGraph>>,
        registry: Arc<AttackTaskRegistry>,
        scheduler: Arc<EffectScheduler>,
        backend: BackendClient,
        bus: EventBus,
        timing: OrchestratorTiming,
    ) -> Self {
        Self {
            graph,
            registry,
            scheduler,
            backend,
            bus,
            timing,
            started_effects: DashMap::new(),
        }
    }

    /// The bus this orchestrator publishes on.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The task registry.
    #[must_use]
    pub fn registry(&self) -> &AttackTaskRegistry {
        &self.registry
    }

    /// Submits a full kill-chain attack.
    ///
    /// The task is created pending, transitioned to running, and the
    /// backend call is spawned. A backend error or timeout always
    /// resolves to `fail_task` plus a log entry — never a hung task.
    pub fn submit(self: &Arc<Self>, payload: TaskPayload) -> TaskId {
        let target_host = payload
            .target_host
            .clone()
            .unwrap_or_else(|| "http://localhost:5001".to_string());
        let attack_type = payload.attack_type.clone();

        let task_id = self.registry.create_task(payload);
        self.registry.add_log(
            task_id,
            LogLevel::Info,
            "attack-agent",
            format!("starting {attack_type} attack against {target_host}"),
        );
        self.registry
            .update(task_id, TaskUpdate::status(TaskStatus::Running));
        metrics::record_task_submitted();
        self.publish_progress(task_id);

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = orchestrator
                .backend
                .execute_full_attack(&target_host, &attack_type)
                .await;
            orchestrator.settle_backend_outcome(task_id, outcome);
        });
        task_id
    }

    /// Submits a social-engineering attack.
    ///
    /// Starts in the weaponization phase: there is nothing to scan, the
    /// lure is built first.
    pub fn submit_social(
        self: &Arc<Self>,
        payload: TaskPayload,
        victim_name: &str,
        company: &str,
    ) -> TaskId {
        let victim_url = payload
            .target_host
            .clone()
            .unwrap_or_else(|| "http://localhost:5001".to_string());
        let victim_name = victim_name.to_string();
        let company = company.to_string();

        let task_id = self.registry.create_task(payload);
        self.registry.add_log(
            task_id,
            LogLevel::Info,
            "attack-agent",
            format!("starting social engineering attack against {victim_url}"),
        );
        self.registry.update(
            task_id,
            TaskUpdate {
                status: Some(TaskStatus::Running),
                phase: Some(KillChainPhase::Weaponization),
                progress: None,
            },
        );
        metrics::record_task_submitted();
        self.publish_progress(task_id);

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = orchestrator
                .backend
                .execute_social_attack(&victim_url, &victim_name, &company)
                .await;
            orchestrator.settle_backend_outcome(task_id, outcome);
        });
        task_id
    }

    /// Applies one push-channel status frame.
    ///
    /// Frames for unknown or already-terminal tasks are ignored.
    /// Regressive status/phase fields are dropped with a warning; the
    /// rest of the frame still applies.
    pub fn apply_frame(&self, frame: &StatusFrame) {
        let Some(task) = self.registry.get_status(frame.task_id) else {
            debug!(task = %frame.task_id, "frame for unknown task ignored");
            return;
        };
        if task.status.is_terminal() {
            debug!(task = %frame.task_id, "frame for terminal task ignored");
            return;
        }

        let update = Self::admissible_update(&task, frame);
        let phase_advanced =
            update.phase.is_some_and(|new_phase| new_phase > task.phase);
        if update.status.is_some() || update.phase.is_some() || update.progress.is_some() {
            self.registry.update(frame.task_id, update);
        }

        if let Some(log) = &frame.log {
            self.registry
                .add_log(frame.task_id, log.level, log.source.clone(), log.message.clone());
        }

        // Terminal signal from the push channel.
        match update.status {
            Some(TaskStatus::Completed) => {
                self.registry
                    .complete_task(frame.task_id, serde_json::json!({ "source": "push" }));
                self.finalize(frame.task_id);
                return;
            }
            Some(TaskStatus::Failed) => {
                let reason = frame
                    .log
                    .as_ref()
                    .map_or_else(|| "reported failed by backend".to_string(), |l| l.message.clone());
                self.registry.fail_task(frame.task_id, reason);
                self.finalize(frame.task_id);
                return;
            }
            _ => {}
        }

        let effective_phase = update.phase.unwrap_or(task.phase);
        self.dispatch_effects(&task, frame, effective_phase, phase_advanced);
        self.publish_progress(frame.task_id);
    }

    /// Drives a task with frames from the push channel until the task
    /// reaches a terminal state or the channel ends.
    ///
    /// Returns the final task snapshot. If the channel ends first
    /// (reconnect budget exhausted), the caller still holds a live task
    /// and should fall back to polling.
    pub async fn drive<P: PushFrames>(&self, channel: &mut P, task_id: TaskId) -> Option<Task> {
        loop {
            if let Some(task) = self.registry.get_status(task_id) {
                if task.status.is_terminal() {
                    return Some(task);
                }
            } else {
                return None;
            }
            match channel.next_frame().await {
                Some(frame) => self.apply_frame(&frame),
                None => return self.registry.get_status(task_id),
            }
        }
    }

    /// Spawns the polling fallback for a task.
    ///
    /// Each iteration re-checks terminal status before arming its next
    /// tick, and polling stops immediately on a terminal status. The
    /// poll never fabricates progress — it only republishes real
    /// registry state.
    pub fn spawn_poll(self: &Arc<Self>, task_id: TaskId) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let interval = self.timing.poll_interval;
        tokio::spawn(async move {
            loop {
                let Some(task) = orchestrator.registry.get_status(task_id) else {
                    break;
                };
                if task.status.is_terminal() {
                    break;
                }
                orchestrator.publish_progress(task_id);

                // Re-check before arming the next tick: the task may have
                // settled while we were publishing.
                let still_running = orchestrator
                    .registry
                    .get_status(task_id)
                    .is_some_and(|t| !t.status.is_terminal());
                if !still_running {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        })
    }

    /// Restores a device to `normal` and clears its status glow.
    ///
    /// This is the only automatic-revert path; task completion leaves
    /// device statuses as last set.
    pub fn remediate(&self, device: &DeviceId) {
        let changed = self
            .graph
            .write()
            .map(|mut graph| graph.set_status(device, DeviceStatus::Normal))
            .unwrap_or(false);
        self.scheduler.stop_named(&format!("status-{device}"));
        if changed {
            info!(device = %device, "device remediated");
            self.bus.publish(BusEvent::DeviceStatusChanged {
                device_id: device.clone(),
                status: DeviceStatus::Normal,
            });
        }
    }

    /// Removes a device from the graph along with every scheduler
    /// effect keyed to it.
    pub fn remove_device(&self, device: &DeviceId) -> bool {
        let removed = self
            .graph
            .write()
            .map(|mut graph| graph.remove_device(device))
            .unwrap_or(false);
        for prefix in ["scan", "status", "traffic"] {
            self.scheduler.stop_named(&format!("{prefix}-{device}"));
        }
        removed
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Drops regressive status/phase fields from a frame, keeping the
    /// admissible remainder.
    fn admissible_update(task: &Task, frame: &StatusFrame) -> TaskUpdate {
        let status = frame.status.and_then(|new_status| {
            if task.status.admits(new_status) {
                Some(new_status)
            } else {
                if new_status < task.status {
                    warn!(
                        task = %task.id,
                        current = %task.status,
                        incoming = %new_status,
                        "dropping regressive status update"
                    );
                    metrics::record_regressive_update();
                }
                None
            }
        });
        let phase = frame.phase.and_then(|new_phase| {
            if new_phase >= task.phase {
                Some(new_phase)
            } else {
                warn!(
                    task = %task.id,
                    current = %task.phase,
                    incoming = %new_phase,
                    "dropping regressive phase update"
                );
                metrics::record_regressive_update();
                None
            }
        });
        TaskUpdate {
            status,
            phase,
            progress: frame.progress,
        }
    }

    /// Maps a frame to scheduler effects and executes them.
    fn dispatch_effects(
        &self,
        task: &Task,
        frame: &StatusFrame,
        phase: KillChainPhase,
        phase_advanced: bool,
    ) {
        let source = self.resolve_device(frame.source_device.as_deref(), task.payload.attacker.as_ref());
        let target = self.resolve_device(frame.target_device.as_deref(), task.payload.target.as_ref());

        let directives = if frame.technique.is_some() || phase_advanced {
            dispatch::effects_for(
                phase,
                frame.technique.as_deref(),
                frame.step,
                source.as_ref(),
                target.as_ref(),
            )
        } else if let Some(log) = &frame.log {
            // No structured signal: best-effort log-text heuristic. This
            // never blocks task progression — no match means a neutral
            // activity blip.
            let kind = heuristic::classify(&log.message);
            heuristic::directives_for(kind, source.as_ref(), target.as_ref())
        } else {
            Vec::new()
        };

        for directive in directives {
            self.execute_directive(task.id, directive);
        }
    }

    /// Resolves a frame's device reference: explicit id first, fuzzy
    /// label as last resort, then the task payload's marked device.
    fn resolve_device(
        &self,
        label: Option<&str>,
        fallback: Option<&DeviceId>,
    ) -> Option<DeviceId> {
        let graph = self.graph.read().ok()?;
        if let Some(label) = label {
            let id = DeviceId::from(label);
            if graph.device(&id).is_some() {
                return Some(id);
            }
            if let Some(resolved) = graph.resolve_fuzzy(label) {
                return Some(resolved);
            }
            debug!(label, "device reference did not resolve, skipping visual");
        }
        fallback.filter(|id| graph.device(id).is_some()).cloned()
    }

    fn position_of(&self, device: &DeviceId) -> Option<Position> {
        self.graph
            .read()
            .ok()
            .and_then(|graph| graph.device(device).map(|d| d.position))
    }

    /// Executes one effect directive. Unknown device references degrade
    /// to a no-op rather than failing the task.
    #[allow(clippy::too_many_lines)]
    fn execute_directive(&self, task_id: TaskId, directive: EffectDirective) {
        match directive {
            EffectDirective::StartScan { target } => {
                let Some(center) = self.position_of(&target) else {
                    return;
                };
                let effect_id = format!("scan-{target}");
                self.scheduler.start_named(
                    effect_id.clone(),
                    producers::continuous_scan(center, self.timing.scan_interval),
                );
                self.remember_effect(task_id, effect_id);
            }
            EffectDirective::StopScan { target } => {
                self.scheduler.stop_named(&format!("scan-{target}"));
            }
            EffectDirective::Pulse { device } => {
                if let Some(center) = self.position_of(&device) {
                    self.scheduler.run_once(producers::scanning_pulse(center));
                }
            }
            EffectDirective::Thinking { device } => {
                if let Some(center) = self.position_of(&device) {
                    self.scheduler.run_once(producers::thinking_indicator(
                        center,
                        Duration::from_secs(2),
                    ));
                }
            }
            EffectDirective::PathTravel { source, target } => {
                let (Some(from), Some(to)) =
                    (self.position_of(&source), self.position_of(&target))
                else {
                    return;
                };
                self.scheduler.run_once(producers::attack_path(from, to));
            }
            EffectDirective::MarkTargeted { target } => {
                self.set_device_status(&target, DeviceStatus::Targeted);
                if let Some(center) = self.position_of(&target) {
                    self.scheduler
                        .start_named(format!("status-{target}"), producers::node_glow(center, 32.0));
                }
            }
            EffectDirective::MarkCompromised { target } => {
                self.set_device_status(&target, DeviceStatus::Compromised);
                if let Some(center) = self.position_of(&target) {
                    self.scheduler.start_named(
                        format!("status-{target}"),
                        producers::compromised_pulse(center, 32.0),
                    );
                }
            }
            EffectDirective::StartTraffic { source, target } => {
                let (Some(from), Some(to)) =
                    (self.position_of(&source), self.position_of(&target))
                else {
                    return;
                };
                let effect_id = format!("traffic-{task_id}");
                self.scheduler.start_named(
                    effect_id.clone(),
                    producers::network_traffic(vec![from, to], self.timing.traffic_interval),
                );
                self.remember_effect(task_id, effect_id);
            }
            EffectDirective::Exfiltrate { source, target } => {
                let (Some(from), Some(to)) =
                    (self.position_of(&target), self.position_of(&source))
                else {
                    return;
                };
                self.scheduler
                    .run_once(producers::data_exfiltration(from, to, 4));
            }
            EffectDirective::SuccessMarker { device } => {
                if let Some(center) = self.position_of(&device) {
                    self.scheduler.run_once(producers::success_marker(center));
                }
            }
            EffectDirective::FailureMarker { device } => {
                if let Some(center) = self.position_of(&device) {
                    self.scheduler.run_once(producers::failure_marker(center));
                }
            }
            EffectDirective::Activity { device } => {
                if let Some(center) = self.position_of(&device) {
                    self.scheduler.run_once(producers::activity_marker(center));
                }
            }
        }
    }

    fn set_device_status(&self, device: &DeviceId, status: DeviceStatus) {
        let changed = self
            .graph
            .write()
            .map(|mut graph| graph.set_status(device, status))
            .unwrap_or(false);
        if changed {
            info!(device = %device, ?status, "device status changed");
            self.bus.publish(BusEvent::DeviceStatusChanged {
                device_id: device.clone(),
                status,
            });
        }
    }

    fn remember_effect(&self, task_id: TaskId, effect_id: String) {
        let mut entry = self.started_effects.entry(task_id).or_default();
        if !entry.contains(&effect_id) {
            entry.push(effect_id);
        }
    }

    /// Settles the backend HTTP outcome into terminal task state.
    fn settle_backend_outcome(
        &self,
        task_id: TaskId,
        outcome: Result<serde_json::Value, BackendError>,
    ) {
        // The push channel may already have settled the task; a terminal
        // status is never overwritten.
        if self
            .registry
            .get_status(task_id)
            .is_some_and(|t| t.status.is_terminal())
        {
            return;
        }
        match outcome {
            Ok(result) => {
                self.registry.add_log(
                    task_id,
                    LogLevel::Success,
                    "attack-agent",
                    "attack execution finished",
                );
                self.registry.complete_task(task_id, result);
                self.finalize(task_id);
            }
            Err(err) => {
                let reason = err.to_string();
                self.registry
                    .add_log(task_id, LogLevel::Error, "attack-agent", reason.clone());
                self.registry.fail_task(task_id, reason);
                self.finalize(task_id);
            }
        }
    }

    /// Terminal housekeeping: stop every continuous effect this task
    /// started, show the result marker, publish the completion event.
    ///
    /// Device statuses are left as last set.
    fn finalize(&self, task_id: TaskId) {
        if let Some((_, effect_ids)) = self.started_effects.remove(&task_id) {
            for effect_id in effect_ids {
                self.scheduler.stop_named(&effect_id);
            }
        }

        let Some(task) = self.registry.get_status(task_id) else {
            return;
        };
        let success = task.status == TaskStatus::Completed;
        if success {
            metrics::record_task_completed();
        } else {
            metrics::record_task_failed();
        }

        let marker_device = task.payload.target.clone().or_else(|| task.payload.attacker.clone());
        if let Some(device) = marker_device
            && let Some(center) = self.position_of(&device)
        {
            if success {
                self.scheduler.run_once(producers::success_marker(center));
            } else {
                self.scheduler.run_once(producers::failure_marker(center));
            }
        }

        info!(task = %task_id, %success, "task finalized");
        self.bus.publish(BusEvent::AttackCompleted {
            task_id,
            success,
            result: task.result,
            error: task.error,
        });
    }

    fn publish_progress(&self, task_id: TaskId) {
        if let Some(task) = self.registry.get_status(task_id) {
            self.bus.publish(BusEvent::AttackProgress {
                task_id,
                status: task.status,
                phase: task.phase,
                progress: task.progress,
            });
        }
    }
}

impl std::fmt::Debug for AttackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttackOrchestrator")
            .field("tasks", &self.registry.len())
            .field("tracked_tasks_with_effects", &self.started_effects.len())
            .finish_non_exhaustive()
    }
}
