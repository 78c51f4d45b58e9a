//! `rangeview run` — drive one attack session end to end.
//!
//! Builds the diagram from the session config, provisions the emulated
//! range, submits the attack, and consumes push-channel frames until
//! the task settles. If the push channel dies first, falls back to
//! polling real registry state; progress is never fabricated.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::backend::{BackendClient, TopologyAction, WsPushChannel};
use crate::bus::EventBus;
use crate::cli::args::RunArgs;
use crate::config::SessionConfig;
use crate::effects::{EffectScheduler, NullRenderer, Renderer};
use crate::error::RangeviewError;
use crate::orchestrator::AttackOrchestrator;
use crate::task::{AttackTaskRegistry, Task, TaskPayload, TaskStatus};
use crate::topology::{ConnectionMetadata, DeviceId, TopologyGraph};

/// Runs one attack session to a terminal state.
///
/// # Errors
///
/// Returns a config error for an unloadable session file, a topology
/// error for a malformed diagram, and `TaskFailed` when the attack task
/// settles as failed.
pub async fn run(args: &RunArgs) -> Result<(), RangeviewError> {
    let config = super::load_config(args.config.as_deref())?;
    let graph = Arc::new(RwLock::new(build_graph(&config)?));

    let renderer: Arc<dyn Renderer> = Arc::new(NullRenderer::new());
    let scheduler = Arc::new(EffectScheduler::new(renderer));
    let registry = Arc::new(AttackTaskRegistry::new());
    let bus = EventBus::new();
    let backend = BackendClient::new(
        config.backend.base_url.clone(),
        config.backend.request_timeout(),
    );

    let orchestrator = Arc::new(AttackOrchestrator::new(
        Arc::clone(&graph),
        registry,
        Arc::clone(&scheduler),
        backend.clone(),
        bus,
        config.effects.timing(),
    ));

    if !args.no_provision {
        provision(&backend, &config, &graph).await;
    }

    let payload = build_payload(args, &config, &graph);
    let task_id = if args.social {
        let victim_name = args
            .victim_name
            .clone()
            .or_else(|| {
                payload.target.as_ref().and_then(|id| {
                    graph
                        .read()
                        .ok()
                        .and_then(|g| g.device(id).map(|d| d.name.clone()))
                })
            })
            .unwrap_or_else(|| "unknown user".to_string());
        orchestrator.submit_social(payload, &victim_name, &config.attack.company)
    } else {
        orchestrator.submit(payload)
    };
    info!(task = %task_id, "attack submitted");

    let mut channel = WsPushChannel::with_retry(
        config.push.url.clone(),
        config.push.max_reconnects,
        config.push.reconnect_delay(),
    );
    let mut task = orchestrator.drive(&mut channel, task_id).await;

    // Push channel exhausted before the task settled: poll real state.
    if !task.as_ref().is_some_and(|t| t.status.is_terminal()) {
        warn!("push channel ended before the task settled, polling");
        let poll = orchestrator.spawn_poll(task_id);
        task = wait_for_terminal(&orchestrator, task_id, &config).await;
        poll.abort();
    }

    scheduler.clear_all();
    summarize(task_id, task.as_ref());

    match task {
        Some(task) if task.status == TaskStatus::Completed => Ok(()),
        Some(task) => Err(RangeviewError::TaskFailed(
            task.error.unwrap_or_else(|| "unknown failure".to_string()),
        )),
        None => Err(RangeviewError::TaskFailed("task vanished".to_string())),
    }
}

/// Builds the in-memory diagram from the session config.
fn build_graph(config: &SessionConfig) -> Result<TopologyGraph, RangeviewError> {
    let mut graph = TopologyGraph::new();
    for spec in &config.topology.devices {
        graph.add_device(spec.clone())?;
    }
    for entry in &config.topology.connections {
        graph.add_connection_with_metadata(
            &DeviceId::from(entry.a.as_str()),
            &DeviceId::from(entry.b.as_str()),
            entry.medium,
            ConnectionMetadata {
                subnet: entry.subnet.clone(),
                gateway: entry.gateway.clone(),
            },
        )?;
    }
    Ok(graph)
}

/// Provisions the emulated range; failures are logged, not fatal — the
/// diagram still renders and the attack may target an external host.
async fn provision(
    backend: &BackendClient,
    config: &SessionConfig,
    graph: &Arc<RwLock<TopologyGraph>>,
) {
    match backend
        .topology(TopologyAction::Start, config.topology.template.as_deref())
        .await
    {
        Ok(report) => {
            info!(devices = report.devices.len(), "topology provisioned");
            if let Ok(mut graph) = graph.write() {
                graph.apply_provision_report(&report.devices);
            }
        }
        Err(err) => {
            warn!(error = %err, "topology provisioning failed, continuing without it");
        }
    }
}

fn build_payload(
    args: &RunArgs,
    config: &SessionConfig,
    graph: &Arc<RwLock<TopologyGraph>>,
) -> TaskPayload {
    let resolve = |label: Option<&String>| -> Option<DeviceId> {
        let label = label?;
        graph.read().ok()?.resolve_fuzzy(label)
    };
    TaskPayload {
        attacker: resolve(args.attacker.as_ref()),
        target: resolve(args.target.as_ref()),
        attack_type: args
            .attack_type
            .clone()
            .unwrap_or_else(|| config.attack.default_type.clone()),
        target_host: args.target_host.clone(),
    }
}

/// Waits for the task to settle, checking terminal status each poll
/// interval.
async fn wait_for_terminal(
    orchestrator: &Arc<AttackOrchestrator>,
    task_id: crate::task::TaskId,
    config: &SessionConfig,
) -> Option<Task> {
    let interval = config.effects.timing().poll_interval;
    loop {
        let task = orchestrator.registry().get_status(task_id)?;
        if task.status.is_terminal() {
            return Some(task);
        }
        tokio::time::sleep(interval).await;
    }
}

fn summarize(task_id: crate::task::TaskId, task: Option<&Task>) {
    let Some(task) = task else {
        println!("task {task_id}: no record");
        return;
    };
    println!(
        "task {task_id}: {} (phase {}, progress {}%)",
        task.status, task.phase, task.progress
    );
    for entry in &task.logs {
        println!(
            "  [{}] {:>7} {}: {}",
            entry.timestamp.format("%H:%M:%S"),
            format!("{:?}", entry.level).to_lowercase(),
            entry.source,
            entry.message
        );
    }
    if let Some(error) = &task.error {
        println!("  failure: {error}");
    }
}
