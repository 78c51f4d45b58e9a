//! Attack task registry
//!
//! Thread-safe store of task records. Lookups on unknown ids return
//! `None`/`false` and never error; mutation methods merge fields as
//! given (the orchestrator owns the lifecycle invariants).

use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use tracing::debug;

use super::types::{LogEntry, LogLevel, Task, TaskId, TaskPayload, TaskStatus, TaskUpdate};

/// Registry of attack tasks keyed by id.
#[derive(Debug, Default)]
pub struct AttackTaskRegistry {
    tasks: DashMap<TaskId, Task>,
}

impl AttackTaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a task in `pending` with phase `reconnaissance`,
    /// progress 0, and an empty log.
    pub fn create_task(&self, payload: TaskPayload) -> TaskId {
        let id = TaskId::generate();
        self.tasks.insert(id, Task::new(id, payload));
        debug!(task = %id, "created task");
        id
    }

    /// Merges the given fields into the task and refreshes `updated_at`.
    ///
    /// Returns `false` if the task id is unknown. The registry does not
    /// enforce lifecycle ordering — regressive updates are applied as
    /// given; progress is capped to the valid range.
    pub fn update(&self, id: TaskId, update: TaskUpdate) -> bool {
        self.tasks.get_mut(&id).is_some_and(|mut task| {
            if let Some(status) = update.status {
                task.status = status;
            }
            if let Some(phase) = update.phase {
                task.phase = phase;
            }
            if let Some(progress) = update.progress {
                task.progress = progress.min(100);
            }
            task.updated_at = Utc::now();
            true
        })
    }

    /// Appends a log entry. Fails silently (returns `false`) on an
    /// unknown task id.
    pub fn add_log(
        &self,
        id: TaskId,
        level: LogLevel,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> bool {
        self.tasks.get_mut(&id).is_some_and(|mut task| {
            task.logs.push(LogEntry {
                level,
                source: source.into(),
                message: message.into(),
                timestamp: Utc::now(),
            });
            task.updated_at = Utc::now();
            true
        })
    }

    /// Marks the task completed with a result payload and progress 100.
    pub fn complete_task(&self, id: TaskId, result: serde_json::Value) -> bool {
        self.tasks.get_mut(&id).is_some_and(|mut task| {
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.result = Some(result);
            task.updated_at = Utc::now();
            true
        })
    }

    /// Marks the task failed with an error message.
    pub fn fail_task(&self, id: TaskId, error: impl Into<String>) -> bool {
        self.tasks.get_mut(&id).is_some_and(|mut task| {
            task.status = TaskStatus::Failed;
            task.error = Some(error.into());
            task.updated_at = Utc::now();
            true
        })
    }

    /// Returns a snapshot of the task, or `None` if the id is unknown.
    #[must_use]
    pub fn get_status(&self, id: TaskId) -> Option<Task> {
        self.tasks.get(&id).map(|task| task.clone())
    }

    /// Evicts terminal tasks whose last update is older than `max_age`.
    ///
    /// Running and pending tasks are never evicted. Returns the number
    /// of evicted tasks.
    pub fn cleanup(&self, max_age: std::time::Duration) -> usize {
        let cutoff = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        let now = Utc::now();
        let stale: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|entry| entry.status.is_terminal() && now - entry.updated_at > cutoff)
            .map(|entry| entry.id)
            .collect();

        let count = stale.len();
        for id in stale {
            self.tasks.remove(&id);
            debug!(task = %id, "evicted terminal task");
        }
        count
    }

    /// Number of tasks currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the registry holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::types::KillChainPhase;
    use std::time::Duration;

    fn payload() -> TaskPayload {
        TaskPayload {
            attack_type: "auto".to_string(),
            ..TaskPayload::default()
        }
    }

    #[test]
    fn test_create_task_initial_state() {
        let registry = AttackTaskRegistry::new();
        let id = registry.create_task(payload());
        let task = registry.get_status(id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.phase, KillChainPhase::Reconnaissance);
        assert_eq!(task.progress, 0);
        assert!(task.logs.is_empty());
    }

    #[test]
    fn test_get_status_unknown_is_none() {
        let registry = AttackTaskRegistry::new();
        assert!(registry.get_status(TaskId::generate()).is_none());
    }

    #[test]
    fn test_update_merges_fields() {
        let registry = AttackTaskRegistry::new();
        let id = registry.create_task(payload());
        let before = registry.get_status(id).unwrap().updated_at;

        assert!(registry.update(
            id,
            TaskUpdate {
                status: Some(TaskStatus::Running),
                phase: Some(KillChainPhase::Exploitation),
                progress: Some(50),
            },
        ));

        let task = registry.get_status(id).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.phase, KillChainPhase::Exploitation);
        assert_eq!(task.progress, 50);
        assert!(task.updated_at >= before);
    }

    #[test]
    fn test_update_unknown_returns_false() {
        let registry = AttackTaskRegistry::new();
        assert!(!registry.update(TaskId::generate(), TaskUpdate::status(TaskStatus::Running)));
    }

    #[test]
    fn test_update_caps_progress() {
        let registry = AttackTaskRegistry::new();
        let id = registry.create_task(payload());
        registry.update(
            id,
            TaskUpdate {
                progress: Some(250),
                ..TaskUpdate::default()
            },
        );
        assert_eq!(registry.get_status(id).unwrap().progress, 100);
    }

    #[test]
    fn test_add_log_appends_in_order() {
        let registry = AttackTaskRegistry::new();
        let id = registry.create_task(payload());
        assert!(registry.add_log(id, LogLevel::Info, "agent", "scanning ports"));
        assert!(registry.add_log(id, LogLevel::Warning, "agent", "port 3306 filtered"));

        let logs = registry.get_status(id).unwrap().logs;
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "scanning ports");
        assert_eq!(logs[1].message, "port 3306 filtered");
    }

    #[test]
    fn test_add_log_unknown_fails_silently() {
        let registry = AttackTaskRegistry::new();
        assert!(!registry.add_log(TaskId::generate(), LogLevel::Info, "x", "y"));
    }

    #[test]
    fn test_complete_task_stamps_progress() {
        let registry = AttackTaskRegistry::new();
        let id = registry.create_task(payload());
        registry.update(id, TaskUpdate::status(TaskStatus::Running));

        assert!(registry.complete_task(id, serde_json::json!({"shell": true})));
        let task = registry.get_status(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert!(task.result.is_some());
        assert!(task.error.is_none());
    }

    #[test]
    fn test_fail_task_keeps_progress() {
        let registry = AttackTaskRegistry::new();
        let id = registry.create_task(payload());
        registry.update(
            id,
            TaskUpdate {
                status: Some(TaskStatus::Running),
                phase: Some(KillChainPhase::Exploitation),
                progress: Some(50),
            },
        );

        assert!(registry.fail_task(id, "timeout"));
        let task = registry.get_status(id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, 50);
        assert_eq!(task.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_cleanup_evicts_only_stale_terminal() {
        let registry = AttackTaskRegistry::new();
        let done = registry.create_task(payload());
        let live = registry.create_task(payload());
        registry.complete_task(done, serde_json::json!({}));
        registry.update(live, TaskUpdate::status(TaskStatus::Running));

        // Everything is fresh — nothing to evict.
        assert_eq!(registry.cleanup(Duration::from_secs(3600)), 0);

        // Zero max age: the terminal task is stale, the running one stays.
        assert_eq!(registry.cleanup(Duration::ZERO), 1);
        assert!(registry.get_status(done).is_none());
        assert!(registry.get_status(live).is_some());
    }

    #[test]
    fn test_concurrent_log_appends() {
        use std::sync::Arc;

        let registry = Arc::new(AttackTaskRegistry::new());
        let id = registry.create_task(payload());

        let mut handles = vec![];
        for worker in 0..8 {
            let reg = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    reg.add_log(id, LogLevel::Debug, "worker", format!("{worker}:{i}"));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.get_status(id).unwrap().logs.len(), 400);
    }
}
