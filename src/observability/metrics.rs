//! Metric recording helpers
//!
//! Typed convenience functions over the `metrics` facade. Without an
//! installed recorder every call is a silent no-op, so the library
//! records unconditionally and leaves exporter choice to the embedder.

use metrics::{counter, describe_counter};

/// Registers metric descriptions with the global recorder.
pub fn describe_metrics() {
    describe_counter!(
        "rangeview_tasks_submitted_total",
        "Attack tasks submitted to the backend"
    );
    describe_counter!(
        "rangeview_tasks_completed_total",
        "Attack tasks that reached completed"
    );
    describe_counter!(
        "rangeview_tasks_failed_total",
        "Attack tasks that reached failed"
    );
    describe_counter!(
        "rangeview_effects_started_total",
        "Effect sequences started, by family"
    );
    describe_counter!(
        "rangeview_effects_stopped_total",
        "Effect sequences stopped by id, by family"
    );
    describe_counter!(
        "rangeview_effect_errors_total",
        "Effect producers that failed or panicked"
    );
    describe_counter!(
        "rangeview_push_frames_total",
        "Status frames received on the push channel"
    );
    describe_counter!(
        "rangeview_push_reconnects_total",
        "Successful push channel (re)connections"
    );
    describe_counter!(
        "rangeview_regressive_updates_total",
        "Status/phase updates dropped for violating monotonicity"
    );
}

/// Records an attack task submission.
pub fn record_task_submitted() {
    counter!("rangeview_tasks_submitted_total").increment(1);
}

/// Records a task reaching completed.
pub fn record_task_completed() {
    counter!("rangeview_tasks_completed_total").increment(1);
}

/// Records a task reaching failed.
pub fn record_task_failed() {
    counter!("rangeview_tasks_failed_total").increment(1);
}

/// Records an effect sequence start.
pub fn record_effect_started(family: &'static str) {
    counter!("rangeview_effects_started_total", "family" => family).increment(1);
}

/// Records an effect sequence being stopped by id.
pub fn record_effect_stopped(family: &'static str) {
    counter!("rangeview_effects_stopped_total", "family" => family).increment(1);
}

/// Records a failed or panicked effect producer.
pub fn record_effect_error() {
    counter!("rangeview_effect_errors_total").increment(1);
}

/// Records a status frame received on the push channel.
pub fn record_push_frame() {
    counter!("rangeview_push_frames_total").increment(1);
}

/// Records a successful push channel connection.
pub fn record_push_reconnect() {
    counter!("rangeview_push_reconnects_total").increment(1);
}

/// Records a dropped regressive status/phase update.
pub fn record_regressive_update() {
    counter!("rangeview_regressive_updates_total").increment(1);
}
