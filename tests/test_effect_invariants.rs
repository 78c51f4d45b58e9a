//! Scheduler invariants exercised through the public API: exactly-one
//! sequence per name, ordered queues, and zero leaked timers or
//! primitives after `clear_all`.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{advance_stepped, settle, stack};
use rangeview::effects::producers;
use rangeview::topology::Position;

#[tokio::test(start_paused = true)]
async fn restart_under_same_name_keeps_one_sequence() {
    let stack = stack();
    let center = Position::new(100.0, 100.0);

    for _ in 0..5 {
        stack.scheduler.start_named(
            "scan-db-server",
            producers::continuous_scan(center, Duration::from_millis(500)),
        );
    }
    settle().await;
    assert_eq!(stack.scheduler.active_continuous(), 1);

    stack.scheduler.stop_named("scan-db-server");
    settle().await;
    assert_eq!(stack.scheduler.active_continuous(), 0);
    assert_eq!(stack.renderer.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_before_start_is_silent() {
    let stack = stack();
    stack.scheduler.stop_named("scan-X");
    stack.scheduler.stop_queue("queue-X");
    assert_eq!(stack.scheduler.active_effects(), 0);
}

#[tokio::test(start_paused = true)]
async fn queue_executes_each_step_exactly_once() {
    let stack = stack();
    let counts: Arc<Vec<AtomicUsize>> =
        Arc::new((0..3).map(|_| AtomicUsize::new(0)).collect());

    let steps: Vec<Box<dyn FnMut() + Send>> = (0..3usize)
        .map(|i| {
            let counts = Arc::clone(&counts);
            Box::new(move || {
                counts[i].fetch_add(1, Ordering::SeqCst);
            }) as Box<dyn FnMut() + Send>
        })
        .collect();

    stack
        .scheduler
        .create_queue("kill-chain", steps, Duration::from_millis(100), false);

    advance_stepped(Duration::from_secs(2)).await;
    settle().await;

    for count in counts.iter() {
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
    assert_eq!(stack.scheduler.active_queues(), 0);
}

#[tokio::test(start_paused = true)]
async fn looped_queue_repeats_until_stopped() {
    let stack = stack();
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    let steps: Vec<Box<dyn FnMut() + Send>> = vec![Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })];

    stack
        .scheduler
        .create_queue("beacon", steps, Duration::from_millis(250), true);

    tokio::time::advance(Duration::from_secs(3)).await;
    settle().await;
    let seen = runs.load(Ordering::SeqCst);
    assert!(seen >= 10, "expected many wraps, saw {seen}");

    stack.scheduler.stop_queue("beacon");
    settle().await;
    tokio::time::advance(Duration::from_secs(3)).await;
    settle().await;
    assert_eq!(runs.load(Ordering::SeqCst), seen);
}

#[tokio::test(start_paused = true)]
async fn clear_all_leaves_zero_timers_and_primitives() {
    let stack = stack();
    let center = Position::new(50.0, 50.0);

    // A representative spread of everything the scheduler can hold.
    stack.scheduler.start_named(
        "scan-web",
        producers::continuous_scan(center, Duration::from_millis(400)),
    );
    stack
        .scheduler
        .start_named("status-db", producers::compromised_pulse(center, 32.0));
    stack.scheduler.start_named(
        "traffic-lan",
        producers::network_traffic(
            vec![center, Position::new(300.0, 50.0)],
            Duration::from_millis(200),
        ),
    );
    stack.scheduler.run_once(producers::attack_path(
        center,
        Position::new(400.0, 400.0),
    ));
    let steps: Vec<Box<dyn FnMut() + Send>> = vec![Box::new(|| {})];
    stack
        .scheduler
        .create_queue("stage-queue", steps, Duration::from_millis(100), true);

    tokio::time::advance(Duration::from_millis(700)).await;
    settle().await;
    assert!(stack.scheduler.active_effects() >= 4);

    stack.scheduler.clear_all();
    settle().await;

    assert_eq!(stack.scheduler.active_effects(), 0);
    assert_eq!(stack.scheduler.tracked_primitives(), 0);
    assert_eq!(stack.renderer.live_count(), 0);

    // Long after the clear, nothing wakes up again.
    let renders = stack.renderer.added_count();
    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(stack.renderer.added_count(), renders);

    // Idempotent with nothing active.
    stack.scheduler.clear_all();
}

#[tokio::test(start_paused = true)]
async fn producer_failure_does_not_disturb_siblings() {
    let stack = stack();
    let center = Position::new(10.0, 10.0);

    stack.scheduler.start_named("broken", |_ctx| async move {
        Err(rangeview::error::EffectError::Producer(
            "boom".to_string(),
        ))
    });
    stack.scheduler.start_named(
        "scan-web",
        producers::continuous_scan(center, Duration::from_millis(300)),
    );

    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;

    assert_eq!(stack.scheduler.active_continuous(), 1);
    assert!(stack.renderer.added_count() > 0, "sibling kept rendering");

    stack.scheduler.clear_all();
}
