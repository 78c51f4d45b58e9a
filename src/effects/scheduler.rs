//! Effect scheduler
//!
//! Runs many independent, named, timed visual sequences concurrently
//! without double-starting, leaking timers, or crashing on stale
//! handles. Three families of sequences, mirroring how they are
//! cancelled: continuous effects addressed by name, step queues
//! addressed by name, and transient run-once effects tracked so
//! [`clear_all`](EffectScheduler::clear_all) can reach them.
//!
//! A producer owns its primitives through an [`EffectContext`]; whatever
//! it has not removed by the time its sequence ends (normally, by error,
//! or by cancellation) is swept by the scheduler, so no sequence can
//! orphan visuals.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::EffectError;
use crate::observability::metrics;

use super::renderer::{PrimitiveId, Renderer, Shape, TargetProps};

/// Reference to a transient effect started with
/// [`run_once`](EffectScheduler::run_once).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct EffectRef(pub Uuid);

impl std::fmt::Display for EffectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cancellation handle plus an epoch stamp.
///
/// The epoch lets a finished task remove its own map entry without
/// clobbering a newer sequence that reused the same name.
#[derive(Debug)]
struct EffectHandle {
    cancel: CancellationToken,
    epoch: Uuid,
}

impl EffectHandle {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            epoch: Uuid::new_v4(),
        }
    }
}

/// Capability handed to effect producers.
///
/// Primitives added through the context are tracked twice: in the
/// sequence's own set (swept when the sequence ends) and in the
/// scheduler-wide set (swept by `clear_all`). `tick` and `animate` are
/// cancellation-aware, so a stopped sequence never arms another timer.
#[derive(Clone)]
pub struct EffectContext {
    renderer: Arc<dyn Renderer>,
    tracked: Arc<DashMap<PrimitiveId, ()>>,
    owned: Arc<DashMap<PrimitiveId, ()>>,
    cancel: CancellationToken,
}

impl EffectContext {
    /// Adds a primitive and records ownership.
    pub fn add(&self, shape: Shape) -> PrimitiveId {
        let id = self.renderer.add(shape);
        self.tracked.insert(id, ());
        self.owned.insert(id, ());
        id
    }

    /// Removes a primitive and releases ownership. Safe on stale handles.
    pub fn remove(&self, id: PrimitiveId) {
        self.renderer.remove(id);
        self.tracked.remove(&id);
        self.owned.remove(&id);
    }

    /// Requests a redraw.
    pub fn render(&self) {
        self.renderer.render_all();
    }

    /// Tweens a primitive, returning early if the sequence is stopped.
    pub async fn animate(&self, id: PrimitiveId, target: TargetProps, duration: Duration) {
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = self.renderer.animate(id, target, duration) => {}
        }
    }

    /// Sleeps for `duration`. Returns `false` if the sequence was
    /// stopped while sleeping — the producer must not re-arm.
    pub async fn tick(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    /// Whether the sequence has been stopped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Scheduler of named, cancellable, queueable timed visual sequences.
///
/// All operations are fire-and-forget: a producer error aborts that one
/// sequence and is logged; sibling sequences continue unaffected.
pub struct EffectScheduler {
    renderer: Arc<dyn Renderer>,
    continuous: Arc<DashMap<String, EffectHandle>>,
    queues: Arc<DashMap<String, EffectHandle>>,
    transients: Arc<DashMap<Uuid, EffectHandle>>,
    tracked: Arc<DashMap<PrimitiveId, ()>>,
}

impl EffectScheduler {
    /// Creates a scheduler rendering through the given capability.
    #[must_use]
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            continuous: Arc::new(DashMap::new()),
            queues: Arc::new(DashMap::new()),
            transients: Arc::new(DashMap::new()),
            tracked: Arc::new(DashMap::new()),
        }
    }

    /// Starts a named continuous sequence.
    ///
    /// If `id` is already active it is stopped first, so exactly one
    /// sequence is ever live under a name. The producer re-arms itself
    /// via [`EffectContext::tick`] until stopped.
    pub fn start_named<F, Fut>(&self, id: impl Into<String>, producer: F)
    where
        F: FnOnce(EffectContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        let id = id.into();
        self.stop_named(&id);
        debug!(effect = %id, "starting continuous effect");
        metrics::record_effect_started("continuous");

        let handle = EffectHandle::new();
        let epoch = handle.epoch;
        let cancel = handle.cancel.clone();
        self.continuous.insert(id.clone(), handle);

        let ctx = self.context(cancel.clone());
        let registry = Arc::clone(&self.continuous);
        self.spawn_sequence(id.clone(), cancel, ctx, producer, move || {
            registry.remove_if(&id, |_, h| h.epoch == epoch);
        });
    }

    /// Stops a named continuous sequence.
    ///
    /// Idempotent: stopping twice, or a name that was never started, is
    /// a no-op and never an error.
    pub fn stop_named(&self, id: &str) {
        if let Some((_, handle)) = self.continuous.remove(id) {
            debug!(effect = %id, "stopping continuous effect");
            handle.cancel.cancel();
            metrics::record_effect_stopped("continuous");
        }
    }

    /// Fires a single transient sequence.
    ///
    /// The sequence self-removes its visuals on completion and is
    /// tracked so [`clear_all`](Self::clear_all) reaches it even before
    /// it finishes.
    pub fn run_once<F, Fut>(&self, factory: F) -> EffectRef
    where
        F: FnOnce(EffectContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        let key = Uuid::new_v4();
        metrics::record_effect_started("transient");

        let handle = EffectHandle::new();
        let epoch = handle.epoch;
        let cancel = handle.cancel.clone();
        self.transients.insert(key, handle);

        let ctx = self.context(cancel.clone());
        let registry = Arc::clone(&self.transients);
        self.spawn_sequence(key.to_string(), cancel, ctx, factory, move || {
            registry.remove_if(&key, |_, h| h.epoch == epoch);
        });
        EffectRef(key)
    }

    /// Executes `steps` strictly in order, one per `interval`.
    ///
    /// The first step runs immediately. With `looped` the queue restarts
    /// from step 0 after the last step; otherwise it self-retires after
    /// the last step without arming another timer. An existing queue
    /// under the same id is stopped first. Empty step lists retire
    /// immediately.
    pub fn create_queue(
        &self,
        id: impl Into<String>,
        steps: Vec<Box<dyn FnMut() + Send>>,
        interval: Duration,
        looped: bool,
    ) {
        let id = id.into();
        self.stop_queue(&id);
        debug!(effect = %id, steps = steps.len(), looped, "starting effect queue");
        metrics::record_effect_started("queue");

        let handle = EffectHandle::new();
        let epoch = handle.epoch;
        let cancel = handle.cancel.clone();
        self.queues.insert(id.clone(), handle);

        let ctx = self.context(cancel.clone());
        let registry = Arc::clone(&self.queues);
        let producer = move |ctx: EffectContext| async move {
            let mut steps = steps;
            if steps.is_empty() {
                return Ok(());
            }
            loop {
                let len = steps.len();
                for (index, step) in steps.iter_mut().enumerate() {
                    step();
                    let is_last = index + 1 == len;
                    if is_last && !looped {
                        return Ok(());
                    }
                    if !ctx.tick(interval).await {
                        return Ok(());
                    }
                }
            }
        };
        self.spawn_sequence(id.clone(), cancel, ctx, producer, move || {
            registry.remove_if(&id, |_, h| h.epoch == epoch);
        });
    }

    /// Stops a step queue. Idempotent.
    pub fn stop_queue(&self, id: &str) {
        if let Some((_, handle)) = self.queues.remove(id) {
            debug!(effect = %id, "stopping effect queue");
            handle.cancel.cancel();
            metrics::record_effect_stopped("queue");
        }
    }

    /// Cancels every tracked sequence and removes every remaining
    /// scheduler-owned primitive. Safe to call with nothing active.
    pub fn clear_all(&self) {
        let continuous = self.continuous.len();
        let queues = self.queues.len();
        let transients = self.transients.len();

        for entry in self.continuous.iter() {
            entry.value().cancel.cancel();
        }
        self.continuous.clear();
        for entry in self.queues.iter() {
            entry.value().cancel.cancel();
        }
        self.queues.clear();
        for entry in self.transients.iter() {
            entry.value().cancel.cancel();
        }
        self.transients.clear();

        let leftovers: Vec<PrimitiveId> =
            self.tracked.iter().map(|entry| *entry.key()).collect();
        let swept = leftovers.len();
        for id in leftovers {
            self.renderer.remove(id);
            self.tracked.remove(&id);
        }
        self.renderer.render_all();

        if continuous + queues + transients + swept > 0 {
            debug!(continuous, queues, transients, swept, "cleared all effects");
        }
    }

    /// Number of live continuous sequences.
    #[must_use]
    pub fn active_continuous(&self) -> usize {
        self.continuous.len()
    }

    /// Number of live queues.
    #[must_use]
    pub fn active_queues(&self) -> usize {
        self.queues.len()
    }

    /// Number of live transient sequences.
    #[must_use]
    pub fn active_transients(&self) -> usize {
        self.transients.len()
    }

    /// Total live sequences of any family.
    #[must_use]
    pub fn active_effects(&self) -> usize {
        self.active_continuous() + self.active_queues() + self.active_transients()
    }

    /// Number of primitives currently tracked as scheduler-owned.
    #[must_use]
    pub fn tracked_primitives(&self) -> usize {
        self.tracked.len()
    }

    fn context(&self, cancel: CancellationToken) -> EffectContext {
        EffectContext {
            renderer: Arc::clone(&self.renderer),
            tracked: Arc::clone(&self.tracked),
            owned: Arc::new(DashMap::new()),
            cancel,
        }
    }

    /// Runs one sequence to completion, isolating failures and sweeping
    /// leftover primitives afterwards.
    fn spawn_sequence<F, Fut, Cleanup>(
        &self,
        label: String,
        cancel: CancellationToken,
        ctx: EffectContext,
        producer: F,
        deregister: Cleanup,
    ) where
        F: FnOnce(EffectContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
        Cleanup: FnOnce() + Send + 'static,
    {
        let renderer = Arc::clone(&self.renderer);
        let tracked = Arc::clone(&self.tracked);
        let owned = Arc::clone(&ctx.owned);

        tokio::spawn(async move {
            let sequence = producer(ctx);
            let outcome = tokio::select! {
                () = cancel.cancelled() => None,
                result = AssertUnwindSafe(sequence).catch_unwind() => Some(result),
            };
            match outcome {
                Some(Ok(Ok(()))) | None => {}
                Some(Ok(Err(err))) => {
                    warn!(effect = %label, error = %err, "effect producer failed");
                    metrics::record_effect_error();
                }
                Some(Err(_)) => {
                    error!(effect = %label, "effect producer panicked");
                    metrics::record_effect_error();
                }
            }

            // Sweep whatever the sequence still owns so a cancelled or
            // failed producer cannot orphan visuals.
            let leftovers: Vec<PrimitiveId> = owned.iter().map(|entry| *entry.key()).collect();
            if !leftovers.is_empty() {
                for id in leftovers {
                    renderer.remove(id);
                    tracked.remove(&id);
                    owned.remove(&id);
                }
                renderer.render_all();
            }
            deregister();
        });
    }
}

impl std::fmt::Debug for EffectScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectScheduler")
            .field("continuous", &self.continuous.len())
            .field("queues", &self.queues.len())
            .field("transients", &self.transients.len())
            .field("tracked_primitives", &self.tracked.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::renderer::NullRenderer;
    use crate::topology::Position;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scheduler() -> (Arc<NullRenderer>, EffectScheduler) {
        let renderer = Arc::new(NullRenderer::new());
        let scheduler = EffectScheduler::new(Arc::clone(&renderer) as Arc<dyn Renderer>);
        (renderer, scheduler)
    }

    fn pulse_shape() -> Shape {
        Shape::Circle {
            center: Position::new(50.0, 50.0),
            radius: 5.0,
            fill: None,
            stroke: Some("#3b82f6".to_string()),
            stroke_width: 3.0,
            opacity: 0.8,
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Advances the paused clock by `total` in small increments, letting
    /// spawned tasks make progress between steps. A single `advance` jump
    /// only fires one generation of timers, so re-arming timed sequences
    /// need the clock stepped forward for each tick to elapse.
    async fn advance_stepped(total: Duration) {
        let step = Duration::from_millis(25);
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            let next = step.min(total - elapsed);
            tokio::time::advance(next).await;
            elapsed += next;
            tokio::task::yield_now().await;
        }
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_named_replaces_existing() {
        let (_, scheduler) = scheduler();
        let first_ticks = Arc::new(AtomicUsize::new(0));
        let second_ticks = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first_ticks);
        scheduler.start_named("scan-x", move |ctx| async move {
            while ctx.tick(Duration::from_millis(100)).await {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        advance_stepped(Duration::from_millis(350)).await;
        settle().await;
        let first_before_replace = first_ticks.load(Ordering::SeqCst);
        assert!(first_before_replace >= 3);

        let counter = Arc::clone(&second_ticks);
        scheduler.start_named("scan-x", move |ctx| async move {
            while ctx.tick(Duration::from_millis(100)).await {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });
        settle().await;

        // Exactly one sequence live under the name.
        assert_eq!(scheduler.active_continuous(), 1);

        advance_stepped(Duration::from_millis(500)).await;
        settle().await;

        // The first sequence stopped ticking when it was replaced.
        assert_eq!(first_ticks.load(Ordering::SeqCst), first_before_replace);
        assert!(second_ticks.load(Ordering::SeqCst) >= 4);

        scheduler.stop_named("scan-x");
        assert_eq!(scheduler.active_continuous(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_named_before_start_is_noop() {
        let (_, scheduler) = scheduler();
        scheduler.stop_named("scan-x");
        scheduler.stop_named("scan-x");
        assert_eq!(scheduler.active_effects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_sequence_sweeps_primitives() {
        let (renderer, scheduler) = scheduler();

        scheduler.start_named("glow-a", move |ctx| async move {
            let _glow = ctx.add(pulse_shape());
            // Hold the glow until stopped.
            while ctx.tick(Duration::from_secs(1)).await {}
            Ok(())
        });
        settle().await;
        assert_eq!(renderer.live_count(), 1);
        assert_eq!(scheduler.tracked_primitives(), 1);

        scheduler.stop_named("glow-a");
        settle().await;
        assert_eq!(renderer.live_count(), 0);
        assert_eq!(scheduler.tracked_primitives(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_self_retires() {
        let (renderer, scheduler) = scheduler();

        scheduler.run_once(|ctx| async move {
            let packet = ctx.add(pulse_shape());
            ctx.animate(
                packet,
                TargetProps::move_to(Position::new(200.0, 200.0)),
                Duration::from_millis(300),
            )
            .await;
            ctx.remove(packet);
            ctx.render();
            Ok(())
        });
        settle().await;
        assert_eq!(scheduler.active_transients(), 1);

        tokio::time::advance(Duration::from_millis(400)).await;
        settle().await;
        assert_eq!(scheduler.active_transients(), 0);
        assert_eq!(renderer.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_error_is_isolated() {
        let (_, scheduler) = scheduler();
        let sibling_ticks = Arc::new(AtomicUsize::new(0));

        scheduler.start_named("broken", |_ctx| async move {
            Err(EffectError::Producer("renderer went away".to_string()))
        });

        let counter = Arc::clone(&sibling_ticks);
        scheduler.start_named("healthy", move |ctx| async move {
            while ctx.tick(Duration::from_millis(50)).await {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        advance_stepped(Duration::from_millis(300)).await;
        settle().await;

        // The broken sequence retired itself; the sibling kept running.
        assert_eq!(scheduler.active_continuous(), 1);
        assert!(sibling_ticks.load(Ordering::SeqCst) >= 5);
        scheduler.clear_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_panic_is_isolated() {
        let (renderer, scheduler) = scheduler();

        scheduler.start_named("panicky", move |ctx| async move {
            let _orphan = ctx.add(pulse_shape());
            panic!("producer bug");
        });
        settle().await;

        // The panic is contained and the orphan is swept.
        assert_eq!(scheduler.active_continuous(), 0);
        assert_eq!(renderer.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_runs_steps_in_order_without_trailing_timer() {
        let (_, scheduler) = scheduler();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let steps: Vec<Box<dyn FnMut() + Send>> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                Box::new(move || order.lock().unwrap().push(i)) as Box<dyn FnMut() + Send>
            })
            .collect();

        scheduler.create_queue("seq", steps, Duration::from_millis(100), false);
        settle().await;
        // First step fires immediately.
        assert_eq!(*order.lock().unwrap(), vec![0]);

        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1]);

        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        // Self-retired after the last step; no timer armed past it.
        assert_eq!(scheduler.active_queues(), 0);

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_loops_until_stopped() {
        let (_, scheduler) = scheduler();
        let runs = Arc::new(AtomicUsize::new(0));

        let steps: Vec<Box<dyn FnMut() + Send>> = (0..2)
            .map(|_| {
                let runs = Arc::clone(&runs);
                Box::new(move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnMut() + Send>
            })
            .collect();

        scheduler.create_queue("loop", steps, Duration::from_millis(100), true);
        advance_stepped(Duration::from_millis(650)).await;
        settle().await;

        // Three full wraps and change.
        assert!(runs.load(Ordering::SeqCst) >= 6);
        assert_eq!(scheduler.active_queues(), 1);

        scheduler.stop_queue("loop");
        settle().await;
        let after_stop = runs.load(Ordering::SeqCst);

        advance_stepped(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
        assert_eq!(scheduler.active_queues(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_retires_immediately() {
        let (_, scheduler) = scheduler();
        scheduler.create_queue("empty", Vec::new(), Duration::from_millis(100), true);
        settle().await;
        assert_eq!(scheduler.active_queues(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_all_leaves_nothing() {
        let (renderer, scheduler) = scheduler();

        for name in ["scan-a", "scan-b", "traffic-c"] {
            scheduler.start_named(name, move |ctx| async move {
                let _p = ctx.add(pulse_shape());
                while ctx.tick(Duration::from_millis(100)).await {}
                Ok(())
            });
        }
        scheduler.create_queue(
            "queue",
            vec![Box::new(|| {}) as Box<dyn FnMut() + Send>],
            Duration::from_millis(100),
            true,
        );
        scheduler.run_once(|ctx| async move {
            let _p = ctx.add(pulse_shape());
            ctx.tick(Duration::from_secs(60)).await;
            Ok(())
        });
        settle().await;
        assert!(scheduler.active_effects() >= 5);
        assert_eq!(renderer.live_count(), 4);

        scheduler.clear_all();
        settle().await;

        assert_eq!(scheduler.active_effects(), 0);
        assert_eq!(scheduler.tracked_primitives(), 0);
        assert_eq!(renderer.live_count(), 0);

        // Safe with nothing active.
        scheduler.clear_all();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_ids_unaffected_by_stop() {
        let (_, scheduler) = scheduler();
        let ticks = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ticks);
        scheduler.start_named("scan-keep", move |ctx| async move {
            while ctx.tick(Duration::from_millis(50)).await {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });
        scheduler.start_named("scan-drop", |ctx| async move {
            while ctx.tick(Duration::from_millis(50)).await {}
            Ok(())
        });

        scheduler.stop_named("scan-drop");
        advance_stepped(Duration::from_millis(300)).await;
        settle().await;

        assert_eq!(scheduler.active_continuous(), 1);
        assert!(ticks.load(Ordering::SeqCst) >= 5);
        scheduler.clear_all();
    }
}
