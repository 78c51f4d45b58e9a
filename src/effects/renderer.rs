//! Renderer capability
//!
//! The 2D surface is an external collaborator. The engine only ever
//! calls the four operations below and never inspects renderer
//! internals; per-tick redraw batching is the renderer's own concern.

use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::topology::Position;

/// Opaque handle to a primitive the renderer holds.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct PrimitiveId(pub Uuid);

impl PrimitiveId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A drawable primitive.
///
/// Styling fields are CSS color strings; exact visual treatment is the
/// renderer's business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// Circle around a center point (pulses, glows, packets)
    Circle {
        center: Position,
        radius: f64,
        fill: Option<String>,
        stroke: Option<String>,
        stroke_width: f64,
        opacity: f64,
    },
    /// Line segment (attack paths, link highlights)
    Line {
        from: Position,
        to: Position,
        stroke: String,
        width: f64,
        dash: Option<Vec<f64>>,
        opacity: f64,
    },
    /// Axis-aligned rectangle (data packets)
    Rect {
        center: Position,
        width: f64,
        height: f64,
        fill: String,
        opacity: f64,
    },
    /// Text label (status markers)
    Text {
        at: Position,
        content: String,
        size: f64,
        fill: String,
        opacity: f64,
    },
}

/// Animation target: only the set fields are tweened.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetProps {
    /// Move the primitive's center/anchor
    pub center: Option<Position>,
    /// Move a line's far endpoint
    pub line_end: Option<Position>,
    /// Grow or shrink a circle
    pub radius: Option<f64>,
    /// Fade
    pub opacity: Option<f64>,
}

impl TargetProps {
    /// Target that only fades to the given opacity.
    #[must_use]
    pub const fn fade_to(opacity: f64) -> Self {
        Self {
            center: None,
            line_end: None,
            radius: None,
            opacity: Some(opacity),
        }
    }

    /// Target that moves the primitive to `center`.
    #[must_use]
    pub const fn move_to(center: Position) -> Self {
        Self {
            center: Some(center),
            line_end: None,
            radius: None,
            opacity: None,
        }
    }
}

/// The consumed rendering capability.
///
/// `remove` on an id the renderer no longer holds must be a no-op, and
/// `animate` resolves when the tween completes (a stalled or dropped
/// renderer is the renderer's bug, not the scheduler's).
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Adds a primitive and returns its handle.
    fn add(&self, shape: Shape) -> PrimitiveId;

    /// Removes a primitive. No-op on an unknown handle.
    fn remove(&self, id: PrimitiveId);

    /// Redraws the scene.
    fn render_all(&self);

    /// Tweens the given fields over `duration`, resolving on completion.
    async fn animate(&self, id: PrimitiveId, target: TargetProps, duration: Duration);
}

/// Renderer that draws nothing but keeps honest books.
///
/// `animate` sleeps for the requested duration so sequences take their
/// real (or virtually advanced) time. Used by the headless CLI path and
/// throughout the test suite to assert the no-leak invariants.
#[derive(Debug, Default)]
pub struct NullRenderer {
    live: DashMap<PrimitiveId, Shape>,
    added: AtomicUsize,
    removed: AtomicUsize,
    renders: AtomicUsize,
}

impl NullRenderer {
    /// Creates an empty accounting renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of primitives currently held.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Total primitives ever added.
    #[must_use]
    pub fn added_count(&self) -> usize {
        self.added.load(Ordering::Relaxed)
    }

    /// Total remove calls that matched a live primitive.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.load(Ordering::Relaxed)
    }

    /// Total redraws issued.
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Renderer for NullRenderer {
    fn add(&self, shape: Shape) -> PrimitiveId {
        let id = PrimitiveId::generate();
        self.live.insert(id, shape);
        self.added.fetch_add(1, Ordering::Relaxed);
        id
    }

    fn remove(&self, id: PrimitiveId) {
        if self.live.remove(&id).is_some() {
            self.removed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn render_all(&self) {
        self.renders.fetch_add(1, Ordering::Relaxed);
    }

    async fn animate(&self, _id: PrimitiveId, _target: TargetProps, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
