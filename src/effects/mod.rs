//! Timed visual effects
//!
//! The [`Renderer`] capability seam, the [`EffectScheduler`] that runs
//! many named, cancellable timed sequences concurrently, and the stock
//! producers (pulses, path travel, glows, traffic) the orchestrator
//! dispatches to.

pub mod producers;
pub mod renderer;
pub mod scheduler;

pub use renderer::{NullRenderer, PrimitiveId, Renderer, Shape, TargetProps};
pub use scheduler::{EffectContext, EffectRef, EffectScheduler};
