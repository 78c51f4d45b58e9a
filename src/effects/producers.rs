//! Stock effect producers
//!
//! The visual vocabulary the orchestrator dispatches to: scan pulses,
//! attack path travel, status glows, exfiltration trains, traffic loops
//! and result markers. Each producer is a closure for
//! [`EffectScheduler::start_named`](super::EffectScheduler::start_named)
//! or [`run_once`](super::EffectScheduler::run_once); continuous ones
//! re-arm themselves through [`EffectContext::tick`] until stopped.

use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};

use crate::error::EffectError;
use crate::topology::Position;

use super::renderer::{Shape, TargetProps};
use super::scheduler::EffectContext;

/// Boxed sequence future, the uniform producer return type.
pub type SequenceFuture = BoxFuture<'static, Result<(), EffectError>>;

// Palette and timing, matching the classic overlay look.
const SCAN_RING_COLORS: [&str; 3] = ["#3b82f6", "#10b981", "#f59e0b"];
const ATTACK_PATH_COLOR: &str = "#ff4444";
const PACKET_COLOR: &str = "#ff6b6b";
const DATA_PACKET_COLOR: &str = "#4ade80";
const TARGETED_COLOR: &str = "#f59e0b";
const COMPROMISED_COLOR: &str = "#dc2626";
const SUCCESS_COLOR: &str = "#22c55e";
const FAILURE_COLOR: &str = "#ef4444";
const NEUTRAL_COLOR: &str = "#94a3b8";
const TRAFFIC_COLORS: [&str; 4] = ["#4ade80", "#60a5fa", "#f472b6", "#fbbf24"];

const PULSE_DURATION: Duration = Duration::from_millis(1500);
const PULSE_STAGGER: Duration = Duration::from_millis(200);
const PULSE_MAX_RADIUS: f64 = 30.0;
const PATH_EXTEND_DURATION: Duration = Duration::from_millis(2000);
const PATH_LINGER: Duration = Duration::from_millis(1000);
const PACKET_DURATION: Duration = Duration::from_millis(1000);
const IMPACT_DURATION: Duration = Duration::from_millis(600);
const GLOW_PULSE_DURATION: Duration = Duration::from_millis(1000);
const GLOW_PULSE_GAP: Duration = Duration::from_millis(500);
const EXFIL_PACKET_DURATION: Duration = Duration::from_millis(800);
const EXFIL_PACKET_STAGGER: Duration = Duration::from_millis(500);
const MARKER_HOLD: Duration = Duration::from_millis(1500);
const MARKER_FADE: Duration = Duration::from_millis(300);
const TRAFFIC_PACKET_DURATION: Duration = Duration::from_millis(1500);

fn ring(center: Position, color: &str) -> Shape {
    Shape::Circle {
        center,
        radius: 5.0,
        fill: None,
        stroke: Some(color.to_string()),
        stroke_width: 3.0,
        opacity: 0.8,
    }
}

fn dot(center: Position, radius: f64, color: &str) -> Shape {
    Shape::Circle {
        center,
        radius,
        fill: Some(color.to_string()),
        stroke: None,
        stroke_width: 0.0,
        opacity: 1.0,
    }
}

/// One scan pulse: three staggered rings expanding and fading.
async fn emit_scan_pulse(ctx: &EffectContext, center: Position) {
    let rings = (0..3u32).map(|index| {
        let ctx = ctx.clone();
        async move {
            if !ctx.tick(PULSE_STAGGER * index).await {
                return;
            }
            let id = ctx.add(ring(center, SCAN_RING_COLORS[index as usize % 3]));
            ctx.render();
            let target = TargetProps {
                radius: Some(PULSE_MAX_RADIUS + f64::from(index) * 10.0),
                opacity: Some(0.0),
                ..TargetProps::default()
            };
            ctx.animate(id, target, PULSE_DURATION).await;
            ctx.remove(id);
            ctx.render();
        }
    });
    join_all(rings).await;
}

/// Single scan pulse on a device, for `run_once`.
pub fn scanning_pulse(center: Position) -> impl FnOnce(EffectContext) -> SequenceFuture {
    move |ctx| {
        async move {
            emit_scan_pulse(&ctx, center).await;
            Ok(())
        }
        .boxed()
    }
}

/// Repeating scan over one device, for `start_named`.
///
/// Pulses, then re-arms itself every `interval` until stopped.
pub fn continuous_scan(
    center: Position,
    interval: Duration,
) -> impl FnOnce(EffectContext) -> SequenceFuture {
    move |ctx| {
        async move {
            loop {
                emit_scan_pulse(&ctx, center).await;
                if !ctx.tick(interval).await {
                    return Ok(());
                }
            }
        }
        .boxed()
    }
}

/// Attack path travel: a dashed line extends from source to target,
/// a payload dot follows it, and an impact burst lands on the target.
pub fn attack_path(from: Position, to: Position) -> impl FnOnce(EffectContext) -> SequenceFuture {
    move |ctx| {
        async move {
            let line = ctx.add(Shape::Line {
                from,
                to: from,
                stroke: ATTACK_PATH_COLOR.to_string(),
                width: 3.0,
                dash: Some(vec![10.0, 5.0]),
                opacity: 0.8,
            });
            ctx.render();
            let extend = TargetProps {
                line_end: Some(to),
                opacity: Some(1.0),
                ..TargetProps::default()
            };
            ctx.animate(line, extend, PATH_EXTEND_DURATION).await;

            let packet = ctx.add(dot(from, 8.0, PACKET_COLOR));
            ctx.render();
            ctx.animate(packet, TargetProps::move_to(to), PACKET_DURATION)
                .await;
            ctx.remove(packet);

            emit_impact_burst(&ctx, to).await;

            ctx.tick(PATH_LINGER).await;
            ctx.remove(line);
            ctx.render();
            Ok(())
        }
        .boxed()
    }
}

/// Impact burst: three concentric rings flashing outward.
async fn emit_impact_burst(ctx: &EffectContext, at: Position) {
    let bursts = (0..3u32).map(|index| {
        let ctx = ctx.clone();
        async move {
            if !ctx.tick(Duration::from_millis(100) * index).await {
                return;
            }
            let id = ctx.add(Shape::Circle {
                center: at,
                radius: 2.0,
                fill: None,
                stroke: Some(ATTACK_PATH_COLOR.to_string()),
                stroke_width: 2.0,
                opacity: 0.6,
            });
            ctx.render();
            let target = TargetProps {
                radius: Some(15.0 + f64::from(index) * 5.0),
                opacity: Some(0.0),
                ..TargetProps::default()
            };
            ctx.animate(id, target, IMPACT_DURATION).await;
            ctx.remove(id);
            ctx.render();
        }
    });
    join_all(bursts).await;
}

/// Steady glow around a targeted device; holds until stopped.
pub fn node_glow(center: Position, radius: f64) -> impl FnOnce(EffectContext) -> SequenceFuture {
    status_glow(center, radius, TARGETED_COLOR, false)
}

/// Glow plus repeating outward pulse for a compromised device; holds
/// until stopped.
pub fn compromised_pulse(
    center: Position,
    radius: f64,
) -> impl FnOnce(EffectContext) -> SequenceFuture {
    status_glow(center, radius, COMPROMISED_COLOR, true)
}

fn status_glow(
    center: Position,
    radius: f64,
    color: &'static str,
    pulsing: bool,
) -> impl FnOnce(EffectContext) -> SequenceFuture {
    move |ctx| {
        async move {
            let glow = ctx.add(Shape::Circle {
                center,
                radius: radius + 10.0,
                fill: None,
                stroke: Some(color.to_string()),
                stroke_width: 3.0,
                opacity: 0.6,
            });
            ctx.render();

            if pulsing {
                loop {
                    let pulse = ctx.add(ring(center, color));
                    let target = TargetProps {
                        radius: Some(radius + 20.0),
                        opacity: Some(0.0),
                        ..TargetProps::default()
                    };
                    ctx.animate(pulse, target, GLOW_PULSE_DURATION).await;
                    ctx.remove(pulse);
                    ctx.render();
                    if !ctx.tick(GLOW_PULSE_GAP).await {
                        break;
                    }
                }
            } else {
                while ctx.tick(Duration::from_secs(1)).await {}
            }

            ctx.remove(glow);
            ctx.render();
            Ok(())
        }
        .boxed()
    }
}

/// Activity indicator above a device that is "working" (payload
/// generation, analysis); fades after `duration`, for `run_once`.
pub fn thinking_indicator(
    center: Position,
    duration: Duration,
) -> impl FnOnce(EffectContext) -> SequenceFuture {
    move |ctx| {
        async move {
            let above = Position::new(center.x, center.y - 35.0);
            let halo = ctx.add(Shape::Circle {
                center: above,
                radius: 18.0,
                fill: None,
                stroke: Some("rgba(255, 255, 255, 0.3)".to_string()),
                stroke_width: 3.0,
                opacity: 1.0,
            });
            let label = ctx.add(Shape::Text {
                at: above,
                content: "...".to_string(),
                size: 16.0,
                fill: NEUTRAL_COLOR.to_string(),
                opacity: 1.0,
            });
            ctx.render();

            // Slow breathing until the hold expires.
            let mut remaining = duration;
            while !remaining.is_zero() {
                let step = remaining.min(Duration::from_millis(500));
                ctx.animate(halo, TargetProps::fade_to(0.4), step / 2).await;
                ctx.animate(halo, TargetProps::fade_to(1.0), step / 2).await;
                remaining = remaining.saturating_sub(step);
                if ctx.is_cancelled() {
                    break;
                }
            }

            ctx.remove(label);
            ctx.remove(halo);
            ctx.render();
            Ok(())
        }
        .boxed()
    }
}

/// Exfiltration train: a run of small data packets from the target back
/// to the attacker, for `run_once`.
pub fn data_exfiltration(
    from: Position,
    to: Position,
    packets: usize,
) -> impl FnOnce(EffectContext) -> SequenceFuture {
    move |ctx| {
        async move {
            let count = u32::try_from(packets).unwrap_or(u32::MAX);
            let train = (0..count).map(|index| {
                let ctx = ctx.clone();
                async move {
                    if !ctx.tick(EXFIL_PACKET_STAGGER * index).await {
                        return;
                    }
                    let packet = ctx.add(Shape::Rect {
                        center: from,
                        width: 12.0,
                        height: 8.0,
                        fill: DATA_PACKET_COLOR.to_string(),
                        opacity: 1.0,
                    });
                    ctx.render();
                    ctx.animate(packet, TargetProps::move_to(to), EXFIL_PACKET_DURATION)
                        .await;
                    ctx.remove(packet);
                    ctx.render();
                }
            });
            join_all(train).await;
            Ok(())
        }
        .boxed()
    }
}

/// Success marker popping over a device, for `run_once`.
pub fn success_marker(center: Position) -> impl FnOnce(EffectContext) -> SequenceFuture {
    result_marker(center, "\u{2713}", SUCCESS_COLOR)
}

/// Failure marker popping over a device, for `run_once`.
pub fn failure_marker(center: Position) -> impl FnOnce(EffectContext) -> SequenceFuture {
    result_marker(center, "\u{2715}", FAILURE_COLOR)
}

/// Neutral activity blip used when a log line matches no keyword
/// family, for `run_once`.
pub fn activity_marker(center: Position) -> impl FnOnce(EffectContext) -> SequenceFuture {
    move |ctx| {
        async move {
            let blip = ctx.add(ring(center, NEUTRAL_COLOR));
            ctx.render();
            let target = TargetProps {
                radius: Some(15.0),
                opacity: Some(0.0),
                ..TargetProps::default()
            };
            ctx.animate(blip, target, IMPACT_DURATION).await;
            ctx.remove(blip);
            ctx.render();
            Ok(())
        }
        .boxed()
    }
}

fn result_marker(
    center: Position,
    glyph: &'static str,
    color: &'static str,
) -> impl FnOnce(EffectContext) -> SequenceFuture {
    move |ctx| {
        async move {
            let at = Position::new(center.x, center.y - 40.0);
            let marker = ctx.add(Shape::Text {
                at,
                content: glyph.to_string(),
                size: 28.0,
                fill: color.to_string(),
                opacity: 0.0,
            });
            ctx.render();
            ctx.animate(marker, TargetProps::fade_to(1.0), MARKER_FADE).await;
            ctx.tick(MARKER_HOLD).await;
            let away = TargetProps {
                center: Some(Position::new(at.x, at.y - 20.0)),
                opacity: Some(0.0),
                ..TargetProps::default()
            };
            ctx.animate(marker, away, MARKER_FADE).await;
            ctx.remove(marker);
            ctx.render();
            Ok(())
        }
        .boxed()
    }
}

/// Background traffic between a set of devices, for `start_named`.
///
/// Cycles through endpoint pairs deterministically, sending one packet
/// per `interval` until stopped. Needs at least two endpoints; with
/// fewer the sequence retires immediately.
pub fn network_traffic(
    endpoints: Vec<Position>,
    interval: Duration,
) -> impl FnOnce(EffectContext) -> SequenceFuture {
    move |ctx| {
        async move {
            if endpoints.len() < 2 {
                return Ok(());
            }
            let mut step = 0usize;
            loop {
                let from = endpoints[step % endpoints.len()];
                let to = endpoints[(step + 1) % endpoints.len()];
                let color = TRAFFIC_COLORS[step % TRAFFIC_COLORS.len()];
                step = step.wrapping_add(1);

                let packet = ctx.add(dot(from, 3.0, color));
                ctx.render();
                ctx.animate(packet, TargetProps::move_to(to), TRAFFIC_PACKET_DURATION)
                    .await;
                ctx.remove(packet);
                ctx.render();

                if !ctx.tick(interval).await {
                    return Ok(());
                }
            }
        }
        .boxed()
    }
}
