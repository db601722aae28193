//! Per-frame visualisation: a pure mapping from the sampled buffer and the
//! timeline position to drawing commands in canvas coordinates (y down,
//! angles in radians, arcs swept clockwise).

pub mod svg;

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{Rgba, VisualConfig, NEUTRAL_SAMPLE};

/// Arc angle at which the base ring and the progress arc begin.
pub const ARC_START_ANGLE: f64 = PI;

const INNER_RING_RANGE: (f64, f64) = (0.8, 1.1);
const OUTER_RING_RANGE: (f64, f64) = (0.6, 1.3);
const TIMER_BASELINE_OFFSET: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// One drawing primitive. Commands are composited in order, back to front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    FillRect {
        origin: Point,
        width: f64,
        height: f64,
        color: Rgba,
    },
    StrokeArc {
        center: Point,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        line_width: f64,
        color: Rgba,
    },
    StrokePolyline {
        points: Vec<Point>,
        closed: bool,
        line_width: f64,
        color: Rgba,
    },
    /// Text horizontally centred on `anchor`, baseline at `anchor.y`.
    FillText {
        text: String,
        anchor: Point,
        font_size: f64,
        color: Rgba,
    },
}

/// Everything drawn for one display frame. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationFrame {
    pub width: u32,
    pub height: u32,
    pub elapsed_seconds: f64,
    pub commands: Vec<DrawCommand>,
}

/// Inputs of a single render call.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub samples: &'a [u8],
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    pub segment_count: usize,
}

/// Stateless renderer bound to a canvas configuration.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    visual: VisualConfig,
}

impl Renderer {
    pub fn new(visual: VisualConfig) -> Self {
        Self { visual }
    }

    pub fn render(&self, input: &FrameInput<'_>) -> VisualizationFrame {
        render_frame(&self.visual, input)
    }
}

/// Builds the four layers: background with base ring, progress arc, the
/// dual point-circle waveform and the timer text.
pub fn render_frame(visual: &VisualConfig, input: &FrameInput<'_>) -> VisualizationFrame {
    let width = f64::from(visual.width);
    let height = f64::from(visual.height);
    let center = Point::new(width / 2.0, height / 2.0);
    let ring_radius = width / 5.0;
    let wave_radius = width / 3.0;
    let elapsed = if input.elapsed_seconds.is_finite() {
        input.elapsed_seconds.max(0.0)
    } else {
        0.0
    };
    let ring_width = f64::from(visual.ring_width);
    let line_width = f64::from(visual.waveform_line_width);
    let spin = f64::from(visual.spin_degrees_per_second);

    let mut commands = Vec::with_capacity(6);

    commands.push(DrawCommand::FillRect {
        origin: Point::new(0.0, 0.0),
        width,
        height,
        color: visual.background,
    });
    commands.push(DrawCommand::StrokeArc {
        center,
        radius: ring_radius,
        start_angle: ARC_START_ANGLE,
        end_angle: ARC_START_ANGLE + 2.0 * PI,
        line_width: ring_width,
        color: visual.base_ring,
    });

    commands.push(DrawCommand::StrokeArc {
        center,
        radius: ring_radius,
        start_angle: ARC_START_ANGLE,
        end_angle: ARC_START_ANGLE + 2.0 * PI * progress_fraction(elapsed, input.duration_seconds),
        line_width: ring_width,
        color: visual.accent,
    });

    let ring = RingGeometry {
        center,
        radius: wave_radius,
        rotation_degrees: elapsed * spin,
    };
    for range in [INNER_RING_RANGE, OUTER_RING_RANGE] {
        commands.push(DrawCommand::StrokePolyline {
            points: ring.points(input.samples, input.segment_count, range),
            closed: true,
            line_width,
            color: visual.accent,
        });
    }

    commands.push(DrawCommand::FillText {
        text: format_timer(elapsed),
        anchor: Point::new(center.x, center.y + TIMER_BASELINE_OFFSET),
        font_size: f64::from(visual.timer_font_size),
        color: visual.text,
    });

    VisualizationFrame {
        width: visual.width,
        height: visual.height,
        elapsed_seconds: elapsed,
        commands,
    }
}

/// Share of the clip already played, clamped to `[0, 1]`. A zero, negative
/// or non-finite duration yields 0.
pub fn progress_fraction(elapsed: f64, duration: f64) -> f64 {
    if !(duration.is_finite() && duration > 0.0) || !elapsed.is_finite() {
        return 0.0;
    }
    (elapsed / duration).clamp(0.0, 1.0)
}

/// `MM:SS` with whole seconds truncated. Minutes wrap at the hour.
pub fn format_timer(elapsed: f64) -> String {
    let total = if elapsed.is_finite() {
        elapsed.max(0.0).floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", (total / 60) % 60, total % 60)
}

/// Maps a unit `seed` linearly onto `[min, max]`.
pub fn lerp(seed: f64, min: f64, max: f64) -> f64 {
    seed * (max - min) + min
}

#[derive(Debug, Clone, Copy)]
struct RingGeometry {
    center: Point,
    radius: f64,
    rotation_degrees: f64,
}

impl RingGeometry {
    /// One vertex per segment; the closing edge back to vertex 0 is implied
    /// by `closed`. Missing samples read as silence.
    fn points(&self, samples: &[u8], segment_count: usize, (min, max): (f64, f64)) -> Vec<Point> {
        let step = 360.0 / segment_count.max(1) as f64;
        (0..segment_count)
            .map(|i| {
                let sample = samples.get(i).copied().unwrap_or(NEUTRAL_SAMPLE);
                let distance = lerp(f64::from(sample) / 256.0, min, max);
                let angle = -(i as f64) * step;
                let theta = -(angle + self.rotation_degrees).to_radians();
                Point::new(
                    self.center.x + self.radius * theta.cos() * distance,
                    self.center.y + self.radius * theta.sin() * distance,
                )
            })
            .collect()
    }
}
