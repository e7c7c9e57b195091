//! Brush and eraser rasterization.
//!
//! A stroke segment is drawn as evenly spaced disc stamps between two pointer
//! samples. The engine only sees a pixel buffer in layer-local coordinates;
//! lock checks and canvas-to-layer translation belong to the caller.

use model::blend::{destination_out, source_over};
use model::{BrushConfig, Color, Offset, PixelBuffer, Point};
use serde::{Deserialize, Serialize};
use tracing::trace;

pub const DEFAULT_SPACING_FRACTION: f32 = 0.25;
pub const DEFAULT_START_ALPHA: u8 = 255;

/// Alpha profile between the hard core and the disc edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FalloffMode {
    /// Linear ramp from `start_alpha` down to `start_alpha * hardness / 100`.
    #[default]
    SoftFloor,
    /// Linear ramp from `start_alpha` down to zero.
    FadeToTransparent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintEngineConfig {
    /// Stamp spacing as a fraction of the brush radius.
    pub spacing_fraction: f32,
    pub start_alpha: u8,
    pub falloff: FalloffMode,
}

impl Default for PaintEngineConfig {
    fn default() -> Self {
        Self {
            spacing_fraction: DEFAULT_SPACING_FRACTION,
            start_alpha: DEFAULT_START_ALPHA,
            falloff: FalloffMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum PaintEngineConfigError {
    #[error("stamp spacing fraction {spacing_fraction} must be finite and positive")]
    SpacingInvalid { spacing_fraction: f32 },
}

/// One pointer-move increment of a brush or eraser gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSegment {
    pub start: Point,
    pub end: Point,
    pub color: Color,
    pub brush: BrushConfig,
    pub erase: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrokeReport {
    pub stamp_count: usize,
    pub touched_pixels: usize,
}

/// Maps a canvas point into the local space of a layer placed at `position`
/// with uniform `scale`.
pub fn to_layer_space(point: Point, position: Offset, scale: f32) -> Point {
    let scale = if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    };
    Point::new(
        (point.x - position.x as f32) / scale,
        (point.y - position.y as f32) / scale,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PaintEngine {
    config: PaintEngineConfig,
}

impl PaintEngine {
    pub fn new(config: PaintEngineConfig) -> Result<Self, PaintEngineConfigError> {
        if !config.spacing_fraction.is_finite() || config.spacing_fraction <= 0.0 {
            return Err(PaintEngineConfigError::SpacingInvalid {
                spacing_fraction: config.spacing_fraction,
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> PaintEngineConfig {
        self.config
    }

    /// Distance between consecutive stamps, never below one pixel.
    pub fn stamp_step(&self, width: u32) -> f32 {
        (width as f32 * self.config.spacing_fraction).max(1.0)
    }

    pub fn stamp_count(&self, start: Point, end: Point, width: u32) -> usize {
        let distance = start.distance(end);
        if !distance.is_finite() {
            return 1;
        }
        let steps = (distance / self.stamp_step(width)).floor() as usize;
        steps.saturating_add(1).max(1)
    }

    /// Stamp coverage in `0.0..=1.0` at `distance` from the stamp centre.
    pub fn stamp_alpha(&self, distance: f32, width: u32, hardness: u8) -> f32 {
        let radius = width as f32;
        if distance > radius {
            return 0.0;
        }
        let start = f32::from(self.config.start_alpha) / 255.0;
        let hardness = f32::from(hardness.min(100)) / 100.0;
        let core = radius * hardness;
        if distance <= core {
            return start;
        }
        let edge = match self.config.falloff {
            FalloffMode::SoftFloor => start * hardness,
            FalloffMode::FadeToTransparent => 0.0,
        };
        let t = (distance - core) / (radius - core);
        start + (edge - start) * t
    }

    /// Rasterizes one segment into `buffer`, which is in layer-local space.
    pub fn stroke(&self, buffer: &mut PixelBuffer, segment: &StrokeSegment) -> StrokeReport {
        let width = segment.brush.width();
        let stamp_count = self.stamp_count(segment.start, segment.end, width);
        let mut report = StrokeReport {
            stamp_count,
            touched_pixels: 0,
        };
        for stamp_index in 0..stamp_count {
            let t = if stamp_count > 1 {
                stamp_index as f32 / (stamp_count - 1) as f32
            } else {
                0.0
            };
            let centre = segment.start.lerp(segment.end, t);
            report.touched_pixels += self.stamp(buffer, centre, segment);
        }
        trace!(
            stamps = report.stamp_count,
            touched = report.touched_pixels,
            erase = segment.erase,
            "stroke segment rasterized"
        );
        report
    }

    fn stamp(&self, buffer: &mut PixelBuffer, centre: Point, segment: &StrokeSegment) -> usize {
        if buffer.is_empty() || !centre.x.is_finite() || !centre.y.is_finite() {
            return 0;
        }
        let width = segment.brush.width();
        let hardness = segment.brush.hardness();
        let radius = width as f32;
        let min_x = (centre.x - radius).floor().max(0.0);
        let min_y = (centre.y - radius).floor().max(0.0);
        let max_x = (centre.x + radius).ceil().min((buffer.width() - 1) as f32);
        let max_y = (centre.y + radius).ceil().min((buffer.height() - 1) as f32);
        if min_x > max_x || min_y > max_y {
            return 0;
        }
        let source = segment.color.to_rgba16();
        let mut touched = 0;
        for y in min_y as u32..=max_y as u32 {
            for x in min_x as u32..=max_x as u32 {
                let pixel_centre = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                let alpha = self.stamp_alpha(centre.distance(pixel_centre), width, hardness);
                if alpha <= 0.0 {
                    continue;
                }
                let Some(pixel) = buffer.pixel_mut(x, y) else {
                    continue;
                };
                if segment.erase {
                    destination_out(pixel, alpha);
                } else {
                    source_over(pixel, source, alpha);
                }
                touched += 1;
            }
        }
        touched
    }
}
