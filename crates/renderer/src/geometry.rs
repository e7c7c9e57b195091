//! Canvas-space placement of layer sources.
//!
//! A layer source of `width x height` pixels placed at `position` with uniform
//! `scale` covers canvas pixel `(cx, cy)` when the pixel centre maps inside the
//! source; sampling is nearest-neighbour.

use model::{Offset, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: i64,
    pub(crate) end: i64,
}

impl Span {
    pub(crate) fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub(crate) position: Offset,
    pub(crate) scale: f32,
    pub(crate) source_width: u32,
    pub(crate) source_height: u32,
}

impl Placement {
    pub(crate) fn new(position: Offset, scale: f32, source_width: u32, source_height: u32) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Self {
            position,
            scale,
            source_width,
            source_height,
        }
    }

    /// Canvas columns the placed source can touch, clipped to `target`.
    pub(crate) fn columns(&self, target: Rect) -> Span {
        clip_axis(
            self.position.x,
            self.source_width,
            self.scale,
            i64::from(target.x()),
            target.right(),
        )
    }

    pub(crate) fn rows(&self, target: Rect) -> Span {
        clip_axis(
            self.position.y,
            self.source_height,
            self.scale,
            i64::from(target.y()),
            target.bottom(),
        )
    }

    pub(crate) fn source_x(&self, canvas_x: i64) -> Option<u32> {
        sample_axis(canvas_x, self.position.x, self.scale, self.source_width)
    }

    pub(crate) fn source_y(&self, canvas_y: i64) -> Option<u32> {
        sample_axis(canvas_y, self.position.y, self.scale, self.source_height)
    }
}

fn clip_axis(origin: i32, length: u32, scale: f32, target_start: i64, target_end: i64) -> Span {
    let origin = i64::from(origin);
    let extent = (f64::from(length) * f64::from(scale)).ceil() as i64;
    Span {
        start: origin.max(target_start),
        end: origin.saturating_add(extent).min(target_end),
    }
}

fn sample_axis(canvas: i64, origin: i32, scale: f32, length: u32) -> Option<u32> {
    let local = ((canvas - i64::from(origin)) as f64 + 0.5) / f64::from(scale);
    let local = local.floor();
    if local < 0.0 || local >= f64::from(length) {
        return None;
    }
    Some(local as u32)
}

/// Largest size with the source aspect ratio that fits a `bound x bound` box.
pub(crate) fn fit_within(width: u32, height: u32, bound: u32) -> (u32, u32) {
    if width == 0 || height == 0 || bound == 0 {
        return (0, 0);
    }
    let fit = |major: u32, minor: u32| {
        let scaled = (f64::from(minor) * f64::from(bound) / f64::from(major) + 0.5).floor();
        (scaled as u32).clamp(1, bound)
    };
    if width >= height {
        (bound, fit(width, height))
    } else {
        (fit(height, width), bound)
    }
}
