use serde::{Deserialize, Serialize};

/// Largest accepted side of a canvas or rectangle.
pub const MAX_DIMENSION: u32 = 32_768;
/// Largest accepted pixel count of a canvas, rectangle or pixel buffer
/// (8192 x 8192).
pub const MAX_PIXEL_COUNT: u64 = 1 << 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("canvas size {width}x{height} must be positive")]
    NonPositiveCanvas { width: i64, height: i64 },
    #[error("rectangle {width}x{height} at ({x}, {y}) is degenerate")]
    DegenerateRect {
        x: i32,
        y: i32,
        width: i64,
        height: i64,
    },
    #[error(
        "size {width}x{height} exceeds the limit of {MAX_DIMENSION} per side or {MAX_PIXEL_COUNT} pixels"
    )]
    TooLarge { width: i64, height: i64 },
    #[error(
        "rectangle {width}x{height} at ({x}, {y}) lies outside the {canvas_width}x{canvas_height} canvas"
    )]
    OutsideCanvas {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        canvas_width: u32,
        canvas_height: u32,
    },
}

/// Checks a positive extent against [`MAX_DIMENSION`] and [`MAX_PIXEL_COUNT`].
fn bounded_extent(width: i64, height: i64) -> Result<(u32, u32), GeometryError> {
    let too_large = GeometryError::TooLarge { width, height };
    let side = |value: i64| {
        u32::try_from(value)
            .ok()
            .filter(|&bounded| bounded <= MAX_DIMENSION)
            .ok_or(too_large)
    };
    let (bounded_width, bounded_height) = (side(width)?, side(height)?);
    if u64::from(bounded_width) * u64::from(bounded_height) > MAX_PIXEL_COUNT {
        return Err(too_large);
    }
    Ok((bounded_width, bounded_height))
}

/// Sub-pixel position in canvas or layer space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// Whole-pixel translation of a layer relative to the canvas origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned pixel rectangle. Width and height are positive and within
/// [`MAX_DIMENSION`] and [`MAX_PIXEL_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i64, height: i64) -> Result<Self, GeometryError> {
        if width <= 0 || height <= 0 {
            return Err(GeometryError::DegenerateRect {
                x,
                y,
                width,
                height,
            });
        }
        let (width, height) = bounded_extent(width, height)?;
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= i64::from(self.x) && x < self.right() && y >= i64::from(self.y) && y < self.bottom()
    }
}

/// Canvas dimensions of a document. Always strictly positive and within
/// [`MAX_DIMENSION`] and [`MAX_PIXEL_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasSize {
    width: u32,
    height: u32,
}

impl CanvasSize {
    pub fn new(width: i64, height: i64) -> Result<Self, GeometryError> {
        if width <= 0 || height <= 0 {
            return Err(GeometryError::NonPositiveCanvas { width, height });
        }
        let (width, height) = bounded_extent(width, height)?;
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn full_rect(&self) -> Rect {
        Rect {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        }
    }

    /// Returns `rect` when it lies entirely inside the canvas.
    pub fn check_within(&self, rect: Rect) -> Result<Rect, GeometryError> {
        let inside = rect.x >= 0
            && rect.y >= 0
            && rect.right() <= i64::from(self.width)
            && rect.bottom() <= i64::from(self.height);
        if !inside {
            return Err(GeometryError::OutsideCanvas {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                canvas_width: self.width,
                canvas_height: self.height,
            });
        }
        Ok(rect)
    }

    /// Reduced `w:h` label, e.g. `16:9` for 1920x1080.
    pub fn aspect_ratio_label(&self) -> String {
        let divisor = gcd(self.width, self.height);
        format!("{}:{}", self.width / divisor, self.height / divisor)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let remainder = a % b;
        a = b;
        b = remainder;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_label_reduces_by_gcd() {
        let hd = CanvasSize::new(1920, 1080).expect("valid canvas");
        assert_eq!(hd.aspect_ratio_label(), "16:9");
        let square = CanvasSize::new(1280, 1280).expect("valid canvas");
        assert_eq!(square.aspect_ratio_label(), "1:1");
        let odd = CanvasSize::new(7, 3).expect("valid canvas");
        assert_eq!(odd.aspect_ratio_label(), "7:3");
    }

    #[test]
    fn canvas_rejects_non_positive_dimensions() {
        assert_eq!(
            CanvasSize::new(0, 10).expect_err("zero width must fail"),
            GeometryError::NonPositiveCanvas {
                width: 0,
                height: 10
            }
        );
        CanvasSize::new(10, -1).expect_err("negative height must fail");
    }

    #[test]
    fn rect_rejects_degenerate_extent_and_reports_edges() {
        Rect::new(0, 0, 0, 5).expect_err("zero width rect must fail");
        let rect = Rect::new(-2, 3, 4, 5).expect("valid rect");
        assert_eq!(rect.right(), 2);
        assert_eq!(rect.bottom(), 8);
        assert!(rect.contains(-2, 3));
        assert!(!rect.contains(2, 3));
    }

    #[test]
    fn oversized_extents_are_rejected() {
        let huge = 1_i64 << 20;
        assert_eq!(
            Rect::new(0, 0, huge, huge).expect_err("huge rect must fail"),
            GeometryError::TooLarge {
                width: huge,
                height: huge
            }
        );
        CanvasSize::new(i64::from(u32::MAX) + 1, 1).expect_err("past u32 must fail");
        CanvasSize::new(i64::from(MAX_DIMENSION) + 1, 1).expect_err("side limit");
        // Each side fits but the area does not.
        CanvasSize::new(20_000, 20_000).expect_err("pixel count limit");
        CanvasSize::new(8192, 8192).expect("largest square canvas");
        Rect::new(-5, -5, i64::from(MAX_DIMENSION), 16).expect("long strip");
    }

    #[test]
    fn check_within_accepts_only_contained_rects() {
        let canvas = CanvasSize::new(100, 50).expect("valid canvas");
        let inside = Rect::new(10, 10, 90, 40).expect("valid rect");
        assert_eq!(canvas.check_within(inside), Ok(inside));
        assert_eq!(canvas.check_within(canvas.full_rect()), Ok(canvas.full_rect()));

        let outside = [
            (-1, 0, 10, 10),
            (95, 0, 10, 10),
            (0, 45, 10, 10),
            (200, 200, 1, 1),
        ];
        for (x, y, width, height) in outside {
            let rect = Rect::new(x, y, width, height).expect("valid rect");
            assert!(matches!(
                canvas.check_within(rect),
                Err(GeometryError::OutsideCanvas { .. })
            ));
        }
    }

    #[test]
    fn point_lerp_and_distance() {
        let start = Point::new(0.0, 0.0);
        let end = Point::new(3.0, 4.0);
        assert_eq!(start.distance(end), 5.0);
        assert_eq!(start.lerp(end, 0.5), Point::new(1.5, 2.0));
    }
}
