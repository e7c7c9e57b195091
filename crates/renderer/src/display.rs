//! On-screen presentation of a composite over a transparency checkerboard.

use model::blend::source_over;
use model::{Color, Offset, PixelBuffer};

pub const CHECKER_CELL_SIZE: u32 = 8;
pub const CHECKER_LIGHT: Color = Color::rgb(255, 255, 255);
pub const CHECKER_DARK: Color = Color::rgb(204, 204, 204);

/// Checker color of canvas pixel `(x, y)`.
pub fn checker_color(x: i64, y: i64) -> Color {
    let cell = i64::from(CHECKER_CELL_SIZE);
    if (x.div_euclid(cell) + y.div_euclid(cell)).rem_euclid(2) == 0 {
        CHECKER_LIGHT
    } else {
        CHECKER_DARK
    }
}

/// Lays `composite` over the checkerboard. `origin` is the canvas position of
/// the composite's top-left pixel so the pattern stays anchored to the canvas.
pub fn present_over_checkerboard(composite: &PixelBuffer, origin: Offset) -> PixelBuffer {
    let mut output = composite.clone();
    for y in 0..composite.height() {
        for x in 0..composite.width() {
            let canvas_x = i64::from(origin.x) + i64::from(x);
            let canvas_y = i64::from(origin.y) + i64::from(y);
            let mut pixel = checker_color(canvas_x, canvas_y).to_rgba16();
            if let Some(source) = composite.pixel(x, y) {
                source_over(&mut pixel, source, 1.0);
            }
            output.set_pixel(x, y, pixel);
        }
    }
    output.take_dirty_rows();
    output
}
