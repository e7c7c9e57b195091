pub mod blend;
mod color;
mod geometry;
mod pixel_buffer;

pub use color::{Color, channel_to_u16, channel_to_u8, round_half_up};
pub use geometry::{
    CanvasSize, GeometryError, MAX_DIMENSION, MAX_PIXEL_COUNT, Offset, Point, Rect,
};
pub use pixel_buffer::{PixelBuffer, PixelBufferError, RowSpan};

use serde::{Deserialize, Serialize};

pub const DEFAULT_BRUSH_WIDTH: u32 = 4;
pub const DEFAULT_BRUSH_HARDNESS: u8 = 0;
pub const MAX_BRUSH_HARDNESS: u8 = 100;

/// Brush parameters shared by the painting tools.
///
/// `width` is the disc radius in pixels, not the diameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrushConfig {
    width: u32,
    hardness: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BrushConfigError {
    #[error("brush width must be at least one pixel")]
    ZeroWidth,
    #[error("brush hardness {hardness} exceeds 100")]
    HardnessOutOfRange { hardness: u8 },
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_BRUSH_WIDTH,
            hardness: DEFAULT_BRUSH_HARDNESS,
        }
    }
}

impl BrushConfig {
    pub fn new(width: u32, hardness: u8) -> Result<Self, BrushConfigError> {
        if width == 0 {
            return Err(BrushConfigError::ZeroWidth);
        }
        if hardness > MAX_BRUSH_HARDNESS {
            return Err(BrushConfigError::HardnessOutOfRange { hardness });
        }
        Ok(Self { width, hardness })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn hardness(&self) -> u8 {
        self.hardness
    }

    pub fn set_width(&mut self, width: u32) -> Result<(), BrushConfigError> {
        *self = Self::new(width, self.hardness)?;
        Ok(())
    }

    pub fn set_hardness(&mut self, hardness: u8) -> Result<(), BrushConfigError> {
        *self = Self::new(self.width, hardness)?;
        Ok(())
    }
}
