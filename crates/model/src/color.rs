use serde::{Deserialize, Serialize};

/// 8-bit straight-alpha color as chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const RED: Self = Self::rgb(255, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba16(self) -> [u16; 4] {
        [
            channel_to_u16(self.r),
            channel_to_u16(self.g),
            channel_to_u16(self.b),
            channel_to_u16(self.a),
        ]
    }

    pub fn from_rgba16(pixel: [u16; 4]) -> Self {
        Self::rgba(
            channel_to_u8(pixel[0]),
            channel_to_u8(pixel[1]),
            channel_to_u8(pixel[2]),
            channel_to_u8(pixel[3]),
        )
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

pub fn channel_to_u16(value: u8) -> u16 {
    u16::from(value) * 257
}

pub fn channel_to_u8(value: u16) -> u8 {
    ((u32::from(value) * 255 + 32_767) / 65_535) as u8
}

/// Rounds a channel value in `0.0..=65535.0` half-up and saturates.
pub fn round_half_up(value: f32) -> u16 {
    if !value.is_finite() {
        return 0;
    }
    (value + 0.5).floor().clamp(0.0, 65_535.0) as u16
}
