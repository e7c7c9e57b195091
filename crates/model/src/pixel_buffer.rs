use std::io::{BufRead, Seek};

use bitvec::prelude::{BitVec, Lsb0};
use image::error::{ImageError, LimitError, LimitErrorKind};
use image::{ImageBuffer, ImageReader, Limits, Rgba, RgbaImage};

use crate::color::{Color, channel_to_u8};
use crate::geometry::{MAX_DIMENSION, MAX_PIXEL_COUNT, Rect};

pub const CHANNELS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PixelBufferError {
    #[error("pixel data holds {actual} samples, expected {expected} for {width}x{height}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("pixel buffer {width}x{height} exceeds the {MAX_PIXEL_COUNT} pixel limit")]
    TooLarge { width: u32, height: u32 },
}

/// Inclusive range of rows touched since the last [`PixelBuffer::take_dirty_rows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub first: u32,
    pub last: u32,
}

/// Row-major, straight-alpha RGBA buffer with 16 bits per channel.
///
/// 16-bit storage keeps repeated soft-brush stamping and layer compositing
/// from banding.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    samples: Box<[u16]>,
    // dirty_rows.len() == height
    dirty_rows: BitVec<usize, Lsb0>,
}

impl PartialEq for PixelBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.samples == other.samples
    }
}

impl Eq for PixelBuffer {}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Result<Self, PixelBufferError> {
        Self::filled(width, height, Color::TRANSPARENT)
    }

    pub fn filled(width: u32, height: u32, color: Color) -> Result<Self, PixelBufferError> {
        let sample_count = sample_count(width, height)?;
        Ok(Self::allocate(width, height, sample_count, color))
    }

    /// Buffer the size of `rect`. Cannot fail: [`Rect`] is bounded by
    /// [`MAX_PIXEL_COUNT`].
    pub fn covering(rect: Rect, color: Color) -> Self {
        let (width, height) = (rect.width(), rect.height());
        let sample_count = width as usize * height as usize * CHANNELS;
        Self::allocate(width, height, sample_count, color)
    }

    fn allocate(width: u32, height: u32, sample_count: usize, color: Color) -> Self {
        let pixel = color.to_rgba16();
        let mut samples = Vec::with_capacity(sample_count);
        for _ in 0..sample_count / CHANNELS {
            samples.extend_from_slice(&pixel);
        }
        Self {
            width,
            height,
            samples: samples.into_boxed_slice(),
            dirty_rows: BitVec::repeat(false, height as usize),
        }
    }

    pub fn from_rgba16(
        width: u32,
        height: u32,
        samples: Vec<u16>,
    ) -> Result<Self, PixelBufferError> {
        let expected = sample_count(width, height)?;
        if samples.len() != expected {
            return Err(PixelBufferError::LengthMismatch {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples: samples.into_boxed_slice(),
            dirty_rows: BitVec::repeat(false, height as usize),
        })
    }

    pub fn from_image(image: ImageBuffer<Rgba<u16>, Vec<u16>>) -> Self {
        let (width, height) = image.dimensions();
        let samples = image.into_raw();
        Self {
            width,
            height,
            samples: samples.into_boxed_slice(),
            dirty_rows: BitVec::repeat(false, height as usize),
        }
    }

    /// Decodes an encoded image of any enabled format. Images beyond
    /// [`MAX_DIMENSION`] or [`MAX_PIXEL_COUNT`] are refused before their
    /// 16-bit pixels are allocated.
    pub fn decode<R: BufRead + Seek>(mut reader: ImageReader<R>) -> Result<Self, ImageError> {
        let mut limits = Limits::default();
        limits.max_image_width = Some(MAX_DIMENSION);
        limits.max_image_height = Some(MAX_DIMENSION);
        limits.max_alloc = Some(MAX_PIXEL_COUNT * (CHANNELS * 2) as u64);
        reader.limits(limits);
        let image = reader.decode()?;
        if sample_count(image.width(), image.height()).is_err() {
            return Err(ImageError::Limits(LimitError::from_kind(
                LimitErrorKind::DimensionError,
            )));
        }
        Ok(Self::from_image(image.into_rgba16()))
    }

    pub fn to_image_rgba16(&self) -> ImageBuffer<Rgba<u16>, Vec<u16>> {
        ImageBuffer::from_raw(self.width, self.height, self.samples.to_vec())
            .unwrap_or_else(|| unreachable!("sample count matches dimensions by construction"))
    }

    pub fn to_image_rgba8(&self) -> RgbaImage {
        let bytes = self.samples.iter().map(|&sample| channel_to_u8(sample)).collect();
        RgbaImage::from_raw(self.width, self.height, bytes)
            .unwrap_or_else(|| unreachable!("sample count matches dimensions by construction"))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_raw(&self) -> &[u16] {
        &self.samples
    }

    fn sample_index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * CHANNELS)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u16; 4]> {
        let index = self.sample_index(x, y)?;
        let mut pixel = [0; CHANNELS];
        pixel.copy_from_slice(&self.samples[index..index + CHANNELS]);
        Some(pixel)
    }

    pub fn pixel_rgba8(&self, x: u32, y: u32) -> Option<Color> {
        self.pixel(x, y).map(Color::from_rgba16)
    }

    /// Mutable access to one pixel. Marks its row dirty.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u16; 4]> {
        let index = self.sample_index(x, y)?;
        self.dirty_rows.set(y as usize, true);
        <&mut [u16; CHANNELS]>::try_from(&mut self.samples[index..index + CHANNELS]).ok()
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: [u16; 4]) -> bool {
        match self.pixel_mut(x, y) {
            Some(slot) => {
                *slot = pixel;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, color: Color) {
        let pixel = color.to_rgba16();
        for chunk in self.samples.chunks_exact_mut(CHANNELS) {
            chunk.copy_from_slice(&pixel);
        }
        self.dirty_rows.fill(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_rows.any()
    }

    pub fn dirty_rows(&self) -> Option<RowSpan> {
        let first = self.dirty_rows.first_one()?;
        let last = self.dirty_rows.last_one()?;
        Some(RowSpan {
            first: first as u32,
            last: last as u32,
        })
    }

    pub fn take_dirty_rows(&mut self) -> Option<RowSpan> {
        let span = self.dirty_rows();
        self.dirty_rows.fill(false);
        span
    }

    /// Count of pixels whose alpha is non-zero.
    pub fn opaque_pixel_count(&self) -> usize {
        self.samples
            .chunks_exact(CHANNELS)
            .filter(|pixel| pixel[3] != 0)
            .count()
    }
}

fn sample_count(width: u32, height: u32) -> Result<usize, PixelBufferError> {
    let too_large = PixelBufferError::TooLarge { width, height };
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .filter(|&count| count as u64 <= MAX_PIXEL_COUNT)
        .ok_or(too_large)?;
    pixel_count.checked_mul(CHANNELS).ok_or(too_large)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::ImageFormat;

    use super::*;

    fn png_reader(bytes: &[u8]) -> ImageReader<Cursor<&[u8]>> {
        ImageReader::with_format(Cursor::new(bytes), ImageFormat::Png)
    }

    #[test]
    fn decode_widens_eight_bit_images() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(1, 0, Rgba([255, 0, 128, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        let buffer = PixelBuffer::decode(png_reader(&bytes)).expect("decode png");
        assert_eq!((buffer.width(), buffer.height()), (2, 1));
        assert_eq!(buffer.pixel(1, 0), Some([65_535, 0, 32_896, 65_535]));
        assert_eq!(buffer.pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn decode_refuses_images_wider_than_the_limit() {
        let wide = image::GrayImage::new(MAX_DIMENSION + 1, 1);
        let mut bytes = Vec::new();
        wide.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        let error = PixelBuffer::decode(png_reader(&bytes)).expect_err("too wide");
        assert!(matches!(error, ImageError::Limits(_)), "{error:?}");
    }

    #[test]
    fn new_buffer_is_transparent_and_clean() {
        let buffer = PixelBuffer::new(3, 2).expect("small buffer");
        assert_eq!(buffer.as_raw().len(), 3 * 2 * 4);
        assert_eq!(buffer.pixel(2, 1), Some([0, 0, 0, 0]));
        assert_eq!(buffer.pixel(3, 0), None);
        assert!(!buffer.is_dirty());
        assert_eq!(buffer.opaque_pixel_count(), 0);
    }

    #[test]
    fn pixel_mut_tracks_dirty_row_span() {
        let mut buffer = PixelBuffer::new(4, 6).expect("small buffer");
        assert!(buffer.set_pixel(1, 4, [1, 2, 3, 4]));
        assert!(buffer.set_pixel(0, 2, [5, 6, 7, 8]));
        assert!(!buffer.set_pixel(9, 9, [0; 4]));

        assert_eq!(buffer.take_dirty_rows(), Some(RowSpan { first: 2, last: 4 }));
        assert!(!buffer.is_dirty());
        assert_eq!(buffer.pixel(1, 4), Some([1, 2, 3, 4]));
    }

    #[test]
    fn from_rgba16_validates_sample_count() {
        let error = PixelBuffer::from_rgba16(2, 2, vec![0; 15]).expect_err("15 samples is short");
        assert_eq!(
            error,
            PixelBufferError::LengthMismatch {
                width: 2,
                height: 2,
                expected: 16,
                actual: 15,
            }
        );
    }

    #[test]
    fn oversized_buffers_are_refused_before_allocating() {
        assert_eq!(
            PixelBuffer::new(1 << 20, 1 << 20).expect_err("over the pixel limit"),
            PixelBufferError::TooLarge {
                width: 1 << 20,
                height: 1 << 20
            }
        );
        assert!(matches!(
            PixelBuffer::filled(u32::MAX, u32::MAX, Color::RED),
            Err(PixelBufferError::TooLarge { .. })
        ));
        assert!(matches!(
            PixelBuffer::from_rgba16(u32::MAX, 2, Vec::new()),
            Err(PixelBufferError::TooLarge { .. })
        ));
    }

    #[test]
    fn covering_matches_rect_size() {
        let rect = Rect::new(-3, 7, 5, 2).expect("valid rect");
        let buffer = PixelBuffer::covering(rect, Color::WHITE);
        assert_eq!((buffer.width(), buffer.height()), (5, 2));
        assert_eq!(buffer, PixelBuffer::filled(5, 2, Color::WHITE).expect("small buffer"));
        assert!(!buffer.is_dirty());
    }

    #[test]
    fn image_conversion_preserves_sixteen_bit_samples() {
        let mut buffer = PixelBuffer::new(2, 1).expect("small buffer");
        buffer.set_pixel(1, 0, [1000, 2000, 3000, 40_000]);
        let restored = PixelBuffer::from_image(buffer.to_image_rgba16());
        assert_eq!(restored, buffer);

        let bytes = buffer.to_image_rgba8();
        assert_eq!(bytes.get_pixel(1, 0).0, [4, 8, 12, 156]);
    }

    #[test]
    fn equality_ignores_dirty_state() {
        let clean = PixelBuffer::filled(2, 2, Color::RED).expect("small buffer");
        let mut touched = PixelBuffer::new(2, 2).expect("small buffer");
        touched.fill(Color::RED);
        assert!(touched.is_dirty());
        assert_eq!(clean, touched);
    }
}
