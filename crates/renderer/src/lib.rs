//! CPU layer compositor.
//!
//! - `geometry`: canvas placement and nearest-neighbour sampling of layer sources.
//! - `fonts`/`text`: font lookup and glyph rasterization for text layers.
//! - `display`: checkerboard presentation, applied after compositing.
//! - `preview`: per-layer thumbnails keyed on content revision.

pub mod display;
mod fonts;
mod geometry;
mod preview;
mod text;


use std::borrow::Cow;

use document::{Document, Layer, LayerContent, LayerId, LayerStack};
use model::blend::source_over;
use model::{CanvasSize, Color, Offset, PixelBuffer, Rect};
use tracing::{debug, warn};

pub use fonts::{FontBook, FontError};
pub use preview::{DEFAULT_PREVIEW_SIZE, PreviewCache};

use geometry::Placement;
use text::rasterize_text;

pub const COMPOSITE_LAYER_NAME: &str = "Composite";

/// Pixels a layer contributes before placement.
enum LayerSource<'a> {
    Uniform {
        pixel: [u16; 4],
        width: u32,
        height: u32,
    },
    Pixels(Cow<'a, PixelBuffer>),
}

impl LayerSource<'_> {
    fn size(&self) -> (u32, u32) {
        match self {
            LayerSource::Uniform { width, height, .. } => (*width, *height),
            LayerSource::Pixels(pixels) => (pixels.width(), pixels.height()),
        }
    }

    fn pixel(&self, x: u32, y: u32) -> Option<[u16; 4]> {
        match self {
            LayerSource::Uniform { pixel, .. } => Some(*pixel),
            LayerSource::Pixels(pixels) => pixels.pixel(x, y),
        }
    }
}

/// Flattens a layer stack into a single bitmap.
///
/// Identical stack state always yields byte-identical output.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    fonts: FontBook,
}

impl Compositor {
    pub fn new(fonts: FontBook) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontBook {
        &mut self.fonts
    }

    /// Composites `target` (default: the whole canvas). With
    /// `background_visible` the result is presented over a checkerboard for
    /// display; without it transparent pixels stay transparent for export.
    pub fn render(
        &self,
        stack: &LayerStack,
        canvas: CanvasSize,
        target: Option<Rect>,
        background_visible: bool,
    ) -> PixelBuffer {
        let target = target.unwrap_or_else(|| canvas.full_rect());
        let composite = self.composite(stack, canvas, target);
        if background_visible {
            display::present_over_checkerboard(&composite, Offset::new(target.x(), target.y()))
        } else {
            composite
        }
    }

    pub fn render_document(
        &self,
        document: &Document,
        target: Option<Rect>,
        background_visible: bool,
    ) -> PixelBuffer {
        self.render(
            document.layers(),
            document.canvas(),
            target,
            background_visible,
        )
    }

    /// Source-over of every visible layer, bottom to top, modulated by opacity.
    pub fn composite(&self, stack: &LayerStack, canvas: CanvasSize, target: Rect) -> PixelBuffer {
        let mut output = PixelBuffer::covering(target, Color::TRANSPARENT);
        let mut drawn = 0usize;
        for (_, layer) in stack.iter_bottom_to_top() {
            if !layer.visible() || layer.opacity() <= 0.0 {
                continue;
            }
            let Some((source, scale)) = self.layer_source(layer, canvas) else {
                continue;
            };
            let (width, height) = source.size();
            let placement = Placement::new(layer.position(), scale, width, height);
            blend_layer(&mut output, target, &source, placement, layer.opacity());
            drawn += 1;
        }
        output.take_dirty_rows();
        debug!(
            layers = drawn,
            width = target.width(),
            height = target.height(),
            "stack composited"
        );
        output
    }

    /// The layer's own pixels in layer space, ignoring visibility, opacity and
    /// placement. Used for previews.
    pub fn render_layer_content(&self, layer: &Layer, canvas: CanvasSize) -> Option<PixelBuffer> {
        let (source, _) = self.layer_source(layer, canvas)?;
        match source {
            LayerSource::Uniform {
                pixel,
                width,
                height,
            } => PixelBuffer::filled(width, height, Color::from_rgba16(pixel)).ok(),
            LayerSource::Pixels(pixels) => Some(pixels.into_owned()),
        }
    }

    /// Source pixels and the scale still to apply when placing them. Text is
    /// rasterized at its final size, so its remaining scale is 1.
    fn layer_source<'a>(
        &self,
        layer: &'a Layer,
        canvas: CanvasSize,
    ) -> Option<(LayerSource<'a>, f32)> {
        match layer.content() {
            LayerContent::Solid { fill_color } => Some((
                LayerSource::Uniform {
                    pixel: fill_color.to_rgba16(),
                    width: canvas.width(),
                    height: canvas.height(),
                },
                layer.scale(),
            )),
            LayerContent::Raster { pixels } => {
                Some((LayerSource::Pixels(Cow::Borrowed(pixels)), layer.scale()))
            }
            LayerContent::Text(content) => {
                let Some(font) = self.fonts.resolve(&content.font_family) else {
                    warn!(
                        layer = layer.name(),
                        family = %content.font_family,
                        "font not available, text layer skipped"
                    );
                    return None;
                };
                let Some(pixels) = rasterize_text(font, content, layer.scale()) else {
                    warn!(
                        layer = layer.name(),
                        size = content.font_pixel_size,
                        scale = layer.scale(),
                        "text exceeds the pixel buffer limit, text layer skipped"
                    );
                    return None;
                };
                Some((LayerSource::Pixels(Cow::Owned(pixels)), 1.0))
            }
        }
    }
}

fn blend_layer(
    output: &mut PixelBuffer,
    target: Rect,
    source: &LayerSource<'_>,
    placement: Placement,
    opacity: f32,
) {
    let rows = placement.rows(target);
    let columns = placement.columns(target);
    if rows.is_empty() || columns.is_empty() {
        return;
    }
    for canvas_y in rows.start..rows.end {
        let Some(source_y) = placement.source_y(canvas_y) else {
            continue;
        };
        let output_y = (canvas_y - i64::from(target.y())) as u32;
        for canvas_x in columns.start..columns.end {
            let Some(source_x) = placement.source_x(canvas_x) else {
                continue;
            };
            let Some(pixel) = source.pixel(source_x, source_y) else {
                continue;
            };
            if pixel[3] == 0 {
                continue;
            }
            let output_x = (canvas_x - i64::from(target.x())) as u32;
            if let Some(destination) = output.pixel_mut(output_x, output_y) {
                source_over(destination, pixel, opacity);
            }
        }
    }
}

/// Appends the flattened canvas as a new raster layer named
/// [`COMPOSITE_LAYER_NAME`] and makes it active.
pub fn flatten_to_layer(compositor: &Compositor, document: &mut Document) -> LayerId {
    let pixels = compositor.composite(
        document.layers(),
        document.canvas(),
        document.canvas().full_rect(),
    );
    let id = document.add_raster_layer(COMPOSITE_LAYER_NAME, pixels);
    debug!(layers = document.layers().len(), "composite layer added");
    id
}
