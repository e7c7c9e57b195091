use std::collections::HashMap;

use document::{LayerId, LayerStack};
use model::{CanvasSize, PixelBuffer};
use tracing::trace;

use crate::Compositor;
use crate::geometry::fit_within;

pub const DEFAULT_PREVIEW_SIZE: u32 = 32;

#[derive(Debug, Clone)]
struct CachedPreview {
    revision: u64,
    thumbnail: PixelBuffer,
}

/// Layer thumbnails for a layer list, regenerated lazily when a layer's
/// content revision moves.
#[derive(Debug, Clone)]
pub struct PreviewCache {
    size: u32,
    entries: HashMap<LayerId, CachedPreview>,
    regenerations: u64,
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_SIZE)
    }
}

impl PreviewCache {
    pub fn new(size: u32) -> Self {
        Self {
            size: size.max(1),
            entries: HashMap::new(),
            regenerations: 0,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of thumbnails built since creation.
    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }

    pub fn preview(
        &mut self,
        compositor: &Compositor,
        stack: &LayerStack,
        canvas: CanvasSize,
        id: LayerId,
    ) -> Option<&PixelBuffer> {
        let layer = stack.layer(id)?;
        let revision = layer.content_revision();
        let stale = self
            .entries
            .get(&id)
            .is_none_or(|cached| cached.revision != revision);
        if stale {
            let thumbnail = match compositor.render_layer_content(layer, canvas) {
                Some(content) => downsample(&content, self.size)?,
                None => PixelBuffer::new(0, 0).ok()?,
            };
            trace!(layer = layer.name(), revision, "layer preview regenerated");
            self.regenerations += 1;
            self.entries.insert(
                id,
                CachedPreview {
                    revision,
                    thumbnail,
                },
            );
        }
        self.entries.get(&id).map(|cached| &cached.thumbnail)
    }

    /// Drops thumbnails of layers no longer in `stack`.
    pub fn retain_live(&mut self, stack: &LayerStack) {
        self.entries.retain(|id, _| stack.layer(*id).is_some());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn downsample(source: &PixelBuffer, bound: u32) -> Option<PixelBuffer> {
    let (width, height) = fit_within(source.width(), source.height(), bound);
    let mut thumbnail = PixelBuffer::new(width, height).ok()?;
    for y in 0..height {
        let source_y = sample_index(y, height, source.height());
        for x in 0..width {
            let source_x = sample_index(x, width, source.width());
            if let Some(pixel) = source.pixel(source_x, source_y) {
                thumbnail.set_pixel(x, y, pixel);
            }
        }
    }
    thumbnail.take_dirty_rows();
    Some(thumbnail)
}

fn sample_index(index: u32, scaled_len: u32, source_len: u32) -> u32 {
    let centre = (f64::from(index) + 0.5) * f64::from(source_len) / f64::from(scaled_len);
    (centre.floor() as u32).min(source_len.saturating_sub(1))
}
