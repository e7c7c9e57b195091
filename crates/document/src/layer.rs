use model::{Color, Offset, PixelBuffer};

pub const DEFAULT_FONT_FAMILY: &str = "Sans";
pub const DEFAULT_FONT_PIXEL_SIZE: u32 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Solid,
    Raster,
    Text,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Solid => "Solid",
            LayerKind::Raster => "Raster",
            LayerKind::Text => "Text",
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextContent {
    pub text: String,
    pub font_family: String,
    pub font_pixel_size: u32,
    pub color: Color,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_family: DEFAULT_FONT_FAMILY.to_owned(),
            font_pixel_size: DEFAULT_FONT_PIXEL_SIZE,
            color: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerContent {
    Solid { fill_color: Color },
    Raster { pixels: PixelBuffer },
    Text(TextContent),
}

impl LayerContent {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerContent::Solid { .. } => LayerKind::Solid,
            LayerContent::Raster { .. } => LayerKind::Raster,
            LayerContent::Text(_) => LayerKind::Text,
        }
    }
}

/// One addressable content unit of a document.
///
/// Shared attributes are only mutable through [`crate::LayerStack`], which
/// enforces the lock and background rules.
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    visible: bool,
    locked: bool,
    opacity: f32,
    z_index: usize,
    position: Offset,
    scale: f32,
    content: LayerContent,
    content_revision: u64,
}

impl Layer {
    pub fn new(name: impl Into<String>, content: LayerContent) -> Self {
        Self {
            name: name.into(),
            visible: true,
            locked: false,
            opacity: 1.0,
            z_index: 0,
            position: Offset::ZERO,
            scale: 1.0,
            content,
            content_revision: 0,
        }
    }

    pub fn solid(name: impl Into<String>, fill_color: Color) -> Self {
        Self::new(name, LayerContent::Solid { fill_color })
    }

    pub fn raster(name: impl Into<String>, pixels: PixelBuffer) -> Self {
        Self::new(name, LayerContent::Raster { pixels })
    }

    pub fn text(name: impl Into<String>, text: TextContent) -> Self {
        Self::new(name, LayerContent::Text(text))
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Clamps to `0.0..=1.0`; a non-finite value leaves the opacity unchanged.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        if opacity.is_finite() {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
        self
    }

    pub fn with_position(mut self, position: Offset) -> Self {
        self.position = position;
        self
    }

    /// Ignored unless finite and positive.
    pub fn with_scale(mut self, scale: f32) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.scale = scale;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn z_index(&self) -> usize {
        self.z_index
    }

    pub fn position(&self) -> Offset {
        self.position
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn content(&self) -> &LayerContent {
        &self.content
    }

    pub fn kind(&self) -> LayerKind {
        self.content.kind()
    }

    /// Bumped whenever anything that affects this layer's rendering changes.
    pub fn content_revision(&self) -> u64 {
        self.content_revision
    }

    pub(crate) fn bump_revision(&mut self) {
        self.content_revision = self.content_revision.wrapping_add(1);
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.bump_revision();
        }
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub(crate) fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
        self.bump_revision();
    }

    pub(crate) fn set_z_index(&mut self, z_index: usize) {
        self.z_index = z_index;
    }

    pub(crate) fn set_position(&mut self, position: Offset) {
        self.position = position;
        self.bump_revision();
    }

    pub(crate) fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
        self.bump_revision();
    }

    pub(crate) fn content_mut(&mut self) -> &mut LayerContent {
        self.bump_revision();
        &mut self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sanitizes_opacity_and_scale() {
        let layer = Layer::solid("fill", Color::RED)
            .with_opacity(1.7)
            .with_scale(-2.0)
            .with_position(Offset::new(-4, 9))
            .with_visible(false)
            .with_locked(true);
        assert_eq!(layer.opacity(), 1.0);
        assert_eq!(layer.scale(), 1.0);
        assert_eq!(layer.position(), Offset::new(-4, 9));
        assert!(!layer.visible());
        assert!(layer.locked());

        let layer = layer.with_opacity(f32::NAN).with_scale(0.5);
        assert_eq!(layer.opacity(), 1.0);
        assert_eq!(layer.scale(), 0.5);
    }

    #[test]
    fn content_access_bumps_revision() {
        let mut layer = Layer::raster("ink", PixelBuffer::new(2, 2).expect("small buffer"));
        let before = layer.content_revision();
        if let LayerContent::Raster { pixels } = layer.content_mut() {
            pixels.set_pixel(0, 0, [1, 2, 3, 4]);
        }
        assert!(layer.content_revision() > before);
        layer.set_locked(true);
        layer.set_z_index(3);
        assert_eq!(layer.content_revision(), before + 1);
        assert_eq!(layer.kind(), LayerKind::Raster);
    }
}
