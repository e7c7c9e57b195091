mod layer;
mod layer_stack;

pub use layer::{
    DEFAULT_FONT_FAMILY, DEFAULT_FONT_PIXEL_SIZE, Layer, LayerContent, LayerKind, TextContent,
};
pub use layer_stack::{
    BACKGROUND_LAYER_NAME, LayerId, LayerStack, LayerStackError, MoveDirection, PaintTarget,
};

use chrono::{DateTime, Utc};
use model::{BrushConfig, CanvasSize, Color, PixelBuffer};

/// Newest project format this build writes and fully understands.
pub const CURRENT_FORMAT_VERSION: u32 = 1;
pub const DEFAULT_PROJECT_NAME: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToolKind {
    Hand,
    Move,
    #[default]
    Brush,
    Eraser,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Hand => "Hand",
            ToolKind::Move => "Editor",
            ToolKind::Brush => "Brush",
            ToolKind::Eraser => "Eraser",
        }
    }

    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "Hand" => Some(ToolKind::Hand),
            "Editor" | "Move" => Some(ToolKind::Move),
            "Brush" => Some(ToolKind::Brush),
            "Eraser" => Some(ToolKind::Eraser),
            _ => None,
        }
    }
}

/// UI opacity percent (0..=100) to layer opacity.
pub fn opacity_from_percent(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}

pub fn opacity_to_percent(opacity: f32) -> u8 {
    (opacity.clamp(0.0, 1.0) * 100.0 + 0.5).floor() as u8
}

/// One open project: canvas, metadata, layers and the current tool state.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    description: String,
    canvas: CanvasSize,
    created: DateTime<Utc>,
    modified: Option<DateTime<Utc>>,
    format_version: u32,
    layers: LayerStack,
    brush: BrushConfig,
    foreground: Color,
    tool: ToolKind,
}

impl Document {
    pub fn new(name: impl Into<String>, canvas: CanvasSize, background: Color) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            canvas,
            created: Utc::now(),
            modified: None,
            format_version: CURRENT_FORMAT_VERSION,
            layers: LayerStack::new(background),
            brush: BrushConfig::default(),
            foreground: Color::BLACK,
            tool: ToolKind::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn set_created(&mut self, created: DateTime<Utc>) {
        self.created = created;
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn set_modified(&mut self, modified: Option<DateTime<Utc>>) {
        self.modified = modified;
    }

    pub fn touch_modified(&mut self) {
        self.modified = Some(Utc::now());
    }

    /// Version of the application that produced this document.
    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn set_format_version(&mut self, format_version: u32) {
        self.format_version = format_version;
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerStack {
        &mut self.layers
    }

    pub fn background_color(&self) -> Color {
        match self.layers.background().content() {
            LayerContent::Solid { fill_color } => *fill_color,
            _ => unreachable!("background layer is always solid"),
        }
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.layers.set_background_color(color);
    }

    pub fn brush(&self) -> BrushConfig {
        self.brush
    }

    pub fn set_brush(&mut self, brush: BrushConfig) {
        self.brush = brush;
    }

    pub fn foreground_color(&self) -> Color {
        self.foreground
    }

    pub fn set_foreground_color(&mut self, color: Color) {
        self.foreground = color;
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
    }

    pub fn add_solid_layer(&mut self, name: impl Into<String>, fill_color: Color) -> LayerId {
        self.layers.add(Layer::solid(name, fill_color))
    }

    pub fn add_raster_layer(&mut self, name: impl Into<String>, pixels: PixelBuffer) -> LayerId {
        self.layers.add(Layer::raster(name, pixels))
    }

    /// Canvas-sized raster layer filled with `fill`.
    pub fn add_empty_raster_layer(&mut self, name: impl Into<String>, fill: Color) -> LayerId {
        let pixels = PixelBuffer::covering(self.canvas.full_rect(), fill);
        self.add_raster_layer(name, pixels)
    }

    pub fn add_text_layer(&mut self, name: impl Into<String>, text: impl Into<String>) -> LayerId {
        self.layers.add(Layer::text(name, TextContent::new(text)))
    }
}
