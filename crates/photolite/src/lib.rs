//! Editing session host: binds one [`Document`] to the paint engine, the
//! compositor and the project codec.

pub mod config;
mod error;
pub mod logging;


use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use brush_execution::{PaintEngine, StrokeReport, StrokeSegment, to_layer_space};
use chrono::{DateTime, Local, Utc};
use document::{
    Document, Layer, LayerId, LayerKind, LayerStackError, ToolKind, opacity_to_percent,
};
use image::{ImageError, ImageFormat, ImageReader};
use model::{BrushConfig, CanvasSize, Color, Offset, PixelBuffer, Point, Rect};
use renderer::{Compositor, FontBook, FontError, PreviewCache, flatten_to_layer};
use tracing::{debug, info, warn};

pub use config::{ConfigError, EditorConfig};
pub use error::EditorError;

/// One pointer-move increment of a brush or eraser gesture in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushInput {
    pub start: Point,
    pub end: Point,
    pub color: Color,
    pub width: u32,
    pub hardness: u8,
    pub erase: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LayerLocked,
    NotRaster(LayerKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeResult {
    Painted(StrokeReport),
    Skipped(SkipReason),
}

/// What a drag with the current tool did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcome {
    Stroke(StrokeResult),
    Moved { position: Offset },
    Skipped(SkipReason),
    /// The tool only affects the view, which the host owns.
    Ignored,
}

/// Summary shown by the project information dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub name: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: String,
    pub created: DateTime<Utc>,
    pub modified: Option<DateTime<Utc>>,
    pub format_version: u32,
    pub layers: Vec<LayerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub locked: bool,
    pub opacity_percent: u8,
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DEFAULT_IMPORT_NAME: &str = "Image";

impl fmt::Display for DocumentInfo {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(formatter, "{}", self.name)?;
        if !self.description.is_empty() {
            writeln!(formatter, "{}", self.description)?;
        }
        writeln!(
            formatter,
            "Size: {}x{} ({})",
            self.width, self.height, self.aspect_ratio
        )?;
        writeln!(
            formatter,
            "Created: {} (format version {})",
            self.created.with_timezone(&Local).format(TIMESTAMP_FORMAT),
            self.format_version
        )?;
        match self.modified {
            Some(modified) => writeln!(
                formatter,
                "Modified: {}",
                modified.with_timezone(&Local).format(TIMESTAMP_FORMAT)
            )?,
            None => writeln!(formatter, "Modified: never")?,
        }
        writeln!(formatter, "Layers (top to bottom):")?;
        for (index, layer) in self.layers.iter().enumerate() {
            write!(
                formatter,
                "  [{index}] {} ({}) opacity {}%",
                layer.name, layer.kind, layer.opacity_percent
            )?;
            if !layer.visible {
                write!(formatter, ", hidden")?;
            }
            if layer.locked {
                write!(formatter, ", locked")?;
            }
            writeln!(formatter)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Editor {
    document: Document,
    compositor: Compositor,
    paint_engine: PaintEngine,
    previews: PreviewCache,
    path: Option<PathBuf>,
    unsaved_changes: bool,
    version_advisory: Option<String>,
}

impl Editor {
    pub fn new(document: Document, config: &EditorConfig) -> Result<Self, EditorError> {
        let paint_engine = PaintEngine::new(config.paint_engine_config())?;
        let compositor = Compositor::new(font_book(config)?);
        Ok(Self {
            document,
            compositor,
            paint_engine,
            previews: PreviewCache::new(config.preview_size),
            path: None,
            unsaved_changes: false,
            version_advisory: None,
        })
    }

    /// Fresh document with only the background layer. `canvas` defaults to
    /// the configured size.
    pub fn create(
        config: &EditorConfig,
        name: &str,
        canvas: Option<CanvasSize>,
        background: Color,
    ) -> Result<Self, EditorError> {
        let canvas = match canvas {
            Some(canvas) => canvas,
            None => config.canvas_size()?,
        };
        let mut document = Document::new(name, canvas, background);
        document.set_brush(config.default_brush()?);
        info!(
            name,
            width = canvas.width(),
            height = canvas.height(),
            "document created"
        );
        let mut editor = Self::new(document, config)?;
        editor.unsaved_changes = true;
        Ok(editor)
    }

    /// Opens a project file. A package from a newer build still opens; the
    /// mismatch is kept in [`Editor::version_advisory`].
    pub fn open(path: &Path, config: &EditorConfig) -> Result<Self, EditorError> {
        let loaded = project_file::load_from_path(path)?;
        let advisory = match loaded.check_version() {
            Ok(()) => None,
            Err(advisory) => {
                warn!(%advisory, path = %path.display(), "project is newer than this build");
                Some(advisory.to_string())
            }
        };
        let mut editor = Self::new(loaded.into_document(), config)?;
        editor.path = Some(path.to_path_buf());
        editor.version_advisory = advisory;
        Ok(editor)
    }

    /// New document sized to the image at `path`, holding it as its first
    /// layer. Both are named after the file.
    pub fn from_image(path: &Path, config: &EditorConfig) -> Result<Self, EditorError> {
        let pixels = decode_image_file(path)?;
        let name = file_label(path);
        let canvas = CanvasSize::new(i64::from(pixels.width()), i64::from(pixels.height()))?;
        let mut editor = Self::create(config, &name, Some(canvas), Color::WHITE)?;
        editor.document.layers_mut().add(Layer::raster(name, pixels));
        Ok(editor)
    }

    /// Adds the image at `path` as a new top raster layer at the canvas
    /// origin, named after the file.
    pub fn import_image_layer(&mut self, path: &Path) -> Result<LayerId, EditorError> {
        let pixels = decode_image_file(path)?;
        let name = file_label(path);
        info!(
            layer = %name,
            width = pixels.width(),
            height = pixels.height(),
            "image imported"
        );
        self.unsaved_changes = true;
        Ok(self.document.layers_mut().add(Layer::raster(name, pixels)))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable document access; marks the session as having unsaved changes.
    pub fn document_mut(&mut self) -> &mut Document {
        self.unsaved_changes = true;
        &mut self.document
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    pub fn version_advisory(&self) -> Option<&str> {
        self.version_advisory.as_deref()
    }

    /// Paints one segment onto the active layer. Locked and non-raster
    /// targets are skipped without error.
    pub fn apply_brush_input(&mut self, input: &BrushInput) -> Result<StrokeResult, EditorError> {
        let brush = BrushConfig::new(input.width, input.hardness)?;
        let index = self.document.layers().active_index();
        let target = match self.document.layers_mut().paint_target(index) {
            Ok(target) => target,
            Err(LayerStackError::LayerLocked { .. }) => {
                debug!(index, "stroke skipped on locked layer");
                return Ok(StrokeResult::Skipped(SkipReason::LayerLocked));
            }
            Err(LayerStackError::KindMismatch { actual, .. }) => {
                debug!(index, kind = %actual, "stroke skipped on non-raster layer");
                return Ok(StrokeResult::Skipped(SkipReason::NotRaster(actual)));
            }
            Err(error) => return Err(error.into()),
        };
        let segment = StrokeSegment {
            start: to_layer_space(input.start, target.position, target.scale),
            end: to_layer_space(input.end, target.position, target.scale),
            color: input.color,
            brush,
            erase: input.erase,
        };
        let report = self.paint_engine.stroke(target.pixels, &segment);
        self.unsaved_changes = true;
        Ok(StrokeResult::Painted(report))
    }

    /// Applies a pointer drag from `start` to `end` with the document's
    /// current tool, brush and foreground color.
    pub fn drag_active_tool(&mut self, start: Point, end: Point) -> Result<ToolOutcome, EditorError> {
        let tool = self.document.tool();
        match tool {
            ToolKind::Brush | ToolKind::Eraser => {
                let brush = self.document.brush();
                let input = BrushInput {
                    start,
                    end,
                    color: self.document.foreground_color(),
                    width: brush.width(),
                    hardness: brush.hardness(),
                    erase: tool == ToolKind::Eraser,
                };
                Ok(ToolOutcome::Stroke(self.apply_brush_input(&input)?))
            }
            ToolKind::Move => {
                let layers = self.document.layers();
                let index = layers.active_index();
                let current = layers.active_layer().position();
                let position = Offset::new(
                    current.x.saturating_add((end.x - start.x).round() as i32),
                    current.y.saturating_add((end.y - start.y).round() as i32),
                );
                match self.document.layers_mut().set_position(index, position) {
                    Ok(()) => {
                        self.unsaved_changes = true;
                        Ok(ToolOutcome::Moved { position })
                    }
                    Err(LayerStackError::LayerLocked { .. }) => {
                        Ok(ToolOutcome::Skipped(SkipReason::LayerLocked))
                    }
                    Err(error) => Err(error.into()),
                }
            }
            ToolKind::Hand => Ok(ToolOutcome::Ignored),
        }
    }

    pub fn composite(&self, target: Option<Rect>, background_visible: bool) -> PixelBuffer {
        self.compositor
            .render_document(&self.document, target, background_visible)
    }

    /// Composites `rect` (default: whole canvas) with true transparency and
    /// encodes it as 8-bit RGBA PNG. `rect` must lie inside the canvas.
    pub fn export_png<W: Write + Seek>(
        &self,
        rect: Option<Rect>,
        writer: &mut W,
    ) -> Result<(), EditorError> {
        let rect = match rect {
            Some(rect) => Some(self.document.canvas().check_within(rect)?),
            None => None,
        };
        let composite = self.composite(rect, false);
        composite
            .to_image_rgba8()
            .write_to(writer, ImageFormat::Png)
            .map_err(EditorError::Export)?;
        debug!(
            width = composite.width(),
            height = composite.height(),
            "composite exported"
        );
        Ok(())
    }

    pub fn export_png_to_path(&self, rect: Option<Rect>, path: &Path) -> Result<(), EditorError> {
        if let Some(rect) = rect {
            self.document.canvas().check_within(rect)?;
        }
        let io_error = |source| EditorError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        self.export_png(rect, &mut writer)?;
        writer.flush().map_err(io_error)?;
        info!(path = %path.display(), "png exported");
        Ok(())
    }

    /// Adds the flattened canvas as a new top raster layer.
    pub fn add_composite_layer(&mut self) -> LayerId {
        self.unsaved_changes = true;
        flatten_to_layer(&self.compositor, &mut self.document)
    }

    /// Thumbnail of the layer at top-to-bottom `index`.
    pub fn layer_preview(&mut self, index: usize) -> Result<Option<&PixelBuffer>, EditorError> {
        let id = self.document.layers().id(index)?;
        self.previews.retain_live(self.document.layers());
        Ok(self.previews.preview(
            &self.compositor,
            self.document.layers(),
            self.document.canvas(),
            id,
        ))
    }

    pub fn save(&mut self) -> Result<PathBuf, EditorError> {
        let path = self.path.clone().ok_or(EditorError::NoSavePath)?;
        self.save_as(&path)
    }

    /// Saves to `path`, adding the project extension when missing, and makes
    /// it the session path.
    pub fn save_as(&mut self, path: &Path) -> Result<PathBuf, EditorError> {
        let path = project_file::with_project_extension(path);
        self.document.touch_modified();
        project_file::save_to_path(&self.document, &path)?;
        self.path = Some(path.clone());
        self.unsaved_changes = false;
        Ok(path)
    }

    pub fn document_info(&self) -> DocumentInfo {
        let document = &self.document;
        let canvas = document.canvas();
        DocumentInfo {
            name: document.name().to_owned(),
            description: document.description().to_owned(),
            width: canvas.width(),
            height: canvas.height(),
            aspect_ratio: canvas.aspect_ratio_label(),
            created: document.created(),
            modified: document.modified(),
            format_version: document.format_version(),
            layers: document
                .layers()
                .iter_top_to_bottom()
                .map(|(_, layer)| LayerSummary {
                    name: layer.name().to_owned(),
                    kind: layer.kind(),
                    visible: layer.visible(),
                    locked: layer.locked(),
                    opacity_percent: opacity_to_percent(layer.opacity()),
                })
                .collect(),
        }
    }
}

fn decode_image_file(path: &Path) -> Result<PixelBuffer, EditorError> {
    let import_error = |source| EditorError::Import {
        path: path.to_path_buf(),
        source,
    };
    let reader = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|error| import_error(ImageError::IoError(error)))?;
    PixelBuffer::decode(reader).map_err(import_error)
}

/// Final path component, as the layer and document name of an import.
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_IMPORT_NAME.to_owned())
}

fn font_book(config: &EditorConfig) -> Result<FontBook, FontError> {
    let mut fonts = if config.fonts.system_fallback {
        FontBook::with_system_fallback()
    } else {
        FontBook::new()
    };
    for file in &config.fonts.files {
        fonts.load_file(file.family.as_deref(), &file.path)?;
    }
    Ok(fonts)
}
