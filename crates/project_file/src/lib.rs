//! Project package codec.
//!
//! A package is a deflate-compressed zip archive with three kinds of members:
//! `manifest.json` (document metadata), `project.db` (SQLite layer tables) and
//! `layers/layer_<id>.png` (16-bit RGBA pixels of raster layers).

mod archive;
mod database;
mod manifest;


use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::Utc;
use document::{
    BACKGROUND_LAYER_NAME, CURRENT_FORMAT_VERSION, DEFAULT_FONT_PIXEL_SIZE, DEFAULT_PROJECT_NAME,
    Document, Layer, LayerContent, LayerKind, TextContent, ToolKind,
};
use image::{ImageFormat, ImageReader};
use model::{BrushConfig, CanvasSize, Color, Offset, PixelBuffer};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use archive::Members;
use database::{LayerPayload, LayerRow};
use manifest::{Manifest, StoredColor, seconds_to_timestamp, timestamp_to_seconds};

pub const PROJECT_FILE_EXTENSION: &str = "pld";

const MANIFEST_MEMBER: &str = "manifest.json";
const DATABASE_MEMBER: &str = "project.db";
/// Legacy name of raster layers in the `type` column.
const LEGACY_RASTER_KIND: &str = "Image";
/// Placeholder rows written by early builds; they carry no content.
const PLACEHOLDER_KIND: &str = "Layer";
/// Legacy packages store image and text scales in percent.
const LEGACY_SCALE_PERCENT: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum ProjectFileError {
    #[error("project package is corrupt: {reason}")]
    CorruptPackage { reason: String },
    #[error("project was saved with format version {saved}, newest supported is {supported}")]
    UnsupportedFormatVersion { saved: u32, supported: u32 },
    #[error("i/o failure while {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("project database failure while {context}")]
    Sqlite {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to encode layer `{layer}` as PNG")]
    Image {
        layer: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write manifest")]
    Json(#[from] serde_json::Error),
}

impl ProjectFileError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptPackage {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn sqlite(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Sqlite {
            context: context.into(),
            source,
        }
    }
}

/// A freshly decoded document plus the format version it was saved with.
#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub document: Document,
    pub saved_format_version: u32,
}

impl LoadedProject {
    /// Advisory check: a package from a newer build still loads, but callers
    /// may want to warn that some content could be lost.
    pub fn check_version(&self) -> Result<(), ProjectFileError> {
        if self.saved_format_version > CURRENT_FORMAT_VERSION {
            return Err(ProjectFileError::UnsupportedFormatVersion {
                saved: self.saved_format_version,
                supported: CURRENT_FORMAT_VERSION,
            });
        }
        Ok(())
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

pub fn save(document: &Document) -> Result<Vec<u8>, ProjectFileError> {
    let mut members = Members::new();
    let mut rows = Vec::with_capacity(document.layers().len());

    for (row_id, (_, layer)) in document.layers().iter_bottom_to_top().enumerate() {
        let id = row_id as i64;
        let payload = match layer.content() {
            LayerContent::Solid { fill_color } => LayerPayload::Solid(*fill_color),
            LayerContent::Raster { pixels } => {
                let pixmap_path = raster_member_name(id);
                members.insert(pixmap_path.clone(), encode_png(layer.name(), pixels)?);
                LayerPayload::Image { pixmap_path }
            }
            LayerContent::Text(content) => LayerPayload::Text {
                text: content.text.clone(),
                font_family: content.font_family.clone(),
                font_size: i64::from(content.font_pixel_size),
                color: content.color,
            },
        };
        let row = LayerRow {
            id,
            name: layer.name().to_owned(),
            kind: layer.kind().as_str().to_owned(),
            visible: layer.visible(),
            locked: layer.locked(),
            opacity: f64::from(layer.opacity()),
            z_value: layer.z_index() as i64,
            scale: f64::from(layer.scale()),
            pos_x: f64::from(layer.position().x),
            pos_y: f64::from(layer.position().y),
        };
        rows.push((row, payload));
    }

    members.insert(DATABASE_MEMBER.to_owned(), write_database(&rows)?);
    members.insert(
        MANIFEST_MEMBER.to_owned(),
        serde_json::to_vec_pretty(&manifest_for(document))?,
    );
    let bytes = archive::pack(&members)?;
    debug!(
        layers = rows.len(),
        bytes = bytes.len(),
        "project package encoded"
    );
    Ok(bytes)
}

pub fn load(bytes: &[u8]) -> Result<LoadedProject, ProjectFileError> {
    let members = archive::unpack(bytes)?;
    let manifest_bytes = members
        .get(MANIFEST_MEMBER)
        .ok_or_else(|| ProjectFileError::corrupt("missing manifest.json"))?;
    let manifest: Manifest = serde_json::from_slice(manifest_bytes)
        .map_err(|error| ProjectFileError::corrupt(format!("malformed manifest: {error}")))?;
    let database_bytes = members
        .get(DATABASE_MEMBER)
        .ok_or_else(|| ProjectFileError::corrupt("missing project.db"))?;

    let mut document = document_from_manifest(&manifest)?;
    let staging = tempfile::tempdir()
        .map_err(|source| ProjectFileError::io("creating staging directory", source))?;
    let database_path = staging.path().join(DATABASE_MEMBER);
    std::fs::write(&database_path, database_bytes)
        .map_err(|source| ProjectFileError::io("staging project database", source))?;
    let connection = Connection::open_with_flags(&database_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|error| ProjectFileError::corrupt(format!("unreadable project.db: {error}")))?;

    let rows = database::read_layer_rows(&connection)
        .map_err(|error| ProjectFileError::corrupt(format!("unreadable layers table: {error}")))?;
    let percent_scale = manifest.stores_percent_scale();
    // Bottom-to-top stack position each stored row ended up at, if any.
    let mut loaded_positions = Vec::with_capacity(rows.len());
    let mut background_restored = false;
    for row in &rows {
        let Some(kind) = layer_kind(&row.kind) else {
            if row.kind == PLACEHOLDER_KIND {
                debug!(layer_id = row.id, "skipping placeholder layer row");
            } else {
                warn!(layer_id = row.id, kind = %row.kind, "skipping layer of unknown kind");
            }
            loaded_positions.push(None);
            continue;
        };
        let content = read_content(&connection, &members, row, kind)?;
        if !background_restored
            && row.name == BACKGROUND_LAYER_NAME
            && let LayerContent::Solid { fill_color } = content
        {
            document.set_background_color(fill_color);
            background_restored = true;
            loaded_positions.push(Some(0));
            continue;
        }
        let scale = if percent_scale && kind != LayerKind::Solid {
            row.scale / LEGACY_SCALE_PERCENT
        } else {
            row.scale
        };
        let layer = Layer::new(row.name.clone(), content)
            .with_visible(row.visible)
            .with_locked(row.locked)
            .with_opacity(row.opacity as f32)
            .with_position(Offset::new(
                saturate_coordinate(row.pos_x),
                saturate_coordinate(row.pos_y),
            ))
            .with_scale(scale as f32);
        document.layers_mut().add(layer);
        loaded_positions.push(Some(document.layers().len() - 1));
    }
    drop(connection);

    if let Some(current) = manifest.current_layer {
        restore_active_layer(&mut document, &loaded_positions, current);
    }
    info!(
        name = document.name(),
        layers = document.layers().len(),
        version = manifest.version,
        "project loaded"
    );
    Ok(LoadedProject {
        document,
        saved_format_version: manifest.version,
    })
}

pub fn save_to_path(document: &Document, path: &Path) -> Result<(), ProjectFileError> {
    let bytes = save(document)?;
    std::fs::write(path, bytes)
        .map_err(|source| ProjectFileError::io(format!("writing {}", path.display()), source))?;
    info!(path = %path.display(), "project saved");
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<LoadedProject, ProjectFileError> {
    let bytes = std::fs::read(path)
        .map_err(|source| ProjectFileError::io(format!("reading {}", path.display()), source))?;
    load(&bytes)
}

/// `path` with the project extension appended when it has none.
pub fn with_project_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(PROJECT_FILE_EXTENSION)
    }
}

fn manifest_for(document: &Document) -> Manifest {
    let background = document.background_color();
    Manifest {
        version: CURRENT_FORMAT_VERSION,
        description: document.description().to_owned(),
        project_name: document.name().to_owned(),
        canvas_width: i64::from(document.canvas().width()),
        canvas_height: i64::from(document.canvas().height()),
        instrument: Some(document.tool().as_str().to_owned()),
        color: Some(StoredColor::from_color(document.foreground_color())),
        current_layer: Some(document.layers().active_index()),
        created: Some(timestamp_to_seconds(document.created())),
        modified: document.modified().map(timestamp_to_seconds),
        background_color: Some([background.r, background.g, background.b, background.a]),
        brush_width: Some(document.brush().width()),
        brush_hardness: Some(document.brush().hardness()),
    }
}

fn document_from_manifest(manifest: &Manifest) -> Result<Document, ProjectFileError> {
    let canvas = CanvasSize::new(manifest.canvas_width, manifest.canvas_height)
        .map_err(|error| ProjectFileError::corrupt(format!("invalid canvas: {error}")))?;
    let name = if manifest.project_name.is_empty() {
        DEFAULT_PROJECT_NAME
    } else {
        manifest.project_name.as_str()
    };
    let background = manifest
        .background_color
        .map(|[r, g, b, a]| Color::rgba(r, g, b, a))
        .unwrap_or(Color::TRANSPARENT);
    let mut document = Document::new(name, canvas, background);
    document.set_description(manifest.description.clone());
    document.set_format_version(manifest.version);

    match manifest.created.and_then(seconds_to_timestamp) {
        Some(created) => document.set_created(created),
        None => {
            warn!("manifest has no usable creation time");
            document.set_created(Utc::now());
        }
    }
    document.set_modified(manifest.modified.and_then(seconds_to_timestamp));

    if let Some(color) = manifest.color {
        document.set_foreground_color(color.to_color());
    }
    if let Some(instrument) = &manifest.instrument {
        match ToolKind::from_stored(instrument) {
            Some(tool) => document.set_tool(tool),
            None => warn!(instrument = %instrument, "unknown tool in manifest"),
        }
    }
    let defaults = BrushConfig::default();
    let width = manifest.brush_width.unwrap_or(defaults.width());
    let hardness = manifest.brush_hardness.unwrap_or(defaults.hardness());
    match BrushConfig::new(width, hardness) {
        Ok(brush) => document.set_brush(brush),
        Err(error) => warn!(%error, "ignoring stored brush settings"),
    }
    Ok(document)
}

/// Selects the layer stored at top-to-bottom `current`, counted over every
/// stored row. Rows that were skipped on load leave the selection alone.
fn restore_active_layer(
    document: &mut Document,
    loaded_positions: &[Option<usize>],
    current: usize,
) {
    let stored_position = loaded_positions
        .len()
        .checked_sub(current.saturating_add(1))
        .and_then(|row| loaded_positions[row]);
    let Some(bottom_position) = stored_position else {
        warn!(current, "stored active layer was not loaded");
        return;
    };
    let top_index = document.layers().len() - 1 - bottom_position;
    if let Err(error) = document.layers_mut().select(top_index) {
        warn!(current, %error, "stored active layer is out of range");
    }
}

fn layer_kind(stored: &str) -> Option<LayerKind> {
    match stored {
        "Solid" => Some(LayerKind::Solid),
        "Raster" | LEGACY_RASTER_KIND => Some(LayerKind::Raster),
        "Text" => Some(LayerKind::Text),
        _ => None,
    }
}

fn read_content(
    connection: &Connection,
    members: &Members,
    row: &LayerRow,
    kind: LayerKind,
) -> Result<LayerContent, ProjectFileError> {
    let side_table_error = |table: &str, error: rusqlite::Error| {
        ProjectFileError::corrupt(format!("{table} row for layer {}: {error}", row.id))
    };
    let missing = |table: &str| {
        ProjectFileError::corrupt(format!("missing {table} row for layer {}", row.id))
    };
    match kind {
        LayerKind::Solid => {
            let fill_color = database::read_solid(connection, row.id)
                .map_err(|error| side_table_error("layer_solid", error))?
                .ok_or_else(|| missing("layer_solid"))?;
            Ok(LayerContent::Solid { fill_color })
        }
        LayerKind::Raster => {
            let pixmap_path = database::read_image_path(connection, row.id)
                .map_err(|error| side_table_error("layer_image", error))?
                .ok_or_else(|| missing("layer_image"))?;
            let data = members.get(pixmap_path.trim_start_matches("./")).ok_or_else(|| {
                ProjectFileError::corrupt(format!("missing layer image {pixmap_path}"))
            })?;
            let pixels = decode_png(data).map_err(|error| {
                ProjectFileError::corrupt(format!("undecodable layer image {pixmap_path}: {error}"))
            })?;
            Ok(LayerContent::Raster { pixels })
        }
        LayerKind::Text => {
            let text = database::read_text(connection, row.id)
                .map_err(|error| side_table_error("layer_text", error))?
                .ok_or_else(|| missing("layer_text"))?;
            let font_pixel_size = match u32::try_from(text.font_size) {
                Ok(size) if size > 0 => size,
                _ => {
                    warn!(layer_id = row.id, size = text.font_size, "invalid font size, using default");
                    DEFAULT_FONT_PIXEL_SIZE
                }
            };
            Ok(LayerContent::Text(TextContent {
                text: text.text,
                font_family: text.font_family,
                font_pixel_size,
                color: text.color,
            }))
        }
    }
}

fn write_database(rows: &[(LayerRow, LayerPayload)]) -> Result<Vec<u8>, ProjectFileError> {
    let staging = tempfile::tempdir()
        .map_err(|source| ProjectFileError::io("creating staging directory", source))?;
    let database_path = staging.path().join(DATABASE_MEMBER);
    {
        let mut connection = Connection::open(&database_path)
            .map_err(|source| ProjectFileError::sqlite("creating project.db", source))?;
        database::write_layers(&mut connection, rows)
            .map_err(|source| ProjectFileError::sqlite("writing layer tables", source))?;
        connection
            .close()
            .map_err(|(_, source)| ProjectFileError::sqlite("closing project.db", source))?;
    }
    std::fs::read(&database_path)
        .map_err(|source| ProjectFileError::io("reading staged project database", source))
}

fn raster_member_name(id: i64) -> String {
    format!("layers/layer_{id}.png")
}

fn encode_png(layer: &str, pixels: &PixelBuffer) -> Result<Vec<u8>, ProjectFileError> {
    let mut bytes = Vec::new();
    pixels
        .to_image_rgba16()
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|source| ProjectFileError::Image {
            layer: layer.to_owned(),
            source,
        })?;
    Ok(bytes)
}

fn decode_png(data: &[u8]) -> Result<PixelBuffer, image::ImageError> {
    PixelBuffer::decode(ImageReader::with_format(Cursor::new(data), ImageFormat::Png))
}

fn saturate_coordinate(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}
