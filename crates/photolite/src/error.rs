use std::path::PathBuf;

use brush_execution::PaintEngineConfigError;
use document::LayerStackError;
use model::{BrushConfigError, GeometryError};
use project_file::ProjectFileError;
use renderer::FontError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    Layer(#[from] LayerStackError),
    #[error(transparent)]
    Project(#[from] ProjectFileError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Brush(#[from] BrushConfigError),
    #[error(transparent)]
    PaintEngine(#[from] PaintEngineConfigError),
    #[error(transparent)]
    Font(#[from] FontError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to import image {path}")]
    Import {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode PNG export")]
    Export(#[source] image::ImageError),
    #[error("i/o failure on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document has never been saved; a path is required")]
    NoSavePath,
}
