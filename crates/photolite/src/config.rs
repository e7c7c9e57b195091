//! `photolite.toml` settings. Every key is optional; missing keys fall back to
//! the defaults below.

use std::path::{Path, PathBuf};

use brush_execution::{
    DEFAULT_SPACING_FRACTION, DEFAULT_START_ALPHA, FalloffMode, PaintEngineConfig,
};
use model::{
    BrushConfig, BrushConfigError, CanvasSize, DEFAULT_BRUSH_HARDNESS, DEFAULT_BRUSH_WIDTH,
    GeometryError,
};
use renderer::DEFAULT_PREVIEW_SIZE;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CANVAS_WIDTH: u32 = 1920;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 1080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushSettings {
    pub width: u32,
    pub hardness: u8,
    pub spacing_fraction: f32,
    pub start_alpha: u8,
    pub falloff: FalloffMode,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_BRUSH_WIDTH,
            hardness: DEFAULT_BRUSH_HARDNESS,
            spacing_fraction: DEFAULT_SPACING_FRACTION,
            start_alpha: DEFAULT_START_ALPHA,
            falloff: FalloffMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontFile {
    /// Family name text layers refer to; the file stem when omitted.
    #[serde(default)]
    pub family: Option<String>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    pub system_fallback: bool,
    pub files: Vec<FontFile>,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            system_fallback: true,
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub canvas: CanvasConfig,
    pub brush: BrushSettings,
    pub preview_size: u32,
    pub fonts: FontSettings,
    /// `tracing` filter directive, e.g. `info` or `project_file=debug`.
    pub log_level: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            brush: BrushSettings::default(),
            preview_size: DEFAULT_PREVIEW_SIZE,
            fonts: FontSettings::default(),
            log_level: "info".to_owned(),
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` when given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn canvas_size(&self) -> Result<CanvasSize, GeometryError> {
        CanvasSize::new(i64::from(self.canvas.width), i64::from(self.canvas.height))
    }

    pub fn default_brush(&self) -> Result<BrushConfig, BrushConfigError> {
        BrushConfig::new(self.brush.width, self.brush.hardness)
    }

    pub fn paint_engine_config(&self) -> PaintEngineConfig {
        PaintEngineConfig {
            spacing_fraction: self.brush.spacing_fraction,
            start_alpha: self.brush.start_alpha,
            falloff: self.brush.falloff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: EditorConfig = toml::from_str("").expect("empty config parses");
        assert_eq!(config, EditorConfig::default());
        assert_eq!(
            config.canvas_size().expect("valid canvas").aspect_ratio_label(),
            "16:9"
        );
        assert_eq!(config.default_brush().expect("valid brush"), BrushConfig::default());
        assert_eq!(config.paint_engine_config(), PaintEngineConfig::default());
    }

    #[test]
    fn partial_sections_override_only_given_keys() {
        let config: EditorConfig = toml::from_str(
            r#"
            log_level = "debug"

            [brush]
            hardness = 60
            falloff = "fade_to_transparent"

            [[fonts.files]]
            family = "Display"
            path = "fonts/display.ttf"
            "#,
        )
        .expect("partial config parses");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.brush.width, DEFAULT_BRUSH_WIDTH);
        assert_eq!(config.brush.hardness, 60);
        assert_eq!(config.brush.falloff, FalloffMode::FadeToTransparent);
        assert_eq!(config.fonts.files.len(), 1);
        assert!(config.fonts.system_fallback);
        assert_eq!(config.canvas, CanvasConfig::default());
    }

    #[test]
    fn load_reports_path_on_failure() {
        let directory = tempfile::tempdir().expect("create temp dir");
        let path = directory.path().join("photolite.toml");
        assert!(matches!(
            EditorConfig::load(&path),
            Err(ConfigError::Io { .. })
        ));

        std::fs::write(&path, "canvas = 12").expect("write config");
        match EditorConfig::load(&path) {
            Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_brush_values_surface_as_errors() {
        let config: EditorConfig =
            toml::from_str("[brush]\nwidth = 0").expect("zero width parses");
        assert_eq!(config.default_brush(), Err(BrushConfigError::ZeroWidth));
    }
}
