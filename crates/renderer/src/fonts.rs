use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use tracing::{debug, warn};

const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("failed to read font file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("font data for family `{family}` is not a usable font")]
    InvalidFont {
        family: String,
        #[source]
        source: ab_glyph::InvalidFont,
    },
}

/// Fonts available to text layers, keyed by family name.
#[derive(Clone, Default)]
pub struct FontBook {
    families: HashMap<String, FontArc>,
    fallback: Option<FontArc>,
}

impl fmt::Debug for FontBook {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FontBook")
            .field("families", &self.family_names())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Font book whose fallback is the first readable well-known system font.
    pub fn with_system_fallback() -> Self {
        let mut book = Self::new();
        for path in SYSTEM_FONT_PATHS {
            let Ok(data) = std::fs::read(path) else {
                continue;
            };
            match FontArc::try_from_vec(data) {
                Ok(font) => {
                    debug!(path, "using system fallback font");
                    book.fallback = Some(font);
                    break;
                }
                Err(error) => warn!(path, %error, "skipping unreadable system font"),
            }
        }
        book
    }

    pub fn register(&mut self, family: impl Into<String>, font: FontArc) {
        self.families.insert(family.into(), font);
    }

    pub fn register_bytes(
        &mut self,
        family: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<(), FontError> {
        let family = family.into();
        match FontArc::try_from_vec(data) {
            Ok(font) => {
                self.register(family, font);
                Ok(())
            }
            Err(source) => Err(FontError::InvalidFont { family, source }),
        }
    }

    /// Registers a font file under `family`, or under the file stem when no
    /// family is given. Returns the family name used.
    pub fn load_file(&mut self, family: Option<&str>, path: &Path) -> Result<String, FontError> {
        let data = std::fs::read(path).map_err(|source| FontError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let family = match family {
            Some(family) => family.to_owned(),
            None => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        };
        self.register_bytes(family.clone(), data)?;
        debug!(family = %family, path = %path.display(), "font registered");
        Ok(family)
    }

    pub fn set_fallback(&mut self, font: Option<FontArc>) {
        self.fallback = font;
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Exact family match first, then a case-insensitive one, then the fallback.
    pub fn resolve(&self, family: &str) -> Option<&FontArc> {
        self.families
            .get(family)
            .or_else(|| {
                self.families
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(family))
                    .map(|(_, font)| font)
            })
            .or(self.fallback.as_ref())
    }

    pub fn family_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.families.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_book_resolves_nothing() {
        let book = FontBook::new();
        assert!(book.resolve("Sans").is_none());
        assert!(!book.has_fallback());
        assert!(book.family_names().is_empty());
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        let mut book = FontBook::new();
        let error = book
            .register_bytes("Broken", vec![0, 1, 2, 3])
            .expect_err("garbage is not a font");
        assert!(matches!(error, FontError::InvalidFont { ref family, .. } if family == "Broken"));
        assert!(book.resolve("Broken").is_none());
    }

    #[test]
    fn missing_font_file_reports_path() {
        let mut book = FontBook::new();
        let path = Path::new("/nonexistent/fonts/Missing.ttf");
        let error = book.load_file(None, path).expect_err("file does not exist");
        assert!(matches!(error, FontError::Io { path: ref reported, .. } if reported == path));
    }
}
