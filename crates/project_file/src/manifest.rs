use chrono::{DateTime, Utc};
use model::Color;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `manifest.json` contents. Unknown keys are ignored and every key other
/// than the canvas size may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Manifest {
    #[serde(default, deserialize_with = "deserialize_version")]
    pub(crate) version: u32,
    #[serde(default, alias = "discription")]
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) project_name: String,
    pub(crate) canvas_width: i64,
    pub(crate) canvas_height: i64,
    #[serde(default)]
    pub(crate) instrument: Option<String>,
    #[serde(default)]
    pub(crate) color: Option<StoredColor>,
    #[serde(default)]
    pub(crate) current_layer: Option<usize>,
    #[serde(default)]
    pub(crate) created: Option<f64>,
    #[serde(default)]
    pub(crate) modified: Option<f64>,
    #[serde(default)]
    pub(crate) background_color: Option<[u8; 4]>,
    #[serde(default)]
    pub(crate) brush_width: Option<u32>,
    #[serde(default)]
    pub(crate) brush_hardness: Option<u8>,
}

impl Manifest {
    /// Only this build writes `background_color`; packages without it come
    /// from the legacy editor, which stored image and text scales as
    /// percentages.
    pub(crate) fn stores_percent_scale(&self) -> bool {
        self.background_color.is_none()
    }
}

/// Foreground colour as written: legacy packages carry `[r, g, b]`, current
/// ones `[r, g, b, a]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredColor {
    Rgb([u8; 3]),
    Rgba([u8; 4]),
}

impl StoredColor {
    pub(crate) fn from_color(color: Color) -> Self {
        Self::Rgba([color.r, color.g, color.b, color.a])
    }

    pub(crate) fn to_color(self) -> Color {
        match self {
            Self::Rgb([r, g, b]) => Color::rgb(r, g, b),
            Self::Rgba([r, g, b, a]) => Color::rgba(r, g, b, a),
        }
    }
}

/// Accepts integer, float or numeric-string versions; older packages wrote
/// the application version in any of these forms.
fn deserialize_version<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Null => Some(0.0),
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(version) if version.is_finite() && version >= 0.0 => {
            Ok(version.floor().min(f64::from(u32::MAX)) as u32)
        }
        _ => Err(de::Error::custom(format!("invalid version {value}"))),
    }
}

pub(crate) fn timestamp_to_seconds(timestamp: DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64 + f64::from(timestamp.timestamp_subsec_nanos()) / 1e9
}

pub(crate) fn seconds_to_timestamp(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
