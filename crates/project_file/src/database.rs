//! `project.db` schema and row access.

use model::Color;
use rusqlite::{Connection, OptionalExtension, Row, params};

pub(crate) const SCHEMA: &str = "
CREATE TABLE layers (
    id INTEGER PRIMARY KEY,
    name TEXT,
    type TEXT,
    visible INTEGER,
    locked INTEGER,
    opacity REAL,
    z_value INTEGER,
    scale REAL,
    pos_x INTEGER,
    pos_y INTEGER
);
CREATE TABLE layer_image (
    layer_id INTEGER PRIMARY KEY,
    pixmap_path TEXT
);
CREATE TABLE layer_solid (
    layer_id INTEGER PRIMARY KEY,
    color_r INTEGER,
    color_g INTEGER,
    color_b INTEGER,
    color_a INTEGER
);
CREATE TABLE layer_text (
    layer_id INTEGER PRIMARY KEY,
    text TEXT,
    font_family TEXT,
    font_size INTEGER,
    color_r INTEGER,
    color_g INTEGER,
    color_b INTEGER,
    color_a INTEGER
);
";

/// Shared attributes of one `layers` row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LayerRow {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) kind: String,
    pub(crate) visible: bool,
    pub(crate) locked: bool,
    pub(crate) opacity: f64,
    pub(crate) z_value: i64,
    pub(crate) scale: f64,
    pub(crate) pos_x: f64,
    pub(crate) pos_y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LayerPayload {
    Solid(Color),
    Image {
        pixmap_path: String,
    },
    Text {
        text: String,
        font_family: String,
        font_size: i64,
        color: Color,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextRow {
    pub(crate) text: String,
    pub(crate) font_family: String,
    pub(crate) font_size: i64,
    pub(crate) color: Color,
}

pub(crate) fn write_layers(
    connection: &mut Connection,
    layers: &[(LayerRow, LayerPayload)],
) -> rusqlite::Result<()> {
    connection.execute_batch(SCHEMA)?;
    let transaction = connection.transaction()?;
    for (row, payload) in layers {
        transaction.execute(
            "INSERT INTO layers (id, name, type, visible, locked, opacity, z_value, scale, pos_x, pos_y)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                row.id,
                row.name,
                row.kind,
                row.visible as i64,
                row.locked as i64,
                row.opacity,
                row.z_value,
                row.scale,
                row.pos_x as i64,
                row.pos_y as i64,
            ],
        )?;
        match payload {
            LayerPayload::Solid(color) => {
                transaction.execute(
                    "INSERT INTO layer_solid (layer_id, color_r, color_g, color_b, color_a)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![row.id, color.r, color.g, color.b, color.a],
                )?;
            }
            LayerPayload::Image { pixmap_path } => {
                transaction.execute(
                    "INSERT INTO layer_image (layer_id, pixmap_path) VALUES (?1, ?2)",
                    params![row.id, pixmap_path],
                )?;
            }
            LayerPayload::Text {
                text,
                font_family,
                font_size,
                color,
            } => {
                transaction.execute(
                    "INSERT INTO layer_text
                         (layer_id, text, font_family, font_size, color_r, color_g, color_b, color_a)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        row.id,
                        text,
                        font_family,
                        font_size,
                        color.r,
                        color.g,
                        color.b,
                        color.a
                    ],
                )?;
            }
        }
    }
    transaction.commit()
}

/// All `layers` rows in stored order.
pub(crate) fn read_layer_rows(connection: &Connection) -> rusqlite::Result<Vec<LayerRow>> {
    let mut statement = connection.prepare(
        "SELECT id, name, type, visible, locked, opacity, z_value, scale, pos_x, pos_y
         FROM layers ORDER BY id",
    )?;
    let rows = statement.query_map([], |row| {
        Ok(LayerRow {
            id: row.get(0)?,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            kind: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            visible: row.get::<_, Option<i64>>(3)?.unwrap_or(1) != 0,
            locked: row.get::<_, Option<i64>>(4)?.unwrap_or(0) != 0,
            opacity: row.get::<_, Option<f64>>(5)?.unwrap_or(1.0),
            z_value: row
                .get::<_, Option<f64>>(6)?
                .map(|value| value as i64)
                .unwrap_or_default(),
            scale: row.get::<_, Option<f64>>(7)?.unwrap_or(1.0),
            pos_x: row.get::<_, Option<f64>>(8)?.unwrap_or(0.0),
            pos_y: row.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
        })
    })?;
    rows.collect()
}

pub(crate) fn read_solid(connection: &Connection, layer_id: i64) -> rusqlite::Result<Option<Color>> {
    let sql = format!(
        "SELECT color_r, color_g, color_b, {} FROM layer_solid WHERE layer_id = ?1",
        alpha_column(connection, "layer_solid")?
    );
    connection
        .query_row(&sql, [layer_id], |row| read_color(row, 0))
        .optional()
}

pub(crate) fn read_image_path(
    connection: &Connection,
    layer_id: i64,
) -> rusqlite::Result<Option<String>> {
    connection
        .query_row(
            "SELECT pixmap_path FROM layer_image WHERE layer_id = ?1",
            [layer_id],
            |row| row.get(0),
        )
        .optional()
}

pub(crate) fn read_text(connection: &Connection, layer_id: i64) -> rusqlite::Result<Option<TextRow>> {
    let sql = format!(
        "SELECT text, font_family, font_size, color_r, color_g, color_b, {}
         FROM layer_text WHERE layer_id = ?1",
        alpha_column(connection, "layer_text")?
    );
    connection
        .query_row(&sql, [layer_id], |row| {
            Ok(TextRow {
                text: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                font_family: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                font_size: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
                color: read_color(row, 3)?,
            })
        })
        .optional()
}

/// Early packages have no alpha column; selecting `NULL` reads them as opaque.
fn alpha_column(connection: &Connection, table: &str) -> rusqlite::Result<&'static str> {
    Ok(if has_column(connection, table, "color_a")? {
        "color_a"
    } else {
        "NULL"
    })
}

/// Four channel columns starting at `first`; a missing alpha is opaque.
fn read_color(row: &Row<'_>, first: usize) -> rusqlite::Result<Color> {
    Ok(Color::rgba(
        channel(row.get(first)?),
        channel(row.get(first + 1)?),
        channel(row.get(first + 2)?),
        row.get::<_, Option<i64>>(first + 3)?
            .map(channel)
            .unwrap_or(255),
    ))
}

fn has_column(connection: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut statement = connection.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = statement.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn channel(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}
