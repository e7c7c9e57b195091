use ab_glyph::{Font, FontArc, ScaleFont, point};
use document::TextContent;
use model::PixelBuffer;
use model::blend::source_over;

/// Rasterizes `content` at `font_pixel_size * scale` into a tight buffer whose
/// origin is the layer origin. Lines are split on `\n`. `None` when the text
/// would exceed the pixel buffer limit.
pub(crate) fn rasterize_text(
    font: &FontArc,
    content: &TextContent,
    scale: f32,
) -> Option<PixelBuffer> {
    let pixel_size = content.font_pixel_size as f32 * scale;
    if content.text.is_empty() || !pixel_size.is_finite() || pixel_size <= 0.0 {
        return PixelBuffer::new(0, 0).ok();
    }
    let scaled = font.as_scaled(pixel_size);
    let line_height = scaled.height() + scaled.line_gap();
    let lines: Vec<&str> = content.text.split('\n').collect();

    let width = lines
        .iter()
        .map(|line| line_advance(&scaled, line))
        .fold(0.0_f32, f32::max)
        .ceil();
    let height = (line_height * (lines.len() - 1) as f32 + scaled.height()).ceil();
    if width <= 0.0 || height <= 0.0 {
        return PixelBuffer::new(0, 0).ok();
    }
    if width > u32::MAX as f32 || height > u32::MAX as f32 {
        return None;
    }

    let mut buffer = PixelBuffer::new(width as u32, height as u32).ok()?;
    let color = content.color.to_rgba16();
    for (line_index, line) in lines.iter().enumerate() {
        let mut caret = point(0.0, scaled.ascent() + line_height * line_index as f32);
        let mut previous = None;
        for ch in line.chars() {
            let mut glyph = scaled.scaled_glyph(ch);
            if let Some(previous) = previous {
                caret.x += scaled.kern(previous, glyph.id);
            }
            previous = Some(glyph.id);
            glyph.position = caret;
            caret.x += scaled.h_advance(glyph.id);
            let Some(outlined) = scaled.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|x, y, coverage| {
                let px = bounds.min.x as i64 + i64::from(x);
                let py = bounds.min.y as i64 + i64::from(y);
                let (Ok(px), Ok(py)) = (u32::try_from(px), u32::try_from(py)) else {
                    return;
                };
                if let Some(pixel) = buffer.pixel_mut(px, py) {
                    source_over(pixel, color, coverage);
                }
            });
        }
    }
    buffer.take_dirty_rows();
    Some(buffer)
}

fn line_advance<F: Font, SF: ScaleFont<F>>(scaled: &SF, line: &str) -> f32 {
    let mut advance = 0.0;
    let mut previous = None;
    for ch in line.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(previous) = previous {
            advance += scaled.kern(previous, id);
        }
        advance += scaled.h_advance(id);
        previous = Some(id);
    }
    advance
}
