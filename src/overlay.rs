//! Text overlay rendering for display frames.
//!
//! Stamps status text (FPS readout, resolution, exposure) directly into the
//! RGB pixel data with a small built-in 5x7 bitmap font, so the overlay is
//! present in both the preview stream and the recorded file. The glyph set
//! covers exactly what the status lines need; anything else renders as a
//! blank cell.

use crate::camera::Frame;

/// Overlay text color (green, matching the classic viewer look).
pub const OVERLAY_COLOR: [u8; 3] = [0, 255, 0];
/// Pixel scale applied to the 5x7 base glyphs.
pub const OVERLAY_SCALE: u32 = 2;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// One blank column between glyphs, pre-scale.
const GLYPH_SPACING: u32 = 1;

/// 5x7 glyph rows, most significant of the low 5 bits is the left column.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        _ => [0x00; 7],
    }
}

/// Advance per character cell in pixels, after scaling.
pub fn char_advance(scale: u32) -> u32 {
    (GLYPH_WIDTH + GLYPH_SPACING) * scale
}

/// Height of a rendered line in pixels, after scaling.
pub fn line_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

/// Stamp `text` onto an RGB frame with its top-left corner at (x, y).
///
/// Pixels outside the frame are clipped; the call never panics on
/// out-of-bounds coordinates.
pub fn draw_text(frame: &mut Frame, text: &str, x: u32, y: u32, color: [u8; 3], scale: u32) {
    let scale = scale.max(1);
    let mut pen_x = x;

    for c in text.chars() {
        draw_glyph(frame, c, pen_x, y, color, scale);
        pen_x = pen_x.saturating_add(char_advance(scale));
        if pen_x >= frame.width {
            break;
        }
    }
}

fn draw_glyph(frame: &mut Frame, c: char, x: u32, y: u32, color: [u8; 3], scale: u32) {
    let rows = glyph(c);
    let bpp = frame.bytes_per_pixel();

    for (row_idx, row) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if row & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            // Fill the scaled pixel block
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = x + col * scale + dx;
                    let py = y + row_idx as u32 * scale + dy;
                    if px >= frame.width || py >= frame.height {
                        continue;
                    }
                    let offset = ((py * frame.width + px) as usize) * bpp;
                    frame.data[offset..offset + 3].copy_from_slice(&color);
                }
            }
        }
    }
}
