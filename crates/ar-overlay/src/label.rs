//! Fixed stroke font for marker id labels.
//!
//! Digits are drawn as seven-segment glyphs in a `0.6 × 1.0` unit box
//! (x right, y up from the baseline) scaled to the requested glyph height.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

// Segment endpoints, unit coordinates.
const SEGMENTS: [[(f32, f32); 2]; 7] = [
    [(0.0, 1.0), (0.6, 1.0)], // top
    [(0.6, 1.0), (0.6, 0.5)], // upper right
    [(0.6, 0.5), (0.6, 0.0)], // lower right
    [(0.0, 0.0), (0.6, 0.0)], // bottom
    [(0.0, 0.0), (0.0, 0.5)], // lower left
    [(0.0, 0.5), (0.0, 1.0)], // upper left
    [(0.0, 0.5), (0.6, 0.5)], // middle
];

// Bit i set = segment i lit.
const DIGITS: [u8; 10] = [
    0b011_1111, // 0
    0b000_0110, // 1
    0b101_1011, // 2
    0b100_1111, // 3
    0b110_0110, // 4
    0b110_1101, // 5
    0b111_1101, // 6
    0b000_0111, // 7
    0b111_1111, // 8
    0b110_1111, // 9
];

/// Horizontal advance per glyph, in glyph heights.
const ADVANCE: f32 = 0.9;

/// Draw `text` with its baseline-left corner at `origin`.
///
/// Only ASCII digits are rendered; any other character just advances the pen.
/// Strokes are `thickness` pixels wide and clipped to the image.
pub(crate) fn draw_digits(
    img: &mut RgbImage,
    text: &str,
    origin: (f32, f32),
    height: f32,
    thickness: u32,
    color: Rgb<u8>,
) {
    let (x0, y0) = origin;
    for (i, ch) in text.chars().enumerate() {
        let Some(d) = ch.to_digit(10) else {
            continue;
        };
        let pen_x = x0 + i as f32 * ADVANCE * height;
        let mask = DIGITS[d as usize];
        for (s, seg) in SEGMENTS.iter().enumerate() {
            if mask & (1 << s) == 0 {
                continue;
            }
            let [(ax, ay), (bx, by)] = *seg;
            let a = (pen_x + ax * height, y0 - ay * height);
            let b = (pen_x + bx * height, y0 - by * height);
            stroke(img, a, b, thickness, color);
        }
    }
}

fn stroke(img: &mut RgbImage, a: (f32, f32), b: (f32, f32), thickness: u32, color: Rgb<u8>) {
    let t = thickness.max(1);
    for dy in 0..t {
        for dx in 0..t {
            let (ox, oy) = (dx as f32, dy as f32);
            draw_line_segment_mut(img, (a.0 + ox, a.1 + oy), (b.0 + ox, b.1 + oy), color);
        }
    }
}
