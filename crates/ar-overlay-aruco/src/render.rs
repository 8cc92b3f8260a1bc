use crate::Dictionary;
use image::{GrayImage, Luma};

/// Render marker `id` as a printable grayscale image.
///
/// The marker is `marker_size + 2 * border_bits` cells per side, each
/// `cell_px` pixels, surrounded by `quiet_zone_cells` of white. Black cells
/// are the border and the set bits of the code. Returns `None` for an
/// unknown id or a zero cell size.
pub fn render_marker(
    dict: &Dictionary,
    id: u32,
    cell_px: u32,
    border_bits: u32,
    quiet_zone_cells: u32,
) -> Option<GrayImage> {
    let code = dict.code(id)?;
    if cell_px == 0 {
        return None;
    }

    let bits = dict.marker_size() as u32;
    let cells = bits + 2 * border_bits;
    let side = (cells + 2 * quiet_zone_cells) * cell_px;

    Some(GrayImage::from_fn(side, side, |x, y| {
        let cx = (x / cell_px) as i64 - quiet_zone_cells as i64;
        let cy = (y / cell_px) as i64 - quiet_zone_cells as i64;
        if cx < 0 || cy < 0 || cx >= cells as i64 || cy >= cells as i64 {
            return Luma([255]);
        }

        let (bx, by) = (cx - border_bits as i64, cy - border_bits as i64);
        let inner = bx >= 0 && by >= 0 && bx < bits as i64 && by < bits as i64;
        let black = !inner || (code >> (by * bits as i64 + bx)) & 1 == 1;
        Luma([if black { 0 } else { 255 }])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DictionaryKind;

    fn dict() -> Dictionary {
        let mut codes = vec![0u64; 50];
        codes[1] = 0b1000_0000_0000_0001;
        Dictionary::new(DictionaryKind::Dict4x4_50, 0, codes).expect("dict")
    }

    #[test]
    fn layout_has_quiet_zone_border_and_bits() {
        let img = render_marker(&dict(), 1, 5, 1, 2).expect("render");
        // (4 + 2 + 4) cells of 5 px
        assert_eq!(img.dimensions(), (50, 50));

        let at = |cx: u32, cy: u32| img.get_pixel(cx * 5 + 2, cy * 5 + 2).0[0];
        assert_eq!(at(0, 0), 255); // quiet zone
        assert_eq!(at(2, 2), 0); // border
        assert_eq!(at(3, 3), 0); // bit 0
        assert_eq!(at(4, 3), 255); // bit 1
        assert_eq!(at(6, 6), 0); // bit 15
        assert_eq!(at(7, 7), 0); // border
        assert_eq!(at(8, 8), 255); // quiet zone
    }

    #[test]
    fn unknown_id_or_zero_cell_is_none() {
        assert!(render_marker(&dict(), 50, 5, 1, 1).is_none());
        assert!(render_marker(&dict(), 0, 0, 1, 1).is_none());
    }
}
