//! Reading the bit grid of a marker from its image-space corners.

use crate::threshold::otsu_threshold_from_samples;
use ar_overlay_core::{homography_from_4pt, GrayImageView, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Sampling parameters for reading a marker's cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanDecodeConfig {
    /// Marker border width in cells.
    pub border_bits: usize,
    /// Fraction of the marker side to ignore near its outline.
    pub inset_frac: f32,
    /// Require border-black ratio >= this.
    pub min_border_score: f32,
    /// Side of the canonical square the sample grid is laid out in.
    pub px_per_marker: f32,
    /// Also try reading the marker with inverted polarity (white on black).
    pub allow_inverted: bool,
}

impl Default for ScanDecodeConfig {
    fn default() -> Self {
        Self {
            border_bits: 1,
            inset_frac: 0.0,
            min_border_score: 0.85,
            px_per_marker: 60.0,
            allow_inverted: false,
        }
    }
}

/// Raw read of one candidate, before dictionary matching.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MarkerObservation {
    /// Observed inner bits (row-major, black = 1), in candidate corner order.
    pub code: u64,
    pub border_score: f32,
}

const MIN_SIDE_PX: f32 = 12.0;
const THRESH_SUBDIV: usize = 3;
/// Minimum spread between the darkest and brightest cell sample.
const MIN_CONTRAST: u8 = 20;

struct SampleGrid {
    cells: usize,
    points: Vec<Point2<f32>>, // row-major: cy * cells + cx
    threshold_points: Vec<Point2<f32>>,
    square: [Point2<f32>; 4],
}

impl SampleGrid {
    fn new(cfg: &ScanDecodeConfig, bits: usize) -> Option<Self> {
        if bits == 0 || bits * bits > 64 {
            return None;
        }
        let cells = bits + 2 * cfg.border_bits;

        let s = cfg.px_per_marker;
        let inset = (cfg.inset_frac * s).max(0.0);
        let side = s - 2.0 * inset;
        if side < MIN_SIDE_PX {
            return None;
        }

        let step = side / cells as f32;
        let points = (0..cells)
            .flat_map(|cy| {
                (0..cells).map(move |cx| {
                    Point2::new(
                        inset + (cx as f32 + 0.5) * step,
                        inset + (cy as f32 + 0.5) * step,
                    )
                })
            })
            .collect();

        let grid = cells * THRESH_SUBDIV;
        let tstep = side / grid as f32;
        let threshold_points = (0..grid)
            .flat_map(|ty| {
                (0..grid).map(move |tx| {
                    Point2::new(
                        inset + (tx as f32 + 0.5) * tstep,
                        inset + (ty as f32 + 0.5) * tstep,
                    )
                })
            })
            .collect();

        Some(Self {
            cells,
            points,
            threshold_points,
            square: [
                Point2::new(0.0, 0.0),
                Point2::new(s, 0.0),
                Point2::new(s, s),
                Point2::new(0.0, s),
            ],
        })
    }
}

/// Reusable decoder for one dictionary bit size.
pub(crate) struct MarkerDecoder {
    cfg: ScanDecodeConfig,
    bits: usize,
    grid: SampleGrid,
    scratch_bits: Vec<u8>,
    scratch_thr: Vec<u8>,
}

impl MarkerDecoder {
    pub fn new(cfg: ScanDecodeConfig, bits: usize) -> Option<Self> {
        let grid = SampleGrid::new(&cfg, bits)?;
        Some(Self {
            scratch_bits: Vec::with_capacity(grid.points.len()),
            scratch_thr: Vec::with_capacity(grid.threshold_points.len()),
            cfg,
            bits,
            grid,
        })
    }

    /// Sample the cells of the marker whose outline is `corners`
    /// (clockwise in image coordinates, first corner = grid origin).
    pub fn decode(
        &mut self,
        img: &GrayImageView<'_>,
        corners: &[Point2<f32>; 4],
    ) -> Option<MarkerObservation> {
        let h = homography_from_4pt(&self.grid.square, corners)?;
        self.decode_warped(img, &h)
    }

    fn decode_warped(
        &mut self,
        img: &GrayImageView<'_>,
        h: &Homography,
    ) -> Option<MarkerObservation> {
        self.scratch_bits.clear();
        for p in &self.grid.points {
            let q = h.apply(*p);
            let v = sample_mean_3x3(img, q.x, q.y)?;
            self.scratch_bits.push(v);
        }

        self.scratch_thr.clear();
        for p in &self.grid.threshold_points {
            let q = h.apply(*p);
            if let Some(v) = sample_mean_3x3(img, q.x, q.y) {
                self.scratch_thr.push(v);
            }
        }

        decode_samples(
            &self.scratch_bits,
            &self.scratch_thr,
            self.grid.cells,
            self.bits,
            &self.cfg,
        )
    }
}

fn decode_samples(
    samples: &[u8],
    thr_samples: &[u8],
    cells: usize,
    bits: usize,
    cfg: &ScanDecodeConfig,
) -> Option<MarkerObservation> {
    if samples.len() != cells * cells {
        return None;
    }
    let (lo, hi) = samples
        .iter()
        .fold((255u8, 0u8), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if hi.saturating_sub(lo) < MIN_CONTRAST {
        return None;
    }

    let thr = if thr_samples.is_empty() {
        otsu_threshold_from_samples(samples)
    } else {
        otsu_threshold_from_samples(thr_samples)
    };

    let border = cfg.border_bits;
    let polarities: &[bool] = if cfg.allow_inverted {
        &[false, true]
    } else {
        &[false]
    };

    let mut best: Option<MarkerObservation> = None;
    for &inverted in polarities {
        let mut border_ok = 0u32;
        let mut border_total = 0u32;
        let mut code = 0u64;

        for cy in 0..cells {
            for cx in 0..cells {
                let is_black = (samples[cy * cells + cx] <= thr) != inverted;
                let is_border = cx < border
                    || cy < border
                    || cx >= cells - border
                    || cy >= cells - border;
                if is_border {
                    border_total += 1;
                    border_ok += is_black as u32;
                } else if is_black {
                    code |= 1u64 << ((cy - border) * bits + (cx - border));
                }
            }
        }

        let border_score = if border_total > 0 {
            border_ok as f32 / border_total as f32
        } else {
            1.0
        };
        if border_score < cfg.min_border_score {
            continue;
        }
        if best.is_none_or(|b| border_score > b.border_score) {
            best = Some(MarkerObservation { code, border_score });
        }
    }

    best
}

fn sample_mean_3x3(img: &GrayImageView<'_>, x: f32, y: f32) -> Option<u8> {
    let ix = x.floor() as i32;
    let iy = y.floor() as i32;
    if ix < 1 || iy < 1 || ix + 1 >= img.width as i32 || iy + 1 >= img.height as i32 {
        return None;
    }

    let mut sum = 0u32;
    for dy in -1..=1 {
        for dx in -1..=1 {
            sum += img.get(ix + dx, iy + dy) as u32;
        }
    }
    Some((sum / 9) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    // 4x4 inner bits, 1 border cell, 10 px per cell, 10 px white margin.
    fn marker_image(code: u64) -> GrayImage {
        let bits = 4;
        let cells = bits + 2;
        let cell_px = 10;
        let margin = 10;
        let side = cells * cell_px + 2 * margin;
        GrayImage::from_fn(side as u32, side as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            if x < margin || y < margin || x >= side - margin || y >= side - margin {
                return Luma([255]);
            }
            let cx = (x - margin) / cell_px;
            let cy = (y - margin) / cell_px;
            let border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
            let black = border || (code >> ((cy - 1) * bits + (cx - 1))) & 1 == 1;
            Luma([if black { 0 } else { 255 }])
        })
    }

    fn outline() -> [Point2<f32>; 4] {
        [
            Point2::new(10.0, 10.0),
            Point2::new(70.0, 10.0),
            Point2::new(70.0, 70.0),
            Point2::new(10.0, 70.0),
        ]
    }

    #[test]
    fn reads_code_from_axis_aligned_marker() {
        let code = 0b1011_0010_0110_1001;
        let img = marker_image(code);
        let view = GrayImageView::from_luma(&img);

        let mut decoder = MarkerDecoder::new(ScanDecodeConfig::default(), 4).expect("decoder");
        let obs = decoder.decode(&view, &outline()).expect("observation");
        assert_eq!(obs.code, code);
        assert!(obs.border_score > 0.99);
    }

    #[test]
    fn white_on_black_needs_inverted_polarity() {
        let code = 0b0110_0001_1000_0101;
        let mut img = marker_image(code);
        image::imageops::invert(&mut img);
        let view = GrayImageView::from_luma(&img);

        let mut decoder = MarkerDecoder::new(ScanDecodeConfig::default(), 4).expect("decoder");
        assert!(decoder.decode(&view, &outline()).is_none());

        let cfg = ScanDecodeConfig {
            allow_inverted: true,
            ..ScanDecodeConfig::default()
        };
        let mut decoder = MarkerDecoder::new(cfg, 4).expect("decoder");
        let obs = decoder.decode(&view, &outline()).expect("observation");
        assert_eq!(obs.code, code);
    }

    #[test]
    fn shifted_corner_order_reads_rotated_grid() {
        let code = 0b0000_0000_0000_0001; // single black cell at the top-left
        let img = marker_image(code);
        let view = GrayImageView::from_luma(&img);
        let mut corners = outline();
        corners.rotate_left(1); // start at the top-right

        let mut decoder = MarkerDecoder::new(ScanDecodeConfig::default(), 4).expect("decoder");
        let obs = decoder.decode(&view, &corners).expect("observation");
        // the printed top-left cell now sits at the bottom-left of the read grid
        assert_eq!(obs.code, 1 << 12);
    }

    #[test]
    fn blank_area_has_no_border() {
        let img = GrayImage::from_pixel(80, 80, Luma([255]));
        let view = GrayImageView::from_luma(&img);
        let mut decoder = MarkerDecoder::new(ScanDecodeConfig::default(), 4).expect("decoder");
        assert!(decoder.decode(&view, &outline()).is_none());
    }

    #[test]
    fn samples_need_a_full_window() {
        let img = marker_image(0);
        let view = GrayImageView::from_luma(&img);
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(80.0, 0.0),
            Point2::new(80.0, 80.0),
            Point2::new(0.0, 80.0),
        ];
        let cfg = ScanDecodeConfig {
            border_bits: 0,
            ..ScanDecodeConfig::default()
        };
        let mut decoder = MarkerDecoder::new(cfg, 6).expect("decoder");
        assert!(decoder.decode(&view, &corners).is_some());
        let tiny = GrayImage::new(1, 1);
        assert!(decoder
            .decode(&GrayImageView::from_luma(&tiny), &corners)
            .is_none());
    }
}
