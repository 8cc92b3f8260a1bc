//! The `MarkerDetector` seam and the contour/quad based implementation.

use crate::candidates::find_candidates;
use crate::decode::MarkerDecoder;
use crate::{binarize, Dictionary, Matcher, ScanDecodeConfig, ThresholdMode};
use ar_overlay_core::{GrayImageView, Quad};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Marker id: the index of a code in its dictionary.
pub type MarkerId = u32;

/// One decoded marker in a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub id: MarkerId,
    /// Outline with corner 0 at the marker's own top-left, clockwise.
    pub quad: Quad,
    pub hamming: u8,
}

/// Anything that can find markers in an RGB frame.
///
/// Detectors may keep scratch state between frames, hence `&mut self`.
pub trait MarkerDetector {
    fn detect(&mut self, frame: &RgbImage) -> Vec<Detection>;
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for &mut T {
    fn detect(&mut self, frame: &RgbImage) -> Vec<Detection> {
        (**self).detect(frame)
    }
}

impl<T: MarkerDetector + ?Sized> MarkerDetector for Box<T> {
    fn detect(&mut self, frame: &RgbImage) -> Vec<Detection> {
        (**self).detect(frame)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DetectorError {
    #[error("scan config cannot sample {bits}x{bits} markers (px_per_marker={px_per_marker})")]
    InvalidScanConfig { bits: usize, px_per_marker: f32 },
}

/// Parameters for [`QuadDetector`].
///
/// Rates are relative to the larger image side (perimeters) or to the
/// candidate's own perimeter (edges, duplicates).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadDetectorParams {
    pub threshold: ThresholdMode,
    pub min_perimeter_rate: f32,
    pub max_perimeter_rate: f32,
    /// Douglas-Peucker tolerance as a fraction of the contour length.
    pub polygon_approx_rate: f32,
    pub min_corner_distance_rate: f32,
    pub min_edge_px: f32,
    pub min_border_distance_px: f32,
    pub min_marker_distance_rate: f32,
    /// Defaults to `min(max_correction_bits, 2)` of the dictionary.
    pub max_hamming: Option<u8>,
    /// Keep only the lowest-Hamming detection per id. Off by default, so
    /// every printed copy of a marker is reported.
    pub dedup_by_id: bool,
    pub scan: ScanDecodeConfig,
}

impl Default for QuadDetectorParams {
    fn default() -> Self {
        Self {
            threshold: ThresholdMode::default(),
            min_perimeter_rate: 0.03,
            max_perimeter_rate: 4.0,
            polygon_approx_rate: 0.03,
            min_corner_distance_rate: 0.05,
            min_edge_px: 8.0,
            min_border_distance_px: 3.0,
            min_marker_distance_rate: 0.05,
            max_hamming: None,
            dedup_by_id: false,
            scan: ScanDecodeConfig::default(),
        }
    }
}

/// Contour-based square marker detector for one dictionary.
pub struct QuadDetector {
    params: QuadDetectorParams,
    matcher: Matcher,
    decoder: MarkerDecoder,
}

impl QuadDetector {
    pub fn new(dict: Dictionary, params: QuadDetectorParams) -> Result<Self, DetectorError> {
        let bits = dict.marker_size();
        let decoder = MarkerDecoder::new(params.scan.clone(), bits).ok_or(
            DetectorError::InvalidScanConfig {
                bits,
                px_per_marker: params.scan.px_per_marker,
            },
        )?;
        let max_hamming = params
            .max_hamming
            .unwrap_or_else(|| dict.max_correction_bits().min(2));

        Ok(Self {
            matcher: Matcher::new(dict, max_hamming),
            params,
            decoder,
        })
    }

    pub fn params(&self) -> &QuadDetectorParams {
        &self.params
    }

    pub fn dictionary(&self) -> &Dictionary {
        self.matcher.dictionary()
    }

    /// Candidate outlines before decoding (clockwise, arbitrary start corner).
    pub fn candidates(&self, frame: &RgbImage) -> Vec<Quad> {
        let gray = image::imageops::grayscale(frame);
        let binary = binarize(&gray, self.params.threshold);
        find_candidates(&binary, &self.params)
    }
}

impl MarkerDetector for QuadDetector {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(w = frame.width(), h = frame.height()))
    )]
    fn detect(&mut self, frame: &RgbImage) -> Vec<Detection> {
        let gray = image::imageops::grayscale(frame);
        let binary = binarize(&gray, self.params.threshold);
        let candidates = find_candidates(&binary, &self.params);
        let view = GrayImageView::from_luma(&gray);

        let mut out: Vec<Detection> = Vec::new();
        for cand in &candidates {
            let Some(obs) = self.decoder.decode(&view, cand.corners()) else {
                continue;
            };
            let Some(m) = self.matcher.match_code(obs.code) else {
                continue;
            };
            let det = Detection {
                id: m.id,
                quad: cand.rotated(m.rotation as usize),
                hamming: m.hamming,
            };

            if self.params.dedup_by_id {
                if let Some(prev) = out.iter_mut().find(|d| d.id == det.id) {
                    if det.hamming < prev.hamming {
                        *prev = det;
                    }
                    continue;
                }
            }
            out.push(det);
        }

        log::debug!(
            "{} candidates, {} markers decoded",
            candidates.len(),
            out.len()
        );
        out
    }
}

const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TOP_LEFT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Draw 1-pixel outlines of `detections` onto `frame`, with the edge leaving
/// each marker's top-left corner in a second colour. Interiors are untouched.
pub fn draw_detections(frame: &mut RgbImage, detections: &[Detection]) {
    for det in detections {
        let c = det.quad.corners();
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            let color = if i == 0 { TOP_LEFT_COLOR } else { OUTLINE_COLOR };
            draw_line_segment_mut(frame, (a.x, a.y), (b.x, b.y), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DictionaryKind;

    fn dict() -> Dictionary {
        let codes = (0..50u64).map(|i| (i * 0x2f1d + 0x1357) & 0xffff).collect();
        Dictionary::new(DictionaryKind::Dict4x4_50, 2, codes).expect("dict")
    }

    #[test]
    fn max_hamming_defaults_from_dictionary() {
        let det = QuadDetector::new(dict(), QuadDetectorParams::default()).expect("detector");
        assert_eq!(det.matcher.max_hamming(), 2);

        let params = QuadDetectorParams {
            max_hamming: Some(0),
            ..QuadDetectorParams::default()
        };
        let det = QuadDetector::new(dict(), params).expect("detector");
        assert_eq!(det.matcher.max_hamming(), 0);
    }

    #[test]
    fn tiny_sampling_square_is_rejected() {
        let params = QuadDetectorParams {
            scan: ScanDecodeConfig {
                px_per_marker: 4.0,
                ..ScanDecodeConfig::default()
            },
            ..QuadDetectorParams::default()
        };
        assert!(matches!(
            QuadDetector::new(dict(), params),
            Err(DetectorError::InvalidScanConfig { bits: 4, .. })
        ));
    }

    #[test]
    fn blank_frame_has_no_detections() {
        let mut det = QuadDetector::new(dict(), QuadDetectorParams::default()).expect("detector");
        let frame = RgbImage::from_pixel(64, 48, Rgb([200, 200, 200]));
        assert!(det.detect(&frame).is_empty());
    }

    #[test]
    fn outlines_leave_interior_untouched() {
        let mut frame = RgbImage::new(40, 40);
        let det = Detection {
            id: 3,
            quad: Quad::from_xy([[5.0, 5.0], [30.0, 5.0], [30.0, 30.0], [5.0, 30.0]]),
            hamming: 0,
        };
        draw_detections(&mut frame, &[det]);
        assert_eq!(frame.get_pixel(15, 5).0, TOP_LEFT_COLOR.0);
        assert_eq!(frame.get_pixel(30, 15).0, OUTLINE_COLOR.0);
        assert_eq!(frame.get_pixel(15, 15).0, [0, 0, 0]);
        assert_eq!(frame.get_pixel(2, 2).0, [0, 0, 0]);
    }

    #[test]
    fn params_round_trip_with_defaults() {
        let params: QuadDetectorParams =
            serde_json::from_str(r#"{"min_edge_px": 12.0}"#).expect("parse");
        assert_eq!(params.min_edge_px, 12.0);
        assert_eq!(params.scan, ScanDecodeConfig::default());
        assert!(!params.dedup_by_id);
    }
}
