//! Square fiducial marker detection for the overlay pipeline.
//!
//! This crate provides:
//! - [`DictionaryKind`]: the supported dictionary variants as a closed enum,
//! - [`Dictionary`]: a validated code table loaded from a JSON codebook,
//! - [`Matcher`]: Hamming matching of observed codes over all 4 rotations,
//! - [`MarkerDetector`]: the seam the frame loop talks to, and
//!   [`QuadDetector`], the contour/quad based implementation,
//! - [`render_marker`]: printable marker images from a dictionary.
//!
//! Code tables are data, not code: nothing here invents a dictionary. A
//! detector only finds markers printed from the same codebook it was given.

mod candidates;
mod decode;
mod detector;
mod dictionary;
mod matcher;
mod render;
mod threshold;

pub use decode::ScanDecodeConfig;
pub use detector::{
    draw_detections, Detection, DetectorError, MarkerDetector, MarkerId, QuadDetector,
    QuadDetectorParams,
};
pub use dictionary::{Codebook, Dictionary, DictionaryError, DictionaryKind};
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use render::render_marker;
pub use threshold::{binarize, ThresholdMode};
