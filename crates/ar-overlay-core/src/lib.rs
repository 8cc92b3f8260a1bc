//! Geometry and image primitives for marker overlay compositing.
//!
//! This crate is intentionally small and does not know about markers or
//! dictionaries. It provides:
//! - [`Quad`]: four ordered corners (TL, TR, BR, BL) with degeneracy checks,
//! - [`Homography`] and the Hartley-normalised 4-point solver,
//! - backward perspective warping of RGB images and the region helpers used to
//!   cut and merge the warped result into a frame,
//! - a minimal stderr logger (and an optional `tracing` subscriber).

mod homography;
mod logger;
mod quad;
mod sampling;
mod warp;

pub use homography::{homography_from_4pt, homography_rect_to_quad, Homography};
pub use quad::{Degeneracy, GeometryError, Quad};
pub use sampling::{sample_bilinear_rgb, GrayImageView};
pub use warp::{add_saturating, fill_region, warp_perspective_rgb, QuadRegion};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
