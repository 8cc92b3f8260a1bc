//! Backward perspective warping and the region helpers that merge a warped
//! image into a frame.

use crate::{sample_bilinear_rgb, Homography};
use image::{Rgb, RgbImage};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Slack (in pixels) when deciding whether a mapped point lies on a
/// rectangle boundary.
const EDGE_EPS: f64 = 1e-6;

/// Frame pixels covered by a `src_w × src_h` rectangle mapped through a
/// homography.
///
/// A pixel `(x, y)` belongs to the region when its backward-mapped position
/// `H⁻¹·(x, y)` falls inside `[0, src_w] × [0, src_h]`. The same predicate
/// drives [`warp_perspective_rgb`] and [`fill_region`], so a hole cut with one
/// is exactly the area painted by the other.
#[derive(Clone, Debug)]
pub struct QuadRegion {
    src_from_dst: Homography,
    src_w: u32,
    src_h: u32,
    // inclusive pixel bounds, clipped to the destination
    x_min: u32,
    y_min: u32,
    x_max: u32,
    y_max: u32,
    empty: bool,
}

impl QuadRegion {
    /// Build the region for `dst_from_src` in a destination of
    /// `out_w × out_h` pixels. Returns `None` when the homography is not
    /// invertible or sends a rectangle corner to infinity.
    pub fn new(
        dst_from_src: &Homography,
        src_w: u32,
        src_h: u32,
        out_w: u32,
        out_h: u32,
    ) -> Option<Self> {
        let src_from_dst = dst_from_src.inverse()?;

        let (w, h) = (src_w as f64, src_h as f64);
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)] {
            let p = dst_from_src.apply_f64(x, y)?;
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }

        let empty = out_w == 0
            || out_h == 0
            || max.x < 0.0
            || max.y < 0.0
            || min.x > (out_w - 1) as f64
            || min.y > (out_h - 1) as f64;

        let clip = |v: f64, hi: u32| v.clamp(0.0, hi.saturating_sub(1) as f64) as u32;

        Some(Self {
            src_from_dst,
            src_w,
            src_h,
            x_min: clip((min.x - EDGE_EPS).ceil(), out_w),
            y_min: clip((min.y - EDGE_EPS).ceil(), out_h),
            x_max: clip((max.x + EDGE_EPS).floor(), out_w),
            y_max: clip((max.y + EDGE_EPS).floor(), out_h),
            empty,
        })
    }

    /// Source-rectangle position of destination pixel `(x, y)`, or `None`
    /// when the pixel lies outside the region.
    #[inline]
    pub fn source_coord(&self, x: u32, y: u32) -> Option<Point2<f64>> {
        if self.empty || x < self.x_min || x > self.x_max || y < self.y_min || y > self.y_max {
            return None;
        }
        let p = self.src_from_dst.apply_f64(x as f64, y as f64)?;
        let inside = p.x >= -EDGE_EPS
            && p.y >= -EDGE_EPS
            && p.x <= self.src_w as f64 + EDGE_EPS
            && p.y <= self.src_h as f64 + EDGE_EPS;
        inside.then_some(p)
    }

    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.source_coord(x, y).is_some()
    }

    /// Inclusive pixel bounds `(x_min, y_min, x_max, y_max)`, or `None` when
    /// the region misses the destination entirely.
    pub fn pixel_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        (!self.empty).then_some((self.x_min, self.y_min, self.x_max, self.y_max))
    }

    /// Visit every pixel of the region with its source position.
    pub fn for_each(&self, mut f: impl FnMut(u32, u32, Point2<f64>)) {
        let Some((x0, y0, x1, y1)) = self.pixel_bounds() else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                if let Some(p) = self.source_coord(x, y) {
                    f(x, y, p);
                }
            }
        }
    }
}

/// Warp `src` into an `out_w × out_h` buffer by backward mapping.
///
/// Every pixel of `region` is sampled bilinearly from `src` (pixel-centre
/// convention: source coordinate `u` reads pixel index `u - 0.5`); all other
/// pixels stay zero.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, region), fields(src_w = src.width(), src_h = src.height()))
)]
pub fn warp_perspective_rgb(
    src: &RgbImage,
    region: &QuadRegion,
    out_w: u32,
    out_h: u32,
) -> RgbImage {
    let mut out = RgbImage::new(out_w, out_h);
    if src.width() == 0 || src.height() == 0 {
        return out;
    }

    region.for_each(|x, y, p| {
        if x < out_w && y < out_h {
            let v = sample_bilinear_rgb(src, p.x - 0.5, p.y - 0.5);
            out.put_pixel(x, y, Rgb(v));
        }
    });
    out
}

/// Paint every pixel of `region` in `img` with `color`.
pub fn fill_region(img: &mut RgbImage, region: &QuadRegion, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    region.for_each(|x, y, _| {
        if x < w && y < h {
            img.put_pixel(x, y, color);
        }
    });
}

/// Per-channel saturating `dst += src` over the overlapping area.
pub fn add_saturating(dst: &mut RgbImage, src: &RgbImage) {
    let w = dst.width().min(src.width());
    let h = dst.height().min(src.height());
    for y in 0..h {
        for x in 0..w {
            let s = src.get_pixel(x, y).0;
            if s == [0, 0, 0] {
                continue;
            }
            let d = dst.get_pixel_mut(x, y);
            for c in 0..3 {
                d.0[c] = d.0[c].saturating_add(s[c]);
            }
        }
    }
}
