//! Perspective compositing of a replacement image onto a marker.

use crate::label::draw_digits;
use crate::MarkerId;
use ar_overlay_core::{
    add_saturating, fill_region, homography_rect_to_quad, warp_perspective_rgb, Degeneracy,
    GeometryError, Quad, QuadRegion,
};
use image::{Rgb, RgbImage};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Why one detection could not be composited. The frame is untouched in
/// every case.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeError {
    #[error("a marker outline needs exactly 4 corners, got {len}")]
    MalformedQuad { len: usize },
    #[error("degenerate marker outline: {0}")]
    DegenerateQuad(Degeneracy),
    #[error("asset for marker {id} is empty ({width}x{height})")]
    EmptyAsset {
        id: MarkerId,
        width: u32,
        height: u32,
    },
}

impl From<GeometryError> for CompositeError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::MalformedQuad { len } => Self::MalformedQuad { len },
            GeometryError::DegenerateQuad(d) => Self::DegenerateQuad(d),
        }
    }
}

/// Id label drawn at the marker's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelStyle {
    pub color: [u8; 3],
    /// Glyph height in pixels.
    pub height: f32,
    /// Stroke width in pixels.
    pub thickness: u32,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 255],
            height: 18.0,
            thickness: 2,
        }
    }
}

/// Warps asset images onto marker outlines inside a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Compositor {
    label: Option<LabelStyle>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(Some(LabelStyle::default()))
    }
}

impl Compositor {
    pub fn new(label: Option<LabelStyle>) -> Self {
        Self { label }
    }

    pub fn without_label() -> Self {
        Self::new(None)
    }

    pub fn label(&self) -> Option<&LabelStyle> {
        self.label.as_ref()
    }

    /// Replace the marker outlined by `quad` (TL, TR, BR, BL) with `asset`.
    ///
    /// The asset rectangle `[0,w]×[0,h]` is mapped onto the quad, pixels
    /// covered by it are cleared and the warped asset is added on top. With a
    /// label style, the decimal `id` is then written with its baseline at the
    /// top-left corner. On error `frame` is left exactly as it was.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame, quad, asset))
    )]
    pub fn composite(
        &self,
        frame: &mut RgbImage,
        quad: &Quad,
        id: MarkerId,
        asset: &RgbImage,
    ) -> Result<(), CompositeError> {
        let (w, h) = asset.dimensions();
        if w == 0 || h == 0 {
            return Err(CompositeError::EmptyAsset {
                id,
                width: w,
                height: h,
            });
        }

        let (fw, fh) = frame.dimensions();
        let hmg = homography_rect_to_quad(w, h, quad)?;
        let region = QuadRegion::new(&hmg, w, h, fw, fh)
            .ok_or(CompositeError::DegenerateQuad(Degeneracy::SingularSystem))?;

        let warped = warp_perspective_rgb(asset, &region, fw, fh);
        fill_region(frame, &region, Rgb([0, 0, 0]));
        add_saturating(frame, &warped);

        if let Some(style) = &self.label {
            let tl = quad.top_left();
            draw_digits(
                frame,
                &id.to_string(),
                (tl.x, tl.y),
                style.height,
                style.thickness,
                Rgb(style.color),
            );
        }
        Ok(())
    }

    /// Like [`composite`](Self::composite) for an outline given as a point
    /// slice; anything other than 4 points is [`CompositeError::MalformedQuad`].
    pub fn composite_points(
        &self,
        frame: &mut RgbImage,
        corners: &[Point2<f32>],
        id: MarkerId,
        asset: &RgbImage,
    ) -> Result<(), CompositeError> {
        let quad = Quad::try_from(corners)?;
        self.composite(frame, &quad, id, asset)
    }
}
