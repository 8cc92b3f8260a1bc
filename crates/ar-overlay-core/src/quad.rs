//! Ordered marker quadrilaterals.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Corners closer than this (in pixels) count as coincident.
const MIN_CORNER_SEPARATION: f32 = 1e-3;
/// Sine of the smallest angle accepted between two edges from a shared corner.
const MIN_SINE: f64 = 1e-6;

/// Why a quadrilateral cannot support a homography.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Degeneracy {
    /// A corner is NaN or infinite.
    NonFinite { index: usize },
    /// Two corners share the same position.
    CoincidentCorners { first: usize, second: usize },
    /// Three corners lie on one line.
    CollinearCorners { indices: [usize; 3] },
    /// The 8×8 solve failed even though the corners passed the checks above.
    SingularSystem,
}

impl std::fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Degeneracy::NonFinite { index } => write!(f, "corner {index} is not finite"),
            Degeneracy::CoincidentCorners { first, second } => {
                write!(f, "corners {first} and {second} coincide")
            }
            Degeneracy::CollinearCorners { indices } => write!(
                f,
                "corners {}, {} and {} are collinear",
                indices[0], indices[1], indices[2]
            ),
            Degeneracy::SingularSystem => write!(f, "homography system is singular"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    #[error("a quadrilateral needs exactly 4 corners, got {len}")]
    MalformedQuad { len: usize },
    #[error("degenerate quadrilateral: {0}")]
    DegenerateQuad(Degeneracy),
}

/// Four marker corners in image pixels, ordered TL, TR, BR, BL.
///
/// The order is what ties each corner to a corner of the source rectangle;
/// a swapped pair produces a mirrored or twisted warp.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    corners: [Point2<f32>; 4],
}

impl Quad {
    pub fn new(corners: [Point2<f32>; 4]) -> Self {
        Self { corners }
    }

    /// Build from `[[x, y]; 4]` pixel coordinates.
    pub fn from_xy(points: [[f32; 2]; 4]) -> Self {
        Self::new(points.map(|[x, y]| Point2::new(x, y)))
    }

    #[inline]
    pub fn corners(&self) -> &[Point2<f32>; 4] {
        &self.corners
    }

    #[inline]
    pub fn top_left(&self) -> Point2<f32> {
        self.corners[0]
    }

    #[inline]
    pub fn top_right(&self) -> Point2<f32> {
        self.corners[1]
    }

    #[inline]
    pub fn bottom_right(&self) -> Point2<f32> {
        self.corners[2]
    }

    #[inline]
    pub fn bottom_left(&self) -> Point2<f32> {
        self.corners[3]
    }

    /// Sum of the four edge lengths.
    pub fn perimeter(&self) -> f32 {
        (0..4)
            .map(|i| (self.corners[(i + 1) % 4] - self.corners[i]).norm())
            .sum()
    }

    /// Shortest of the four edges.
    pub fn min_edge_length(&self) -> f32 {
        (0..4)
            .map(|i| (self.corners[(i + 1) % 4] - self.corners[i]).norm())
            .fold(f32::INFINITY, f32::min)
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Point2<f32>, Point2<f32>) {
        let mut min = self.corners[0];
        let mut max = self.corners[0];
        for p in &self.corners[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// True when all turns have the same sign (either winding).
    pub fn is_convex(&self) -> bool {
        let mut sign = 0.0_f32;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            let c = self.corners[(i + 2) % 4];
            let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
            if cross == 0.0 {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Rotate the corner list so that `corners[shift]` becomes the first corner.
    pub fn rotated(&self, shift: usize) -> Self {
        let mut corners = self.corners;
        corners.rotate_left(shift % 4);
        Self::new(corners)
    }

    /// Reject quads that cannot carry a homography: non-finite, coincident
    /// or collinear corners.
    pub fn validate(&self) -> Result<(), GeometryError> {
        for (index, p) in self.corners.iter().enumerate() {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(GeometryError::DegenerateQuad(Degeneracy::NonFinite {
                    index,
                }));
            }
        }

        for first in 0..4 {
            for second in (first + 1)..4 {
                let d = (self.corners[second] - self.corners[first]).norm();
                if d < MIN_CORNER_SEPARATION {
                    return Err(GeometryError::DegenerateQuad(
                        Degeneracy::CoincidentCorners { first, second },
                    ));
                }
            }
        }

        for indices in [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]] {
            let a = self.corners[indices[0]].cast::<f64>();
            let b = self.corners[indices[1]].cast::<f64>();
            let c = self.corners[indices[2]].cast::<f64>();
            let ab = b - a;
            let ac = c - a;
            let cross = ab.x * ac.y - ab.y * ac.x;
            if cross.abs() <= MIN_SINE * ab.norm() * ac.norm() {
                return Err(GeometryError::DegenerateQuad(
                    Degeneracy::CollinearCorners { indices },
                ));
            }
        }

        Ok(())
    }
}

impl TryFrom<&[Point2<f32>]> for Quad {
    type Error = GeometryError;

    fn try_from(points: &[Point2<f32>]) -> Result<Self, Self::Error> {
        let corners: [Point2<f32>; 4] = points
            .try_into()
            .map_err(|_| GeometryError::MalformedQuad { len: points.len() })?;
        Ok(Self::new(corners))
    }
}

impl From<[Point2<f32>; 4]> for Quad {
    fn from(corners: [Point2<f32>; 4]) -> Self {
        Self::new(corners)
    }
}
