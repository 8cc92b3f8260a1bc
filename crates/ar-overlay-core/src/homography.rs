use crate::quad::{Degeneracy, GeometryError, Quad};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Projective transform `dst ~ H * src`, stored with `h[(2,2)] == 1` when
/// produced by the solvers in this module.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    /// Full-precision mapping. Returns `None` for points sent to infinity.
    #[inline]
    pub fn apply_f64(&self, x: f64, y: f64) -> Option<Point2<f64>> {
        let v = self.h * Vector3::new(x, y, 1.0);
        let w = v[2];
        if w.abs() < 1e-12 {
            return None;
        }
        Some(Point2::new(v[0] / w, v[1] / w))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points4(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    // translate to centroid, scale so the mean distance is sqrt(2)
    let mut cx = 0.0_f64;
    let mut cy = 0.0_f64;
    for p in pts {
        cx += p.x as f64;
        cy += p.y as f64;
    }
    cx /= 4.0;
    cy /= 4.0;

    let mut mean_dist = 0.0_f64;
    for p in pts {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= 4.0;

    let t = hartley_normalization(cx, cy, mean_dist);

    let out = pts.map(|p| {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new(v[0], v[1])
    });

    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Compute H such that `dst ~ H * src` from 4 point correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when the linear system is singular.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h_den = denormalize_homography(hn, t_src, t_dst)?;
    let h_den = normalize_homography(h_den)?;
    if h_den.iter().any(|v| !v.is_finite()) {
        return None;
    }

    Some(Homography::new(h_den))
}

/// Homography taking the `width × height` rectangle `[(0,0),(w,0),(w,h),(0,h)]`
/// onto `quad` (TL, TR, BR, BL).
///
/// The quad is validated first, so collinear or coincident corners fail with
/// [`GeometryError::DegenerateQuad`] instead of producing a meaningless matrix.
pub fn homography_rect_to_quad(
    width: u32,
    height: u32,
    quad: &Quad,
) -> Result<Homography, GeometryError> {
    quad.validate()?;

    let w = width as f32;
    let h = height as f32;
    let rect = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];

    homography_from_4pt(&rect, quad.corners())
        .ok_or(GeometryError::DegenerateQuad(Degeneracy::SingularSystem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(50.0_f32, -20.0),
            Point2::new(320.0_f32, 200.0),
        ] {
            let q = h.apply(p);
            let back = inv.apply(q);
            assert_close(back, p, 1e-3);
        }
    }

    #[test]
    fn four_point_specialization_recovers_h() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        let rect = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(180.0_f32, 0.0),
            Point2::new(180.0_f32, 130.0),
            Point2::new(0.0_f32, 130.0),
        ];
        let dst = rect.map(|p| ground_truth.apply(p));

        let recovered = homography_from_4pt(&rect, &dst).expect("recoverable");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(150.0, 120.0),
        ] {
            assert_close(recovered.apply(p), ground_truth.apply(p), 1e-3);
        }
    }

    #[test]
    fn rect_corners_land_on_quad_corners() {
        let quad = Quad::new([
            Point2::new(212.5, 40.0),
            Point2::new(390.0, 71.25),
            Point2::new(371.0, 260.0),
            Point2::new(190.0, 222.0),
        ]);

        for (w, h) in [(50_u32, 50_u32), (640, 480), (17, 301)] {
            let hmg = homography_rect_to_quad(w, h, &quad).expect("homography");
            let rect = [
                Point2::new(0.0_f32, 0.0),
                Point2::new(w as f32, 0.0),
                Point2::new(w as f32, h as f32),
                Point2::new(0.0, h as f32),
            ];
            for (src, dst) in rect.iter().zip(quad.corners()) {
                assert_abs_diff_eq!(hmg.apply(*src), *dst, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn recomputation_is_deterministic() {
        let quad = Quad::new([
            Point2::new(10.0, 12.0),
            Point2::new(130.0, 5.0),
            Point2::new(140.0, 118.0),
            Point2::new(4.0, 101.0),
        ]);
        let a = homography_rect_to_quad(320, 240, &quad).expect("first");
        let b = homography_rect_to_quad(320, 240, &quad).expect("second");
        assert_eq!(a.to_array(), b.to_array());
    }

    #[test]
    fn collinear_quad_is_rejected() {
        let quad = Quad::new([
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(0.0, 30.0),
        ]);
        let err = homography_rect_to_quad(10, 10, &quad).unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateQuad(_)));
    }

    #[test]
    fn apply_f64_rejects_points_at_infinity() {
        let h = Homography::new(Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            1.0, 0.0, 0.0,
        ));
        assert!(h.apply_f64(0.0, 5.0).is_none());
        assert!(h.apply_f64(2.0, 5.0).is_some());
    }
}
