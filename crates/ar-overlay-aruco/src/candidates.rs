//! Quadrilateral candidates from the outer contours of a binary image.

use crate::QuadDetectorParams;
use ar_overlay_core::Quad;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use nalgebra::Point2;

/// Find convex four-corner outlines in `binary` (foreground = non-zero).
///
/// Corners come out clockwise in image coordinates (y down), starting at an
/// arbitrary corner. Near-duplicate outlines keep only the larger one.
pub(crate) fn find_candidates(binary: &GrayImage, params: &QuadDetectorParams) -> Vec<Quad> {
    let (w, h) = binary.dimensions();
    let max_dim = w.max(h) as f32;
    let min_perimeter = params.min_perimeter_rate * max_dim;
    let max_perimeter = params.max_perimeter_rate * max_dim;

    let mut quads = Vec::new();
    for contour in find_contours::<i32>(binary) {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let len = contour.points.len() as f32;
        if len < min_perimeter || len > max_perimeter {
            continue;
        }

        let points: Vec<Point2<f32>> = contour.points.iter().map(to_point).collect();
        let perimeter = closed_length(&points);
        let Some(mut corners) = approx_quad(&points, params.polygon_approx_rate * perimeter)
        else {
            continue;
        };
        ensure_clockwise(&mut corners);

        let quad = Quad::new(corners);
        if !quad.is_convex() {
            continue;
        }
        let min_edge = quad.min_edge_length();
        if min_edge < params.min_edge_px
            || min_edge < params.min_corner_distance_rate * quad.perimeter()
        {
            continue;
        }
        if !inside_margin(&quad, w, h, params.min_border_distance_px) {
            continue;
        }
        quads.push(quad);
    }

    log::trace!("{} quad candidates", quads.len());
    suppress_near_duplicates(quads, params.min_marker_distance_rate)
}

fn to_point(p: &Point<i32>) -> Point2<f32> {
    Point2::new(p.x as f32, p.y as f32)
}

fn closed_length(points: &[Point2<f32>]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| (points[(i + 1) % n] - points[i]).norm())
        .sum()
}

/// Douglas-Peucker on a closed contour; `Some` only when exactly four
/// vertices survive.
///
/// The contour is split at its two mutually farthest points, which are
/// vertices of any convex outline, so the seams never leave a spurious
/// vertex mid-edge.
fn approx_quad(points: &[Point2<f32>], epsilon: f32) -> Option<[Point2<f32>; 4]> {
    if points.len() < 4 {
        return None;
    }

    let a = farthest_from(points, points[0]);
    let b = farthest_from(points, points[a]);
    let (i, j) = (a.min(b), a.max(b));
    if i == j {
        return None;
    }

    let first: Vec<Point2<f32>> = points[i..=j].to_vec();
    let second: Vec<Point2<f32>> = points[j..]
        .iter()
        .chain(points[..=i].iter())
        .copied()
        .collect();

    let mut keep = Vec::with_capacity(8);
    simplify_open(&first, epsilon, &mut keep);
    simplify_open(&second, epsilon, &mut keep);

    <[Point2<f32>; 4]>::try_from(keep).ok()
}

fn farthest_from(points: &[Point2<f32>], origin: Point2<f32>) -> usize {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, (p - origin).norm_squared()))
        .fold((0, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0
}

/// Append the simplified chain, excluding its last point.
fn simplify_open(chain: &[Point2<f32>], epsilon: f32, out: &mut Vec<Point2<f32>>) {
    let Some((&start, rest)) = chain.split_first() else {
        return;
    };
    let Some(&end) = rest.last() else {
        out.push(start);
        return;
    };

    let mut max_dist = 0.0;
    let mut split = 0;
    for (k, p) in chain.iter().enumerate().take(chain.len() - 1).skip(1) {
        let d = distance_to_line(*p, start, end);
        if d > max_dist {
            max_dist = d;
            split = k;
        }
    }

    if max_dist > epsilon {
        simplify_open(&chain[..=split], epsilon, out);
        simplify_open(&chain[split..], epsilon, out);
    } else {
        out.push(start);
    }
}

fn distance_to_line(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len = ab.norm();
    if len <= f32::EPSILON {
        return (p - a).norm();
    }
    let ap = p - a;
    (ab.x * ap.y - ab.y * ap.x).abs() / len
}

fn ensure_clockwise(corners: &mut [Point2<f32>; 4]) {
    let d1 = corners[1] - corners[0];
    let d2 = corners[2] - corners[0];
    if d1.x * d2.y - d1.y * d2.x < 0.0 {
        corners.swap(1, 3);
    }
}

fn inside_margin(quad: &Quad, w: u32, h: u32, margin: f32) -> bool {
    quad.corners().iter().all(|c| {
        c.x >= margin
            && c.y >= margin
            && c.x <= w as f32 - 1.0 - margin
            && c.y <= h as f32 - 1.0 - margin
    })
}

/// Drop the smaller of any two outlines whose corners nearly coincide
/// (up to a cyclic shift).
fn suppress_near_duplicates(quads: Vec<Quad>, rate: f32) -> Vec<Quad> {
    let n = quads.len();
    let perimeters: Vec<f32> = quads.iter().map(Quad::perimeter).collect();
    let mut removed = vec![false; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if removed[i] || removed[j] {
                continue;
            }
            let limit = rate * perimeters[i].min(perimeters[j]);
            if mean_sq_corner_distance(&quads[i], &quads[j]) < limit * limit {
                if perimeters[i] < perimeters[j] {
                    removed[i] = true;
                } else {
                    removed[j] = true;
                }
            }
        }
    }

    quads
        .into_iter()
        .zip(removed)
        .filter_map(|(q, r)| (!r).then_some(q))
        .collect()
}

fn mean_sq_corner_distance(a: &Quad, b: &Quad) -> f32 {
    (0..4)
        .map(|shift| {
            let b = b.rotated(shift);
            a.corners()
                .iter()
                .zip(b.corners())
                .map(|(p, q)| (p - q).norm_squared())
                .sum::<f32>()
                / 4.0
        })
        .fold(f32::INFINITY, f32::min)
}
