//! Quadrilateral candidates from traced contours.

use crate::Contour;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four image corners with positive signed area in image coordinates
/// (clockwise on screen), corner 0 being the one closest to the image origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadCandidate {
    pub corners: [Point2<f32>; 4],
    pub area: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadParams {
    /// Douglas–Peucker tolerance relative to the contour perimeter.
    pub approx_accuracy_rate: f32,
    pub min_area_px: f32,
    pub min_side_px: f32,
    /// Corners closer than this to the image edge reject the candidate.
    pub min_border_distance_px: f32,
    /// Minimum `|sin|` of the turn at each corner; rejects collinear corners.
    pub min_corner_sin: f32,
    /// Quads whose mean corner distance is below this are duplicates.
    pub dedup_distance_px: f32,
}

impl Default for QuadParams {
    fn default() -> Self {
        Self {
            approx_accuracy_rate: 0.03,
            min_area_px: 64.0,
            min_side_px: 6.0,
            min_border_distance_px: 3.0,
            min_corner_sin: 0.05,
            dedup_distance_px: 3.0,
        }
    }
}

/// Reduce contours to convex quadrilaterals and drop near-duplicates.
pub fn find_quads(
    contours: &[Contour],
    width: usize,
    height: usize,
    params: &QuadParams,
) -> Vec<QuadCandidate> {
    let mut quads: Vec<QuadCandidate> = contours
        .iter()
        .filter_map(|c| quad_from_contour(c, width, height, params))
        .collect();

    // Larger area first (stable), so dedup keeps the larger of each pair.
    quads.sort_by(|a, b| b.area.total_cmp(&a.area));
    let mut kept: Vec<QuadCandidate> = Vec::with_capacity(quads.len());
    for q in quads {
        if kept
            .iter()
            .all(|k| mean_corner_distance(k, &q) >= params.dedup_distance_px)
        {
            kept.push(q);
        }
    }
    kept
}

fn quad_from_contour(
    contour: &Contour,
    width: usize,
    height: usize,
    params: &QuadParams,
) -> Option<QuadCandidate> {
    let eps = params.approx_accuracy_rate as f64 * contour.perimeter();
    let poly = approx_closed_polygon(&contour.points, eps);
    if poly.len() != 4 {
        return None;
    }

    let mut corners = [Point2::new(0.0f32, 0.0); 4];
    for (dst, src) in corners.iter_mut().zip(&poly) {
        *dst = Point2::new(src.x as f32, src.y as f32);
    }

    let mut area = signed_area(&corners);
    if area < 0.0 {
        corners.reverse();
        area = -area;
    }
    if area < params.min_area_px || !is_strictly_convex(&corners, params.min_corner_sin) {
        return None;
    }

    let min_side = (0..4)
        .map(|i| (corners[(i + 1) % 4] - corners[i]).norm())
        .fold(f32::INFINITY, f32::min);
    if min_side < params.min_side_px {
        return None;
    }

    let d = params.min_border_distance_px;
    let (max_x, max_y) = (width as f32 - 1.0 - d, height as f32 - 1.0 - d);
    if corners
        .iter()
        .any(|p| p.x < d || p.y < d || p.x > max_x || p.y > max_y)
    {
        return None;
    }

    // Start at the corner closest to the image origin.
    let start = (0..4)
        .min_by(|&a, &b| {
            let ka = (corners[a].x + corners[a].y, corners[a].y);
            let kb = (corners[b].x + corners[b].y, corners[b].y);
            ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);
    corners.rotate_left(start);

    Some(QuadCandidate { corners, area })
}

/// Shoelace area; positive for clockwise-on-screen order (y down).
pub(crate) fn signed_area(c: &[Point2<f32>; 4]) -> f32 {
    0.5 * (0..4)
        .map(|i| {
            let (a, b) = (c[i], c[(i + 1) % 4]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f32>()
}

/// All turns share the positive sign and none is nearly straight.
fn is_strictly_convex(c: &[Point2<f32>; 4], min_sin: f32) -> bool {
    (0..4).all(|i| {
        let e0 = c[(i + 1) % 4] - c[i];
        let e1 = c[(i + 2) % 4] - c[(i + 1) % 4];
        let cross = e0.x * e1.y - e0.y * e1.x;
        cross > min_sin * e0.norm() * e1.norm()
    })
}

fn mean_corner_distance(a: &QuadCandidate, b: &QuadCandidate) -> f32 {
    (0..4)
        .map(|shift| {
            (0..4)
                .map(|k| (a.corners[k] - b.corners[(k + shift) % 4]).norm())
                .sum::<f32>()
                / 4.0
        })
        .fold(f32::INFINITY, f32::min)
}

/// Douglas–Peucker on a closed ring.
///
/// The ring is split at two mutually distant points (both are kept as
/// vertices); each half is simplified as an open chain.
pub(crate) fn approx_closed_polygon(points: &[Point2<i32>], eps: f64) -> Vec<Point2<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let farthest_from = |p: Point2<i32>| {
        (0..n)
            .max_by_key(|&i| (points[i].x - p.x).pow(2) + (points[i].y - p.y).pow(2))
            .unwrap_or(0)
    };
    let a = farthest_from(points[0]);
    let b = farthest_from(points[a]);
    if a == b {
        return vec![points[a]];
    }

    let ring = |from: usize, to: usize| -> Vec<Point2<i32>> {
        let len = (to + n - from) % n;
        (0..=len).map(|k| points[(from + k) % n]).collect()
    };

    let mut out = Vec::new();
    let first = ring(a, b);
    simplify_open(&first, eps, &mut out);
    out.pop(); // `b` starts the second half
    let second = ring(b, a);
    simplify_open(&second, eps, &mut out);
    out.pop(); // `a` closes the ring
    out
}

/// Appends the simplified chain (both endpoints included) to `out`.
fn simplify_open(chain: &[Point2<i32>], eps: f64, out: &mut Vec<Point2<i32>>) {
    let mut keep = vec![false; chain.len()];
    keep[0] = true;
    keep[chain.len() - 1] = true;

    let mut stack = vec![(0usize, chain.len() - 1)];
    while let Some((lo, hi)) = stack.pop() {
        if hi <= lo + 1 {
            continue;
        }
        let (mut best, mut best_d) = (lo, -1.0);
        for i in lo + 1..hi {
            let d = point_segment_distance(chain[i], chain[lo], chain[hi]);
            if d > best_d {
                best = i;
                best_d = d;
            }
        }
        if best_d > eps {
            keep[best] = true;
            stack.push((lo, best));
            stack.push((best, hi));
        }
    }

    out.extend(chain.iter().zip(&keep).filter(|&(_, &k)| k).map(|(p, _)| *p));
}

fn point_segment_distance(p: Point2<i32>, a: Point2<i32>, b: Point2<i32>) -> f64 {
    let (px, py) = (p.x as f64, p.y as f64);
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64, b.y as f64);
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    if len2 <= f64::EPSILON {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0);
    ((px - ax - t * dx).powi(2) + (py - ay - t * dy).powi(2)).sqrt()
}
