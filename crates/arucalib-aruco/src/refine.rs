//! Gradient-based sub-pixel corner refinement.
//!
//! For a true corner `q`, every nearby image gradient `g(p)` is orthogonal to
//! `p - q` (either `p` lies on an edge through `q` or the gradient vanishes).
//! Minimising `sum w * (g^T (p - q))^2` gives the normal equations
//! `G q = sum w * g g^T p` with `G = sum w * g g^T`, solved iteratively.

use arucalib_core::{sample_bilinear, GrayImageView};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Half side of the square search window in pixels.
    pub half_window: usize,
    pub max_iters: usize,
    /// Stop once a single update moves the corner less than this (pixels).
    pub epsilon: f32,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            epsilon: 0.01,
        }
    }
}

/// Refine the four corners of a marker independently.
pub fn refine_corners(
    image: &GrayImageView<'_>,
    corners: &[Point2<f32>; 4],
    params: &RefineParams,
) -> [Point2<f32>; 4] {
    std::array::from_fn(|k| refine_corner(image, corners[k], params))
}

/// Refine one corner.
///
/// The input is returned unchanged when the window does not fit in the
/// image, the gradient system is singular, or the estimate wanders further
/// than `half_window` from the starting point.
pub fn refine_corner(
    image: &GrayImageView<'_>,
    corner: Point2<f32>,
    params: &RefineParams,
) -> Point2<f32> {
    let hw = params.half_window.max(1) as i32;
    let r = hw as f32;
    let margin = r + 2.0;
    let fits = |p: Point2<f32>| {
        p.x >= margin
            && p.y >= margin
            && p.x <= image.width as f32 - 1.0 - margin
            && p.y <= image.height as f32 - 1.0 - margin
    };
    if image.is_degenerate() || !fits(corner) {
        return corner;
    }

    let inv_r2 = 1.0 / (r * r);
    let mut c = corner;
    for _ in 0..params.max_iters.max(1) {
        let (mut g00, mut g01, mut g11) = (0f64, 0f64, 0f64);
        let (mut b0, mut b1) = (0f64, 0f64);

        for dy in -hw..=hw {
            for dx in -hw..=hw {
                let (px, py) = (c.x + dx as f32, c.y + dy as f32);
                let gx = 0.5 * (sample_bilinear(image, px + 1.0, py) - sample_bilinear(image, px - 1.0, py));
                let gy = 0.5 * (sample_bilinear(image, px, py + 1.0) - sample_bilinear(image, px, py - 1.0));
                let w = (-((dx * dx + dy * dy) as f32) * inv_r2).exp();

                let (gx, gy, w) = (gx as f64, gy as f64, w as f64);
                let a = w * gx * gx;
                let b = w * gx * gy;
                let d = w * gy * gy;
                g00 += a;
                g01 += b;
                g11 += d;
                b0 += a * px as f64 + b * py as f64;
                b1 += b * px as f64 + d * py as f64;
            }
        }

        let det = g00 * g11 - g01 * g01;
        let scale = (g00 + g11).powi(2);
        if scale <= f64::EPSILON || det.abs() <= 1e-9 * scale {
            return corner;
        }

        let q = Point2::new(
            ((g11 * b0 - g01 * b1) / det) as f32,
            ((g00 * b1 - g01 * b0) / det) as f32,
        );
        if !q.x.is_finite() || !q.y.is_finite() || (q - corner).norm() > r || !fits(q) {
            return corner;
        }

        let step = (q - c).norm();
        c = q;
        if step < params.epsilon {
            break;
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use arucalib_core::GrayImage;

    /// Black square covering pixels `[20, 40) x [24, 44)` on white.
    fn square_image() -> GrayImage {
        let mut img = GrayImage::filled(64, 64, 255);
        for y in 24..44 {
            for x in 20..40 {
                img.set(x, y, 0);
            }
        }
        img
    }

    #[test]
    fn converges_to_the_edge_intersection() {
        let img = square_image();
        let params = RefineParams::default();
        // Edges lie half a pixel outside the outermost dark pixel centres.
        let cases = [
            (Point2::new(21.0, 25.0), Point2::new(19.5, 23.5)),
            (Point2::new(18.2, 22.9), Point2::new(19.5, 23.5)),
            (Point2::new(39.0, 23.0), Point2::new(39.5, 23.5)),
            (Point2::new(40.3, 44.1), Point2::new(39.5, 43.5)),
        ];
        for (start, truth) in cases {
            let p = refine_corner(&img.view(), start, &params);
            assert!((p - truth).norm() < 0.15, "{start:?} -> {p:?}");
        }
    }

    #[test]
    fn flat_region_and_image_border_leave_the_corner_unchanged() {
        let img = square_image();
        let params = RefineParams::default();

        let flat = Point2::new(52.0, 10.0);
        assert_eq!(refine_corner(&img.view(), flat, &params), flat);

        let near_edge = Point2::new(3.0, 30.0);
        assert_eq!(refine_corner(&img.view(), near_edge, &params), near_edge);
    }

    #[test]
    fn straight_edge_is_singular() {
        let mut img = GrayImage::filled(40, 40, 255);
        for y in 0..40 {
            for x in 20..40 {
                img.set(x, y, 0);
            }
        }
        let start = Point2::new(19.0, 20.0);
        assert_eq!(refine_corner(&img.view(), start, &RefineParams::default()), start);
    }
}
