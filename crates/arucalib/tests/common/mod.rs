//! Synthetic scenes for the integration tests and benches.
#![allow(dead_code)]

use arucalib::core::{homography_from_4pt, CameraModel, Pose};
use arucalib::pose::marker_object_points;
use nalgebra::Point2;

const SUPERSAMPLE: u32 = 4;

/// A marker to draw: row-major bits (black = 1) inside a one-cell black
/// border, with `corners` the outer outline clockwise from the marker's
/// top-left, in continuous pixel coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Placement {
    pub code: u64,
    pub bits: usize,
    pub corners: [Point2<f32>; 4],
}

impl Placement {
    pub fn axis_aligned(code: u64, bits: usize, x0: f32, y0: f32, side: f32) -> Self {
        Self {
            code,
            bits,
            corners: [
                Point2::new(x0, y0),
                Point2::new(x0 + side, y0),
                Point2::new(x0 + side, y0 + side),
                Point2::new(x0, y0 + side),
            ],
        }
    }

    /// The marker of side `length` seen by `camera` at `pose`.
    pub fn projected(code: u64, bits: usize, camera: &CameraModel, pose: &Pose, length: f64) -> Self {
        let object = marker_object_points(length);
        let corners = std::array::from_fn(|k| {
            let p = camera
                .project(&pose.transform_point(&object[k]))
                .expect("marker in front of camera");
            Point2::new(p.x as f32, p.y as f32)
        });
        Self {
            code,
            bits,
            corners,
        }
    }
}

/// White background with the given markers, anti-aliased by supersampling.
/// Pixel `(x, y)` covers `[x - 0.5, x + 0.5]²`.
pub fn render_scene(width: u32, height: u32, placements: &[Placement]) -> image::GrayImage {
    let warps: Vec<_> = placements
        .iter()
        .map(|p| {
            let s = (p.bits + 2) as f32;
            let canonical = [
                Point2::new(0.0, 0.0),
                Point2::new(s, 0.0),
                Point2::new(s, s),
                Point2::new(0.0, s),
            ];
            (p, homography_from_4pt(&p.corners, &canonical).expect("homography"))
        })
        .collect();

    let is_black = |p: &Placement, m: Point2<f32>| {
        let cells = p.bits + 2;
        let s = cells as f32;
        if m.x < 0.0 || m.y < 0.0 || m.x >= s || m.y >= s {
            return false;
        }
        let (cx, cy) = (m.x as usize, m.y as usize);
        let border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
        border || (p.code >> ((cy - 1) * p.bits + (cx - 1))) & 1 == 1
    };

    let n = SUPERSAMPLE * SUPERSAMPLE;
    image::GrayImage::from_fn(width, height, |x, y| {
        let mut dark = 0;
        for sy in 0..SUPERSAMPLE {
            for sx in 0..SUPERSAMPLE {
                let px = x as f32 - 0.5 + (sx as f32 + 0.5) / SUPERSAMPLE as f32;
                let py = y as f32 - 0.5 + (sy as f32 + 0.5) / SUPERSAMPLE as f32;
                if warps
                    .iter()
                    .any(|(p, h)| is_black(p, h.apply(Point2::new(px, py))))
                {
                    dark += 1;
                }
            }
        }
        image::Luma([(255 * (n - dark) / n) as u8])
    })
}

pub fn max_corner_error(found: &[Point2<f32>; 4], truth: &[Point2<f32>; 4]) -> f32 {
    (0..4)
        .map(|k| (found[k] - truth[k]).norm())
        .fold(0.0, f32::max)
}
