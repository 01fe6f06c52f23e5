//! Outer-boundary extraction from a binary image.
//!
//! Foreground pixels are grouped into 8-connected components; the outer
//! boundary of each component is traced with Moore-neighbour following,
//! starting at the component's first pixel in raster order. Holes, and any
//! components nested inside them, produce their own outer boundaries but
//! never inner ones.

use crate::BinaryImage;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Clockwise (in image coordinates, y down) starting east.
const DIRS_8: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Closed boundary; consecutive points (and last-to-first) are 8-adjacent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point2<i32>>,
}

impl Contour {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Euclidean length of the closed ring.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                (((a.x - b.x).pow(2) + (a.y - b.y).pow(2)) as f64).sqrt()
            })
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    /// Minimum contour length relative to the larger image side.
    pub min_perimeter_rate: f32,
    /// Maximum contour length relative to the image perimeter (`4 * max(w, h)`).
    pub max_perimeter_rate: f32,
    /// Absolute floor on the number of contour points.
    pub min_points: usize,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            min_perimeter_rate: 0.03,
            max_perimeter_rate: 4.0,
            min_points: 16,
        }
    }
}

/// Trace outer boundaries of all foreground components.
///
/// Contours whose point count falls outside the configured length band are
/// dropped. Discovery order is unspecified.
pub fn find_contours(binary: &BinaryImage, params: &ContourParams) -> Vec<Contour> {
    let (w, h) = (binary.width, binary.height);
    let side = w.max(h) as f32;
    let min_len = ((params.min_perimeter_rate * side) as usize).max(params.min_points);
    let max_len = (params.max_perimeter_rate * 4.0 * side) as usize;

    let mut visited = vec![false; w * h];
    let mut queue = VecDeque::new();
    let mut out = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if binary.data[idx] == 0 || visited[idx] {
                continue;
            }

            // Mark the whole component so only its raster-first pixel starts a trace.
            visited[idx] = true;
            queue.push_back((x as i32, y as i32));
            while let Some((cx, cy)) = queue.pop_front() {
                for (dx, dy) in DIRS_8 {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if binary.is_set(nx, ny) {
                        let nidx = ny as usize * w + nx as usize;
                        if !visited[nidx] {
                            visited[nidx] = true;
                            queue.push_back((nx, ny));
                        }
                    }
                }
            }

            let points = trace_outer_boundary(binary, x as i32, y as i32, max_len + 1);
            if points.len() >= min_len && points.len() <= max_len {
                out.push(Contour { points });
            }
        }
    }

    log::trace!("traced {} contours (length band {}..={})", out.len(), min_len, max_len);
    out
}

/// Moore-neighbour tracing with Jacob's stopping criterion.
///
/// `(sx, sy)` must be the raster-first pixel of its component, so its west,
/// north-west, north and north-east neighbours are background. Tracing stops
/// early once `limit` points have been collected.
fn trace_outer_boundary(binary: &BinaryImage, sx: i32, sy: i32, limit: usize) -> Vec<Point2<i32>> {
    let start = Point2::new(sx, sy);
    let mut points = vec![start];

    // Search from north-west, i.e. just after the west backtrack pixel.
    let Some(first_dir) = next_boundary_dir(binary, start, 5) else {
        return points; // isolated pixel
    };

    let mut cur = start;
    let mut dir = first_dir;
    loop {
        cur = Point2::new(cur.x + DIRS_8[dir].0, cur.y + DIRS_8[dir].1);
        // The backtrack pixel sits at (dir + 5) or (dir + 6); both are background.
        let Some(next) = next_boundary_dir(binary, cur, (dir + 6) % 8) else {
            break;
        };
        if cur == start && next == first_dir {
            break;
        }
        points.push(cur);
        if points.len() >= limit {
            break;
        }
        dir = next;
    }
    points
}

/// First foreground neighbour of `p`, scanning clockwise from `from`.
#[inline]
fn next_boundary_dir(binary: &BinaryImage, p: Point2<i32>, from: usize) -> Option<usize> {
    (0..8)
        .map(|k| (from + k) % 8)
        .find(|&d| binary.is_set(p.x + DIRS_8[d].0, p.y + DIRS_8[d].1))
}
