//! Bit-grid decoding of quad candidates.
//!
//! A candidate is mapped onto a canonical square of `cells x cells` units
//! (`cells = marker_size + 2 * border_bits`) through a four-point homography.
//! Every cell is averaged over a small sub-grid of bilinear samples, the
//! cells are classified against an Otsu threshold taken over the whole
//! square, and the dark border is verified before the dictionary is touched.

use crate::threshold::otsu_threshold_from_samples;
use crate::{Match, Matcher};
use arucalib_core::{homography_from_4pt, sample_bilinear, GrayImageView, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeParams {
    /// Marker border width in cells (OpenCV typically uses 1).
    pub border_bits: usize,
    /// Sub-samples per cell side.
    pub samples_per_cell: usize,
    /// Fraction of a cell ignored on each side when sampling.
    pub cell_margin: f32,
    /// Require border-black ratio >= this.
    pub min_border_score: f32,
    /// Also try white-on-black markers.
    pub detect_inverted: bool,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            border_bits: 1,
            samples_per_cell: 3,
            cell_margin: 0.2,
            min_border_score: 0.85,
            detect_inverted: false,
        }
    }
}

/// A candidate that matched a dictionary code.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodedMarker {
    pub id: u32,
    /// Clockwise quarter turns between the dictionary code and the observation.
    pub rotation: u8,
    pub hamming: u8,
    pub border_score: f32,
    /// Observed inner bits (row-major, black=1) in quad order.
    pub code: u64,
    pub inverted: bool,
    /// Image corners, corner `k` being the marker's logical corner `k`.
    pub corners: [Point2<f32>; 4],
}

#[derive(Clone, Copy, Debug)]
struct MarkerObservation {
    code: u64,
    border_score: f32,
    inverted: bool,
}

/// Canonical-square sample positions, shared by every candidate.
#[derive(Clone, Debug)]
struct SampleGrid {
    cells: usize,
    /// `samples_per_cell^2` points per cell, cells in row-major order.
    cell_points: Vec<Point2<f32>>,
    threshold_points: Vec<Point2<f32>>,
}

impl SampleGrid {
    fn new(cells: usize, params: &DecodeParams) -> Self {
        let k = params.samples_per_cell.max(1);
        let margin = params.cell_margin.clamp(0.0, 0.45);
        let span = 1.0 - 2.0 * margin;

        let mut cell_points = Vec::with_capacity(cells * cells * k * k);
        for cy in 0..cells {
            for cx in 0..cells {
                for sy in 0..k {
                    for sx in 0..k {
                        cell_points.push(Point2::new(
                            cx as f32 + margin + span * (sx as f32 + 0.5) / k as f32,
                            cy as f32 + margin + span * (sy as f32 + 0.5) / k as f32,
                        ));
                    }
                }
            }
        }

        Self {
            cells,
            cell_points,
            threshold_points: build_threshold_points(cells),
        }
    }

    /// Sample points per cell (`samples_per_cell²`).
    #[inline]
    fn points_per_cell(&self) -> usize {
        self.cell_points.len() / (self.cells * self.cells)
    }
}

/// Decodes quad candidates against one dictionary.
#[derive(Clone, Debug)]
pub struct MarkerDecoder {
    params: DecodeParams,
    matcher: Matcher,
    grid: SampleGrid,
}

impl MarkerDecoder {
    pub fn new(matcher: Matcher, params: DecodeParams) -> Self {
        let cells = matcher.dictionary().marker_size() + 2 * params.border_bits;
        let grid = SampleGrid::new(cells, &params);
        Self {
            params,
            matcher,
            grid,
        }
    }

    #[inline]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    #[inline]
    pub fn params(&self) -> &DecodeParams {
        &self.params
    }

    /// Decode a quad whose corners are in canonical (clockwise) order.
    ///
    /// Returns `None` for degenerate geometry, a broken border or a code
    /// outside the matcher's Hamming bound.
    pub fn decode(
        &self,
        image: &GrayImageView<'_>,
        quad: &[Point2<f32>; 4],
    ) -> Option<DecodedMarker> {
        let s = self.grid.cells as f32;
        let canonical = [
            Point2::new(0.0, 0.0),
            Point2::new(s, 0.0),
            Point2::new(s, s),
            Point2::new(0.0, s),
        ];
        let h = homography_from_4pt(&canonical, quad)?;

        let obs = self.observe(image, &h)?;
        let m = self.matcher.match_code(obs.code)?;
        Some(build_decoded(quad, obs, m))
    }

    fn observe(&self, image: &GrayImageView<'_>, h: &Homography) -> Option<MarkerObservation> {
        let (w, hgt) = (image.width as f32, image.height as f32);
        let inside = |q: &Point2<f32>| {
            q.x.is_finite() && q.y.is_finite() && q.x >= 0.0 && q.y >= 0.0
                && q.x <= w - 1.0
                && q.y <= hgt - 1.0
        };

        let k2 = self.grid.points_per_cell();
        let mut cell_means = Vec::with_capacity(self.grid.cells * self.grid.cells);
        for chunk in self.grid.cell_points.chunks_exact(k2) {
            let mut sum = 0.0f32;
            for p in chunk {
                let q = h.apply(*p);
                if !inside(&q) {
                    return None;
                }
                sum += sample_bilinear(image, q.x, q.y);
            }
            cell_means.push((sum / k2 as f32).round().clamp(0.0, 255.0) as u8);
        }

        let thr_samples: Vec<u8> = self
            .grid
            .threshold_points
            .iter()
            .map(|p| h.apply(*p))
            .filter(|q| inside(q))
            .map(|q| sample_bilinear(image, q.x, q.y).round().clamp(0.0, 255.0) as u8)
            .collect();

        decode_samples(
            &cell_means,
            &thr_samples,
            self.grid.cells,
            self.matcher.dictionary().marker_size(),
            self.params.border_bits,
            self.params.min_border_score,
            self.params.detect_inverted,
        )
    }
}

fn build_decoded(quad: &[Point2<f32>; 4], obs: MarkerObservation, m: Match) -> DecodedMarker {
    // The dictionary's corner 0 shows up `rotation` quarter turns clockwise.
    let r = m.rotation as usize;
    let corners = std::array::from_fn(|k| quad[(k + r) % 4]);
    DecodedMarker {
        id: m.id,
        rotation: m.rotation,
        hamming: m.hamming,
        border_score: obs.border_score,
        code: obs.code,
        inverted: obs.inverted,
        corners,
    }
}

fn decode_samples(
    samples: &[u8],
    thr_samples: &[u8],
    cells: usize,
    bits: usize,
    border: usize,
    min_border_score: f32,
    try_inverted: bool,
) -> Option<MarkerObservation> {
    if samples.len() != cells * cells {
        return None;
    }

    let thr = if thr_samples.is_empty() {
        otsu_threshold_from_samples(samples)
    } else {
        otsu_threshold_from_samples(thr_samples)
    };

    let polarities: &[bool] = if try_inverted { &[false, true] } else { &[false] };
    let mut best: Option<MarkerObservation> = None;

    for &inverted in polarities {
        let mut border_ok = 0u32;
        let mut border_total = 0u32;
        let mut code: u64 = 0;

        for cy in 0..cells {
            for cx in 0..cells {
                let is_black = (samples[cy * cells + cx] < thr) != inverted;
                let is_border = cx < border
                    || cy < border
                    || cx >= cells - border
                    || cy >= cells - border;
                if is_border {
                    border_total += 1;
                    border_ok += u32::from(is_black);
                } else if is_black {
                    code |= 1u64 << ((cy - border) * bits + (cx - border));
                }
            }
        }

        let border_score = if border_total > 0 {
            border_ok as f32 / border_total as f32
        } else {
            1.0
        };
        if border_score < min_border_score {
            continue;
        }
        if best.is_none_or(|b| border_score > b.border_score) {
            best = Some(MarkerObservation {
                code,
                border_score,
                inverted,
            });
        }
    }

    best
}

fn build_threshold_points(cells: usize) -> Vec<Point2<f32>> {
    const THRESH_SUBDIV: usize = 3;
    let grid = cells * THRESH_SUBDIV;
    let step = cells as f32 / grid as f32;
    let mut points = Vec::with_capacity(grid * grid);
    for ty in 0..grid {
        for tx in 0..grid {
            points.push(Point2::new(
                (tx as f32 + 0.5) * step,
                (ty as f32 + 0.5) * step,
            ));
        }
    }
    points
}

/// Paint a marker with 1-cell border into a white canvas (test helper).
#[cfg(test)]
pub(crate) fn render_marker(
    code: u64,
    bits: usize,
    cell_px: usize,
    margin_px: usize,
) -> arucalib_core::GrayImage {
    let cells = bits + 2;
    let side = cells * cell_px + 2 * margin_px;
    let mut img = arucalib_core::GrayImage::filled(side, side, 255);
    for cy in 0..cells {
        for cx in 0..cells {
            let is_border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
            let is_black = is_border || (code >> ((cy - 1) * bits + (cx - 1))) & 1 == 1;
            if !is_black {
                continue;
            }
            for yy in 0..cell_px {
                for xx in 0..cell_px {
                    img.set(margin_px + cx * cell_px + xx, margin_px + cy * cell_px + yy, 0);
                }
            }
        }
    }
    img
}
