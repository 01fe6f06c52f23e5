//! Binarization of grayscale frames and Otsu thresholds for cell sampling.

use arucalib_core::GrayImageView;
use serde::{Deserialize, Serialize};

/// Thresholding strategy for the full frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdMode {
    /// Local mean over a square window (robust to uneven lighting).
    Adaptive,
    /// Single global Otsu threshold.
    Otsu,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    pub mode: ThresholdMode,
    /// Side of the local window in pixels; must be odd and at least 3.
    pub window_size: usize,
    /// A pixel is dark when it is this much below its local mean.
    pub offset: f32,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::Adaptive,
            window_size: 23,
            offset: 7.0,
        }
    }
}

/// `{0, 1}` image where `1` marks dark (foreground) pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl BinaryImage {
    #[inline]
    pub fn is_set(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.data[y as usize * self.width + x as usize] != 0
    }

    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Threshold `img` into a [`BinaryImage`].
pub fn binarize(img: &GrayImageView<'_>, params: &ThresholdParams) -> BinaryImage {
    let data = match params.mode {
        ThresholdMode::Adaptive => adaptive_mean(img, params.window_size.max(3) | 1, params.offset),
        ThresholdMode::Otsu => {
            let thr = otsu_threshold_from_samples(img.data);
            img.data.iter().map(|&v| u8::from(v < thr)).collect()
        }
    };
    BinaryImage {
        width: img.width,
        height: img.height,
        data,
    }
}

/// Dark-vs-local-mean thresholding via a summed-area table. The window is
/// clipped at the image border.
fn adaptive_mean(img: &GrayImageView<'_>, window: usize, offset: f32) -> Vec<u8> {
    let (w, h) = (img.width, img.height);
    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += img.data[y * w + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let r = window / 2;
    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let y0 = y.saturating_sub(r);
        let y1 = (y + r + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(r);
            let x1 = (x + r + 1).min(w);
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let mean = sum as f32 / ((x1 - x0) * (y1 - y0)) as f32;
            out[y * w + x] = u8::from((img.data[y * w + x] as f32) < mean - offset);
        }
    }
    out
}

/// Compute Otsu threshold from a set of sample intensities.
///
/// Samples strictly below the returned value are the dark class. A constant
/// input returns its value, so nothing is classified dark.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    let min_v = hist.iter().position(|&h| h > 0).unwrap_or(0);
    let max_v = hist.iter().rposition(|&h| h > 0).unwrap_or(255);
    if min_v == max_v {
        return min_v as u8;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v + max_v + 1) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127usize;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        sum_b += t as f64 * h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;
        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t;
        }
    }

    // Class boundary is "<= t"; callers test "< threshold".
    (best_t + 1).min(255) as u8
}
