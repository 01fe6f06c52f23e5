use arucalib_core::LmParams;
use serde::{Deserialize, Serialize};

/// Calibration settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Fewer samples fail with `InsufficientSamples`; never below 2.
    pub min_samples: usize,
    /// Per-sample point minimum; never below 4.
    pub min_points_per_sample: usize,
    /// Keep skew at zero instead of estimating it.
    pub fix_skew: bool,
    /// Estimate the sixth-order radial term `k3`.
    pub estimate_k3: bool,
    pub lm: LmParams,
    /// Second-smallest to largest singular value of the closed-form system
    /// below which the poses count as degenerate.
    pub min_singular_ratio: f64,
    /// Largest accepted condition number of the scaled normal matrix.
    pub max_condition_number: f64,
    /// Reject results with a larger RMS reprojection error (pixels).
    pub max_rms_px: Option<f64>,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            min_samples: 2,
            min_points_per_sample: 6,
            fix_skew: true,
            estimate_k3: false,
            lm: LmParams {
                max_iters: 200,
                ..LmParams::default()
            },
            min_singular_ratio: 1e-6,
            max_condition_number: 1e12,
            max_rms_px: None,
        }
    }
}
