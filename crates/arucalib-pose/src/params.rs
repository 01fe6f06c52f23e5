use arucalib_core::LmParams;
use serde::{Deserialize, Serialize};

/// Pose estimation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseParams {
    /// Polish the closed-form solution with Levenberg–Marquardt.
    pub refine: bool,
    pub lm: LmParams,
    /// Image points closer than this (pixels) count as coincident.
    pub min_corner_spacing_px: f64,
    /// Minimum `|sin|` of the angle at any hull corner; smaller means collinear.
    pub min_corner_sin: f64,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            refine: true,
            lm: LmParams {
                max_iters: 20,
                ..LmParams::default()
            },
            min_corner_spacing_px: 1.0,
            min_corner_sin: 0.05,
        }
    }
}
