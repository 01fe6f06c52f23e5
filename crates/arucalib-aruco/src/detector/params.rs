use super::DetectError;
use crate::{ContourParams, DecodeParams, QuadParams, RefineParams, ThresholdParams};
use arucalib_pose::PoseParams;
use serde::{Deserialize, Serialize};

/// Configuration for [`MarkerDetector`](super::MarkerDetector).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerDetectorParams {
    pub threshold: ThresholdParams,
    pub contours: ContourParams,
    pub quads: QuadParams,
    pub decode: DecodeParams,
    /// Run sub-pixel corner refinement on decoded markers.
    pub refine_corners: bool,
    pub refine: RefineParams,
    /// Maximum Hamming distance for matching.
    ///
    /// `None` uses the dictionary's correction bound; larger values are
    /// clamped to it.
    pub max_hamming: Option<u8>,
    pub pose: PoseParams,
}

impl Default for MarkerDetectorParams {
    fn default() -> Self {
        Self {
            threshold: ThresholdParams::default(),
            contours: ContourParams::default(),
            quads: QuadParams::default(),
            decode: DecodeParams::default(),
            refine_corners: true,
            refine: RefineParams::default(),
            max_hamming: None,
            pose: PoseParams::default(),
        }
    }
}

impl MarkerDetectorParams {
    /// Reject settings no pipeline stage can work with.
    pub fn validate(&self) -> Result<(), DetectError> {
        let invalid = |reason: &str| {
            Err(DetectError::InvalidParams {
                reason: reason.to_string(),
            })
        };
        if self.threshold.window_size < 3 {
            return invalid("threshold.window_size must be at least 3");
        }
        if !self.threshold.offset.is_finite() {
            return invalid("threshold.offset must be finite");
        }
        if !(self.quads.approx_accuracy_rate > 0.0 && self.quads.approx_accuracy_rate < 1.0) {
            return invalid("quads.approx_accuracy_rate must lie in (0, 1)");
        }
        if self.decode.samples_per_cell == 0 {
            return invalid("decode.samples_per_cell must be positive");
        }
        if !(0.0..0.5).contains(&self.decode.cell_margin) {
            return invalid("decode.cell_margin must lie in [0, 0.5)");
        }
        if self.decode.border_bits == 0 {
            return invalid("decode.border_bits must be positive");
        }
        if self.refine_corners && self.refine.half_window == 0 {
            return invalid("refine.half_window must be positive");
        }
        Ok(())
    }
}
