use arucalib_core::{CameraModel, LmTermination, Pose};
use serde::{Deserialize, Serialize};

/// A successful calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub camera: CameraModel,
    /// Target-to-camera pose of every sample, in input order.
    pub poses: Vec<Pose>,
    /// RMS reprojection error over all points, in pixels.
    pub rms_error: f64,
    pub per_sample_rms: Vec<f64>,
    pub iterations: usize,
    pub termination: LmTermination,
    /// Condition number of the scaled normal matrix at the solution.
    pub condition_number: f64,
}
