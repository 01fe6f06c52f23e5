//! Camera calibration from planar targets.
//!
//! [`calibrate`] takes two or more [`CalibrationSample`]s (target points on
//! `z = 0` with their detected image positions) and returns the camera
//! intrinsics, Brown–Conrady distortion and the pose of every sample:
//!
//! 1. a DLT homography per sample;
//! 2. Zhang's closed-form intrinsics (zero skew by default), with a check on
//!    the pose diversity of the samples;
//! 3. initial poses from homography decomposition;
//! 4. joint Levenberg–Marquardt refinement of all parameters;
//! 5. a conditioning check on the final normal equations.
//!
//! Degenerate inputs fail with [`CalibrationError::Underdetermined`]; the
//! engine never hands out parameters it could not determine.

mod engine;
mod error;
mod params;
mod planar_pose;
mod problem;
mod result;
mod sample;
mod zhang;

pub use engine::calibrate;
pub use error::{CalibrationError, UnderdeterminedReason};
pub use params::CalibrationParams;
pub use result::CalibrationResult;
pub use sample::CalibrationSample;
