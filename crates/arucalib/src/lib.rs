//! Square fiducial markers and planar camera calibration.
//!
//! This crate provides:
//! - re-exports of the `arucalib-*` crates,
//! - JSON configuration and reports ([`io`]),
//! - (feature `image`) adapters from `image` buffers to frames and an
//!   end-to-end detection helper ([`detect`]).
//!
//! ## Quickstart
//!
//! ```no_run
//! use arucalib::aruco::{builtins, MarkerDetector, MarkerDetectorParams};
//! use arucalib::detect;
//! use image::ImageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = ImageReader::open("markers.png")?.decode()?.to_luma8();
//! let dict = builtins::builtin_dictionary(builtins::ARUCALIB_5X5_50).ok_or("no dictionary")?;
//! let detector = MarkerDetector::new(dict, MarkerDetectorParams::default())?;
//!
//! for m in detect::detect_markers_in_image(&img, &detector)? {
//!     println!("marker {} at {:?}", m.id, m.center());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `arucalib::core`: frames, images, homographies, camera model, poses, LM.
//! - `arucalib::aruco`: dictionaries and marker detection.
//! - `arucalib::pose`: square-marker and planar-target pose.
//! - `arucalib::calib`: camera calibration.

pub use arucalib_aruco as aruco;
pub use arucalib_calib as calib;
pub use arucalib_core as core;
pub use arucalib_pose as pose;

pub use arucalib_aruco::{DetectError, DetectedMarker, MarkerDetector, MarkerDetectorParams};
pub use arucalib_calib::{calibrate, CalibrationError, CalibrationResult, CalibrationSample};
pub use arucalib_core::{CameraIntrinsics, CameraModel, Distortion, Frame, PixelFormat, Pose};
pub use arucalib_pose::{MarkerPose, PoseError};

#[cfg(feature = "image")]
pub mod detect;
pub mod io;

/// The detected marker nearest to the camera.
///
/// Only markers with a pose take part; `None` if there are none.
pub fn closest_marker(markers: &[DetectedMarker]) -> Option<&DetectedMarker> {
    markers
        .iter()
        .filter_map(|m| m.distance().map(|d| (d, m)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, m)| m)
}
