//! Camera-relative pose of square markers and other planar targets.
//!
//! The closed-form solution is IPPE: the homography from the target plane to
//! undistorted normalized coordinates is linearised at the target centre,
//! which yields two candidate rotations. The candidate with the smaller pixel
//! reprojection error wins and may be polished by Levenberg–Marquardt.
//!
//! ```no_run
//! use arucalib_core::{CameraIntrinsics, CameraModel};
//! use arucalib_pose::{estimate_marker_pose, PoseParams};
//! use nalgebra::Point2;
//!
//! let camera = CameraModel::pinhole(CameraIntrinsics::new(800.0, 800.0, 320.0, 240.0));
//! let corners = [
//!     Point2::new(280.0, 200.0),
//!     Point2::new(360.0, 200.0),
//!     Point2::new(360.0, 280.0),
//!     Point2::new(280.0, 280.0),
//! ];
//! let pose = estimate_marker_pose(&corners, 0.05, &camera, &PoseParams::default())?;
//! println!("marker at {:.3} m", pose.distance());
//! # Ok::<(), arucalib_pose::PoseError>(())
//! ```

mod error;
mod estimator;
mod ippe;
mod params;

pub use error::PoseError;
pub use estimator::{estimate_marker_pose, estimate_planar_pose, marker_object_points, MarkerPose};
pub use params::PoseParams;
