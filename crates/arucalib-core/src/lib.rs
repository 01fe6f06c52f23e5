//! Core types shared by the `arucalib-*` crates.
//!
//! This crate is purely geometric and numeric: pixel buffers and their
//! grayscale conversion, homographies, the pinhole + Brown–Conrady camera
//! model, rigid poses and a small Levenberg–Marquardt solver. It does not
//! know anything about markers or calibration targets.

mod camera;
mod frame;
mod homography;
mod image;
mod lm;
mod logger;
mod pose;

pub use camera::{CameraIntrinsics, CameraModel, Distortion};
pub use frame::{Frame, FrameError, PixelFormat};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use lm::{
    central_difference_jacobian, minimize, scaled_condition_number, LmParams, LmReport,
    LmTermination, NllsProblem,
};
pub use pose::{project_to_so3, Pose};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, init_with_stage_levels, LogStage};
