use crate::{DetectError, DetectedMarker, MarkerDetector};
use arucalib_core::{CameraModel, Frame, GrayImageView, PixelFormat};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Wrap an `image::GrayImage` as a frame without copying.
pub fn frame_from_gray_image(img: &::image::GrayImage) -> Frame<'_> {
    Frame::new(
        img.as_raw(),
        img.width() as usize,
        img.height() as usize,
        PixelFormat::Gray8,
    )
}

/// Wrap an `image::RgbImage` as a frame without copying.
pub fn frame_from_rgb_image(img: &::image::RgbImage) -> Frame<'_> {
    Frame::new(
        img.as_raw(),
        img.width() as usize,
        img.height() as usize,
        PixelFormat::Rgb8,
    )
}

/// Convert an `image::GrayImage` into the lightweight core view type.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Run the marker detector on a grayscale image.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, detector), fields(width = img.width(), height = img.height()))
)]
pub fn detect_markers_in_image(
    img: &::image::GrayImage,
    detector: &MarkerDetector,
) -> Result<Vec<DetectedMarker>, DetectError> {
    detector.detect_gray(&gray_view(img))
}

/// Run the marker detector and estimate the pose of every marker.
pub fn detect_markers_with_pose_in_image(
    img: &::image::GrayImage,
    detector: &MarkerDetector,
    camera: &CameraModel,
    marker_length: f64,
) -> Result<Vec<DetectedMarker>, DetectError> {
    let mut markers = detect_markers_in_image(img, detector)?;
    detector.estimate_poses(&mut markers, camera, marker_length);
    Ok(markers)
}
