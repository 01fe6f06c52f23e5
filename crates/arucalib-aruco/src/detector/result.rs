use arucalib_pose::MarkerPose;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// One decoded marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: u32,
    /// Sub-pixel image corners; corner `k` is the marker's logical corner `k`
    /// (top-left, top-right, bottom-right, bottom-left in the marker frame).
    pub corners: [Point2<f32>; 4],
    /// Bits corrected during matching.
    pub hamming: u8,
    /// Clockwise quarter turns of the marker in the image.
    pub rotation: u8,
    /// Fraction of border cells that read as dark.
    pub border_score: f32,
    pub inverted: bool,
    /// Filled by [`MarkerDetector::detect_with_pose`](super::MarkerDetector::detect_with_pose);
    /// `None` when the pose could not be determined.
    pub pose: Option<MarkerPose>,
}

impl DetectedMarker {
    /// Mean of the four corners.
    pub fn center(&self) -> Point2<f32> {
        let sum = self
            .corners
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, c| acc + c.coords);
        Point2::from(sum / 4.0)
    }

    /// Camera-to-marker distance, when a pose is available.
    #[inline]
    pub fn distance(&self) -> Option<f64> {
        self.pose.as_ref().map(MarkerPose::distance)
    }
}
