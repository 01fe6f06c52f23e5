use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Correspondences from one calibration image.
///
/// Object points lie on the target plane `z = 0`, in any metric unit; the
/// recovered translations use the same unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub object_points: Vec<Point3<f64>>,
    pub image_points: Vec<Point2<f64>>,
    /// `(width, height)` in pixels.
    pub image_size: (u32, u32),
}

impl CalibrationSample {
    pub fn new(
        object_points: Vec<Point3<f64>>,
        image_points: Vec<Point2<f64>>,
        image_size: (u32, u32),
    ) -> Self {
        Self {
            object_points,
            image_points,
            image_size,
        }
    }

    /// Build from 2D target coordinates (placed at `z = 0`).
    pub fn from_planar(
        target_points: &[Point2<f64>],
        image_points: Vec<Point2<f64>>,
        image_size: (u32, u32),
    ) -> Self {
        let object_points = target_points
            .iter()
            .map(|p| Point3::new(p.x, p.y, 0.0))
            .collect();
        Self::new(object_points, image_points, image_size)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }
}
