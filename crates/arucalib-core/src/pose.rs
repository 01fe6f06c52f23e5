use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid transform from a target frame into the camera frame:
/// `p_cam = rotation * p_target + translation`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn new(rotation: Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Build from a Rodrigues (axis-angle) vector and a translation.
    pub fn from_rvec(rvec: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self::new(Rotation3::new(rvec), translation)
    }

    /// Rodrigues (axis-angle) vector of the rotation.
    pub fn rvec(&self) -> Vector3<f64> {
        self.rotation.scaled_axis()
    }

    #[inline]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation * p + self.translation
    }

    /// Distance from the camera centre to the target origin.
    pub fn distance(&self) -> f64 {
        self.translation.norm()
    }
}

/// Closest rotation to `m` in the Frobenius sense (SVD projection onto SO(3)).
///
/// Returns `None` if the decomposition fails or produces non-finite values.
pub fn project_to_so3(m: &Matrix3<f64>) -> Option<Rotation3<f64>> {
    let svd = m.svd(true, true);
    let mut u = svd.u?;
    let v_t = svd.v_t?;
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    let r = u * v_t;
    if !r.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(Rotation3::from_matrix_unchecked(r))
}
