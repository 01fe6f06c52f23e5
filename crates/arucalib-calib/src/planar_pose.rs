use arucalib_core::{project_to_so3, Pose};
use nalgebra::Matrix3;

/// Decompose a plane-to-image homography into the target pose, given `K^-1`.
///
/// `H ~ K [r1 r2 t]`; the scale comes from the mean norm of the first two
/// columns, and its sign is chosen so the target lies in front of the camera.
pub(crate) fn pose_from_homography(k_inv: &Matrix3<f64>, h: &Matrix3<f64>) -> Option<Pose> {
    let a1 = k_inv * h.column(0);
    let a2 = k_inv * h.column(1);
    let a3 = k_inv * h.column(2);

    let mean_norm = 0.5 * (a1.norm() + a2.norm());
    if !mean_norm.is_finite() || mean_norm < f64::EPSILON {
        return None;
    }
    let mut lambda = 1.0 / mean_norm;
    if lambda * a3.z < 0.0 {
        lambda = -lambda;
    }

    let r1 = a1 * lambda;
    let r2 = a2 * lambda;
    let r3 = r1.cross(&r2);
    let rotation = project_to_so3(&Matrix3::from_columns(&[r1, r2, r3]))?;
    Some(Pose::new(rotation, a3 * lambda))
}
