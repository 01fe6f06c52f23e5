//! Infinitesimal plane-based pose estimation (Collins & Bartoli, 2014).
//!
//! Given the homography from a model plane centred at the origin to
//! undistorted normalized image coordinates, the first-order behaviour of the
//! projection at the model origin determines the plane rotation up to a
//! two-fold ambiguity. Both rotations are returned; the caller picks one by
//! reprojection error.

use nalgebra::{Matrix2, Matrix3, Point2, Rotation3, Vector3};

/// The two candidate rotations for a homography `model(x, y) -> normalized`.
///
/// Returns `None` when the homography is singular at the origin.
pub(crate) fn ippe_rotations(h: &Matrix3<f64>) -> Option<[Matrix3<f64>; 2]> {
    let h22 = h[(2, 2)];
    if !h22.is_finite() || h22.abs() < 1e-12 {
        return None;
    }
    let h = h / h22;

    // Image of the model origin and the homography's Jacobian there.
    let (p, q) = (h[(0, 2)], h[(1, 2)]);
    let j = Matrix2::new(
        h[(0, 0)] - h[(2, 0)] * p,
        h[(0, 1)] - h[(2, 1)] * p,
        h[(1, 0)] - h[(2, 0)] * q,
        h[(1, 1)] - h[(2, 1)] * q,
    );

    // Rotation taking the optical axis onto the ray through the origin's image.
    let rv = Rotation3::rotation_between(&Vector3::z(), &Vector3::new(p, q, 1.0))
        .unwrap_or_else(Rotation3::identity);
    let rv = rv.matrix();

    let b = Matrix2::new(
        rv[(0, 0)] - p * rv[(2, 0)],
        rv[(0, 1)] - p * rv[(2, 1)],
        rv[(1, 0)] - q * rv[(2, 0)],
        rv[(1, 1)] - q * rv[(2, 1)],
    );
    let a = b.try_inverse()? * j;

    let gamma = a.singular_values().max();
    if !gamma.is_finite() || gamma < 1e-12 {
        return None;
    }
    let rt = a / gamma;

    let b0 = (1.0 - rt[(0, 0)].powi(2) - rt[(1, 0)].powi(2)).max(0.0).sqrt();
    let mut b1 = (1.0 - rt[(0, 1)].powi(2) - rt[(1, 1)].powi(2)).max(0.0).sqrt();
    if rt[(0, 0)] * rt[(0, 1)] + rt[(1, 0)] * rt[(1, 1)] > 0.0 {
        b1 = -b1;
    }

    let build = |sign: f64| {
        let c0 = Vector3::new(rt[(0, 0)], rt[(1, 0)], sign * b0);
        let c1 = Vector3::new(rt[(0, 1)], rt[(1, 1)], sign * b1);
        let c2 = c0.cross(&c1);
        rv * Matrix3::from_columns(&[c0, c1, c2])
    };

    let out = [build(1.0), build(-1.0)];
    out.iter()
        .all(|r| r.iter().all(|v| v.is_finite()))
        .then_some(out)
}

/// Least-squares translation for a fixed rotation.
///
/// Each correspondence contributes `t_x - u t_z = u (R p)_z - (R p)_x` and the
/// analogous row for `v`.
pub(crate) fn solve_translation(
    rotation: &Rotation3<f64>,
    model: &[Point2<f64>],
    normalized: &[Point2<f64>],
) -> Option<Vector3<f64>> {
    let mut ata = Matrix3::<f64>::zeros();
    let mut atb = Vector3::<f64>::zeros();
    for (m, n) in model.iter().zip(normalized) {
        let rp = rotation * Vector3::new(m.x, m.y, 0.0);
        for (row, rhs) in [
            (Vector3::new(1.0, 0.0, -n.x), n.x * rp.z - rp.x),
            (Vector3::new(0.0, 1.0, -n.y), n.y * rp.z - rp.y),
        ] {
            ata += row * row.transpose();
            atb += row * rhs;
        }
    }
    let t = ata.lu().solve(&atb)?;
    t.iter().all(|v| v.is_finite()).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plane_homography(r: &Rotation3<f64>, t: &Vector3<f64>) -> Matrix3<f64> {
        let m = r.matrix();
        Matrix3::from_columns(&[m.column(0).into_owned(), m.column(1).into_owned(), *t])
    }

    #[test]
    fn one_candidate_is_the_true_rotation() {
        for (rvec, t) in [
            (Vector3::new(0.3, -0.2, 0.1), Vector3::new(0.05, -0.02, 0.6)),
            (Vector3::new(2.8, 0.3, 0.1), Vector3::new(-0.1, 0.05, 1.2)),
            (Vector3::new(-0.6, 0.4, 0.0), Vector3::new(0.2, 0.1, 0.8)),
        ] {
            let r = Rotation3::new(rvec);
            let [r1, r2] = ippe_rotations(&plane_homography(&r, &t)).expect("rotations");
            let d1 = (r1 - r.matrix()).abs().max();
            let d2 = (r2 - r.matrix()).abs().max();
            assert!(d1.min(d2) < 1e-9, "rvec {rvec:?}: {d1} / {d2}");

            for cand in [r1, r2] {
                assert_relative_eq!(cand.determinant(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn translation_from_exact_correspondences() {
        let r = Rotation3::new(Vector3::new(0.1, 0.4, -0.2));
        let t = Vector3::new(0.03, -0.05, 0.9);
        let model: Vec<Point2<f64>> = [(-1.0, 1.0), (1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)]
            .iter()
            .map(|&(x, y)| Point2::new(0.05 * x, 0.05 * y))
            .collect();
        let normalized: Vec<Point2<f64>> = model
            .iter()
            .map(|m| {
                let c = r * Vector3::new(m.x, m.y, 0.0) + t;
                Point2::new(c.x / c.z, c.y / c.z)
            })
            .collect();
        let est = solve_translation(&r, &model, &normalized).expect("translation");
        assert_relative_eq!(est, t, epsilon = 1e-12);
    }

    #[test]
    fn singular_homography_has_no_rotations() {
        assert!(ippe_rotations(&Matrix3::zeros()).is_none());
    }
}
