use crate::ippe::{ippe_rotations, solve_translation};
use crate::{PoseError, PoseParams};
use arucalib_core::{
    central_difference_jacobian, estimate_homography, minimize, project_to_so3, CameraModel,
    NllsProblem, Pose,
};
use nalgebra::{DMatrix, DVector, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Camera-relative pose of a planar target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    pub pose: Pose,
    /// RMS reprojection error of `pose`, in pixels.
    pub reprojection_error: f64,
    /// The other planar solution, if it lies in front of the camera.
    pub alternative: Option<Pose>,
    pub alternative_error: Option<f64>,
}

impl MarkerPose {
    /// Distance from the camera centre to the marker centre.
    #[inline]
    pub fn distance(&self) -> f64 {
        self.pose.distance()
    }
}

/// Marker corners in the marker frame (z = 0, centred at the origin), in
/// detection order: top-left, top-right, bottom-right, bottom-left.
pub fn marker_object_points(marker_length: f64) -> [Point3<f64>; 4] {
    let h = 0.5 * marker_length;
    [
        Point3::new(-h, h, 0.0),
        Point3::new(h, h, 0.0),
        Point3::new(h, -h, 0.0),
        Point3::new(-h, -h, 0.0),
    ]
}

/// Pose of a square marker of side `marker_length` from its four image corners.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(corners, camera, params))
)]
pub fn estimate_marker_pose(
    corners: &[Point2<f32>; 4],
    marker_length: f64,
    camera: &CameraModel,
    params: &PoseParams,
) -> Result<MarkerPose, PoseError> {
    if !marker_length.is_finite() || marker_length <= 0.0 {
        return Err(PoseError::InvalidMarkerLength(marker_length));
    }
    let object = marker_object_points(marker_length).map(|p| Point2::new(p.x, p.y));
    let image = corners.map(|c| Point2::new(c.x as f64, c.y as f64));
    estimate_planar_pose(&object, &image, camera, params)
}

/// Pose of a planar target (`z = 0` object points) from `n >= 4`
/// correspondences.
///
/// Both IPPE solutions are evaluated and the one with the smaller pixel
/// reprojection error is returned; on a tie the first wins.
pub fn estimate_planar_pose(
    object: &[Point2<f64>],
    image: &[Point2<f64>],
    camera: &CameraModel,
    params: &PoseParams,
) -> Result<MarkerPose, PoseError> {
    validate_points(object, image, params)?;

    let n = object.len() as f64;
    let centroid = object
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + Vector3::new(p.x, p.y, 0.0))
        / n;
    let model: Vec<Point2<f64>> = object
        .iter()
        .map(|p| Point2::new(p.x - centroid.x, p.y - centroid.y))
        .collect();
    let normalized: Vec<Point2<f64>> = image
        .iter()
        .map(|p| Point2::from(camera.undistort_pixel(p)))
        .collect();

    let h = estimate_homography(&model, &normalized).ok_or(PoseError::DegenerateHomography)?;
    let rotations = ippe_rotations(&h.h).ok_or(PoseError::DegenerateHomography)?;

    let object3: Vec<Point3<f64>> = object.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
    let mut candidates: Vec<(Pose, f64)> = Vec::with_capacity(2);
    for r in &rotations {
        let Some(r) = project_to_so3(r) else {
            continue;
        };
        let Some(t) = solve_translation(&r, &model, &normalized) else {
            continue;
        };
        // Undo the centring: R (p - c) + t = R p + (t - R c).
        let pose = Pose::new(r, t - r * centroid);
        if object3.iter().any(|p| pose.transform_point(p).z <= 0.0) {
            continue;
        }
        let err = reprojection_rms(&pose, &object3, image, camera);
        candidates.push((pose, err));
    }

    let (best, alt) = match candidates.as_slice() {
        [] => return Err(PoseError::BehindCamera),
        [only] => (*only, None),
        [a, b, ..] if b.1 < a.1 => (*b, Some(*a)),
        [a, b, ..] => (*a, Some(*b)),
    };
    let (mut pose, mut err) = best;

    if params.refine {
        let (refined, refined_err) = refine_pose(&pose, &object3, image, camera, params);
        if refined_err <= err {
            pose = refined;
            err = refined_err;
        }
    }

    log::trace!(
        "planar pose: rms {:.4} px (alternative {:?})",
        err,
        alt.map(|a| a.1)
    );

    Ok(MarkerPose {
        pose,
        reprojection_error: err,
        alternative: alt.map(|a| a.0),
        alternative_error: alt.map(|a| a.1),
    })
}

fn validate_points(
    object: &[Point2<f64>],
    image: &[Point2<f64>],
    params: &PoseParams,
) -> Result<(), PoseError> {
    if object.len() != image.len() {
        return Err(PoseError::MismatchedPoints {
            object: object.len(),
            image: image.len(),
        });
    }
    if object.len() < 4 {
        return Err(PoseError::TooFewPoints(object.len()));
    }
    if object
        .iter()
        .chain(image)
        .any(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(PoseError::NonFiniteCorners);
    }

    for (i, a) in image.iter().enumerate() {
        for (j, b) in image.iter().enumerate().skip(i + 1) {
            if (a - b).norm() < params.min_corner_spacing_px {
                return Err(PoseError::CoincidentCorners {
                    first: i,
                    second: j,
                });
            }
        }
    }

    // No three of the points may be (nearly) collinear for a 4-point target;
    // larger sets only need a 2D spread.
    if image.len() == 4 {
        for skip in 0..4 {
            let tri: Vec<&Point2<f64>> = (0..4).filter(|&k| k != skip).map(|k| &image[k]).collect();
            let (e0, e1) = (tri[1] - tri[0], tri[2] - tri[0]);
            let cross = e0.x * e1.y - e0.y * e1.x;
            if cross.abs() < params.min_corner_sin * e0.norm() * e1.norm() {
                return Err(PoseError::CollinearCorners);
            }
        }
    } else if spread_ratio(image) < params.min_corner_sin {
        return Err(PoseError::CollinearCorners);
    }
    Ok(())
}

/// `sqrt(lambda_min / lambda_max)` of the point scatter matrix.
fn spread_ratio(points: &[Point2<f64>]) -> f64 {
    let n = points.len() as f64;
    let mean = points.iter().fold(Vector3::zeros(), |acc, p| acc + Vector3::new(p.x, p.y, 0.0)) / n;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in points {
        let (dx, dy) = (p.x - mean.x, p.y - mean.y);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    let tr = sxx + syy;
    let disc = ((sxx - syy).powi(2) + 4.0 * sxy * sxy).sqrt();
    let (l_max, l_min) = (0.5 * (tr + disc), 0.5 * (tr - disc));
    if l_max <= 0.0 {
        return 0.0;
    }
    (l_min.max(0.0) / l_max).sqrt()
}

fn reprojection_rms(
    pose: &Pose,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    camera: &CameraModel,
) -> f64 {
    let mut sum = 0.0;
    for (p, obs) in object.iter().zip(image) {
        match camera.project(&pose.transform_point(p)) {
            Some(proj) => sum += (proj - obs).norm_squared(),
            None => return f64::INFINITY,
        }
    }
    (sum / object.len() as f64).sqrt()
}

/// Pixel residuals over `x = [rvec, t]`.
struct PoseRefineProblem<'a> {
    object: &'a [Point3<f64>],
    image: &'a [Point2<f64>],
    camera: &'a CameraModel,
}

const BEHIND_CAMERA_RESIDUAL: f64 = 1e6;

impl PoseRefineProblem<'_> {
    fn pose(x: &DVector<f64>) -> Pose {
        Pose::from_rvec(
            Vector3::new(x[0], x[1], x[2]),
            Vector3::new(x[3], x[4], x[5]),
        )
    }
}

impl NllsProblem for PoseRefineProblem<'_> {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let pose = Self::pose(x);
        let mut r = DVector::zeros(2 * self.object.len());
        for (i, (p, obs)) in self.object.iter().zip(self.image).enumerate() {
            let (dx, dy) = match self.camera.project(&pose.transform_point(p)) {
                Some(proj) => (proj.x - obs.x, proj.y - obs.y),
                None => (BEHIND_CAMERA_RESIDUAL, BEHIND_CAMERA_RESIDUAL),
            };
            r[2 * i] = dx;
            r[2 * i + 1] = dy;
        }
        r
    }

    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        central_difference_jacobian(|x| self.residuals(x), x)
    }
}

fn refine_pose(
    pose: &Pose,
    object: &[Point3<f64>],
    image: &[Point2<f64>],
    camera: &CameraModel,
    params: &PoseParams,
) -> (Pose, f64) {
    let problem = PoseRefineProblem {
        object,
        image,
        camera,
    };
    let rvec = pose.rvec();
    let t = pose.translation;
    let x0 = DVector::from_vec(vec![rvec.x, rvec.y, rvec.z, t.x, t.y, t.z]);
    let (x, _report) = minimize(&problem, x0, &params.lm, None);

    let refined = PoseRefineProblem::pose(&x);
    // Re-orthonormalize; the exponential map keeps it close but not exact.
    let refined = match project_to_so3(refined.rotation.matrix()) {
        Some(r) => Pose::new(r, refined.translation),
        None => return (*pose, f64::INFINITY),
    };
    let err = reprojection_rms(&refined, object, image, camera);
    (refined, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arucalib_core::CameraIntrinsics;

    fn camera() -> CameraModel {
        CameraModel::pinhole(CameraIntrinsics::new(800.0, 800.0, 320.0, 240.0))
    }

    #[test]
    fn object_points_follow_corner_order() {
        let p = marker_object_points(0.1);
        assert_eq!(p[0], Point3::new(-0.05, 0.05, 0.0));
        assert_eq!(p[2], Point3::new(0.05, -0.05, 0.0));
    }

    #[test]
    fn rejects_degenerate_input() {
        let cam = camera();
        let params = PoseParams::default();
        let square = [
            Point2::new(100.0f32, 100.0),
            Point2::new(200.0, 100.0),
            Point2::new(200.0, 200.0),
            Point2::new(100.0, 200.0),
        ];

        assert_eq!(
            estimate_marker_pose(&square, 0.0, &cam, &params),
            Err(PoseError::InvalidMarkerLength(0.0))
        );

        let mut coincident = square;
        coincident[1] = coincident[0];
        assert!(matches!(
            estimate_marker_pose(&coincident, 0.1, &cam, &params),
            Err(PoseError::CoincidentCorners { first: 0, second: 1 })
        ));

        let collinear = [
            Point2::new(100.0f32, 100.0),
            Point2::new(150.0, 100.0),
            Point2::new(200.0, 100.0),
            Point2::new(120.0, 180.0),
        ];
        assert_eq!(
            estimate_marker_pose(&collinear, 0.1, &cam, &params),
            Err(PoseError::CollinearCorners)
        );

        let mut nan = square;
        nan[3].x = f32::NAN;
        assert_eq!(
            estimate_marker_pose(&nan, 0.1, &cam, &params),
            Err(PoseError::NonFiniteCorners)
        );
    }

    #[test]
    fn spread_ratio_detects_a_line() {
        let line: Vec<_> = (0..6).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
        assert!(spread_ratio(&line) < 1e-9);
        let grid: Vec<_> = (0..9)
            .map(|i| Point2::new((i % 3) as f64, (i / 3) as f64))
            .collect();
        assert!((spread_ratio(&grid) - 1.0).abs() < 1e-12);
    }
}
