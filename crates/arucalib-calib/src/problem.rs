//! Joint reprojection problem over intrinsics, distortion and view poses.

use crate::CalibrationSample;
use arucalib_core::{CameraIntrinsics, CameraModel, Distortion, NllsProblem, Pose};
use nalgebra::{DMatrix, DVector, Vector3};

/// Residual used for points that project behind the camera.
const BEHIND_CAMERA_RESIDUAL: f64 = 1e6;

/// Which camera parameters are free.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ParamLayout {
    pub fix_skew: bool,
    pub estimate_k3: bool,
}

impl ParamLayout {
    /// `fx, fy, cx, cy, [skew], k1, k2, p1, p2, [k3]`
    pub fn camera_len(&self) -> usize {
        8 + usize::from(!self.fix_skew) + usize::from(self.estimate_k3)
    }

    pub fn pack(&self, camera: &CameraModel, poses: &[Pose]) -> DVector<f64> {
        let k = &camera.intrinsics;
        let d = &camera.distortion;
        let mut x = Vec::with_capacity(self.camera_len() + 6 * poses.len());
        x.extend_from_slice(&[k.fx, k.fy, k.cx, k.cy]);
        if !self.fix_skew {
            x.push(k.skew);
        }
        x.extend_from_slice(&[d.k1, d.k2, d.p1, d.p2]);
        if self.estimate_k3 {
            x.push(d.k3);
        }
        for pose in poses {
            let r = pose.rvec();
            let t = pose.translation;
            x.extend_from_slice(&[r.x, r.y, r.z, t.x, t.y, t.z]);
        }
        DVector::from_vec(x)
    }

    pub fn camera(&self, x: &DVector<f64>) -> CameraModel {
        let mut i = 4;
        let skew = if self.fix_skew {
            0.0
        } else {
            i += 1;
            x[4]
        };
        let intrinsics = CameraIntrinsics {
            fx: x[0],
            fy: x[1],
            cx: x[2],
            cy: x[3],
            skew,
        };
        let distortion = Distortion {
            k1: x[i],
            k2: x[i + 1],
            p1: x[i + 2],
            p2: x[i + 3],
            k3: if self.estimate_k3 { x[i + 4] } else { 0.0 },
        };
        CameraModel::new(intrinsics, distortion)
    }

    pub fn pose(&self, x: &DVector<f64>, view: usize) -> Pose {
        let o = self.camera_len() + 6 * view;
        Pose::from_rvec(
            Vector3::new(x[o], x[o + 1], x[o + 2]),
            Vector3::new(x[o + 3], x[o + 4], x[o + 5]),
        )
    }
}

/// Reprojection residuals (pixels) of every sample, in sample order.
pub(crate) struct CalibrationProblem<'a> {
    samples: &'a [CalibrationSample],
    layout: ParamLayout,
    /// First residual row of each sample.
    row_offsets: Vec<usize>,
    rows: usize,
}

impl<'a> CalibrationProblem<'a> {
    pub fn new(samples: &'a [CalibrationSample], layout: ParamLayout) -> Self {
        let mut row_offsets = Vec::with_capacity(samples.len());
        let mut rows = 0;
        for s in samples {
            row_offsets.push(rows);
            rows += 2 * s.len();
        }
        Self {
            samples,
            layout,
            row_offsets,
            rows,
        }
    }

    fn view_residuals(
        camera: &CameraModel,
        pose: &Pose,
        sample: &CalibrationSample,
        out: &mut [f64],
    ) {
        for (i, (p, obs)) in sample
            .object_points
            .iter()
            .zip(&sample.image_points)
            .enumerate()
        {
            let (dx, dy) = match camera.project(&pose.transform_point(p)) {
                Some(proj) => (proj.x - obs.x, proj.y - obs.y),
                None => (BEHIND_CAMERA_RESIDUAL, BEHIND_CAMERA_RESIDUAL),
            };
            out[2 * i] = dx;
            out[2 * i + 1] = dy;
        }
    }

    /// RMS reprojection error of each sample.
    pub fn per_sample_rms(&self, x: &DVector<f64>) -> Vec<f64> {
        let r = self.residuals(x);
        self.samples
            .iter()
            .zip(&self.row_offsets)
            .map(|(s, &o)| {
                let n = s.len().max(1) as f64;
                (r.rows(o, 2 * s.len()).norm_squared() / n).sqrt()
            })
            .collect()
    }
}

#[inline]
fn step_for(v: f64) -> f64 {
    1e-6 * v.abs().max(1.0)
}

impl NllsProblem for CalibrationProblem<'_> {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let camera = self.layout.camera(x);
        let mut r = DVector::zeros(self.rows);
        for (v, (sample, &o)) in self.samples.iter().zip(&self.row_offsets).enumerate() {
            let pose = self.layout.pose(x, v);
            Self::view_residuals(&camera, &pose, sample, &mut r.as_mut_slice()[o..o + 2 * sample.len()]);
        }
        r
    }

    /// Central differences; view parameters only touch their own rows.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let n_cam = self.layout.camera_len();
        let mut jac = DMatrix::zeros(self.rows, x.len());
        let mut xp = x.clone();

        for k in 0..n_cam {
            let h = step_for(x[k]);
            xp[k] = x[k] + h;
            let rp = self.residuals(&xp);
            xp[k] = x[k] - h;
            let rm = self.residuals(&xp);
            xp[k] = x[k];
            jac.set_column(k, &((rp - rm) / (2.0 * h)));
        }

        let camera = self.layout.camera(x);
        for (v, (sample, &o)) in self.samples.iter().zip(&self.row_offsets).enumerate() {
            let len = 2 * sample.len();
            let mut rp = vec![0.0; len];
            let mut rm = vec![0.0; len];
            for j in 0..6 {
                let k = n_cam + 6 * v + j;
                let h = step_for(x[k]);
                xp[k] = x[k] + h;
                Self::view_residuals(&camera, &self.layout.pose(&xp, v), sample, &mut rp);
                xp[k] = x[k] - h;
                Self::view_residuals(&camera, &self.layout.pose(&xp, v), sample, &mut rm);
                xp[k] = x[k];
                for i in 0..len {
                    jac[(o + i, k)] = (rp[i] - rm[i]) / (2.0 * h);
                }
            }
        }
        jac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arucalib_core::central_difference_jacobian;
    use nalgebra::Point3;

    fn samples() -> Vec<CalibrationSample> {
        let camera = CameraModel::new(
            CameraIntrinsics::new(700.0, 690.0, 320.0, 240.0),
            Distortion {
                k1: -0.1,
                ..Distortion::default()
            },
        );
        let object: Vec<Point3<f64>> = (0..12)
            .map(|i| Point3::new(0.02 * (i % 4) as f64, 0.02 * (i / 4) as f64, 0.0))
            .collect();
        [
            Pose::from_rvec(Vector3::new(0.1, 0.2, 0.0), Vector3::new(-0.03, -0.02, 0.4)),
            Pose::from_rvec(Vector3::new(-0.2, 0.1, 0.1), Vector3::new(-0.02, -0.03, 0.5)),
        ]
        .iter()
        .map(|pose| {
            let image = object
                .iter()
                .map(|p| camera.project(&pose.transform_point(p)).expect("visible"))
                .collect();
            CalibrationSample::new(object.clone(), image, (640, 480))
        })
        .collect()
    }

    #[test]
    fn pack_and_unpack_agree() {
        let layout = ParamLayout {
            fix_skew: false,
            estimate_k3: true,
        };
        let mut camera = CameraModel::pinhole(CameraIntrinsics::new(1.0, 2.0, 3.0, 4.0));
        camera.intrinsics.skew = 0.5;
        camera.distortion = Distortion {
            k1: 0.1,
            k2: 0.2,
            p1: 0.3,
            p2: 0.4,
            k3: 0.5,
        };
        let pose = Pose::from_rvec(Vector3::new(0.1, 0.2, 0.3), Vector3::new(1.0, 2.0, 3.0));
        let x = layout.pack(&camera, &[pose]);
        assert_eq!(x.len(), 10 + 6);
        assert_eq!(layout.camera(&x), camera);
        assert!((layout.pose(&x, 0).translation - pose.translation).norm() < 1e-15);
    }

    #[test]
    fn block_jacobian_matches_dense_differences() {
        let samples = samples();
        let layout = ParamLayout {
            fix_skew: true,
            estimate_k3: false,
        };
        let problem = CalibrationProblem::new(&samples, layout);
        let camera = CameraModel::pinhole(CameraIntrinsics::new(710.0, 680.0, 322.0, 238.0));
        let poses = [
            Pose::from_rvec(Vector3::new(0.12, 0.18, 0.01), Vector3::new(-0.03, -0.02, 0.42)),
            Pose::from_rvec(Vector3::new(-0.19, 0.1, 0.1), Vector3::new(-0.02, -0.03, 0.48)),
        ];
        let x = layout.pack(&camera, &poses);

        let block = problem.jacobian(&x);
        let dense = central_difference_jacobian(|x| problem.residuals(x), &x);
        assert!((block - dense).amax() < 1e-6);
    }

    #[test]
    fn exact_parameters_have_zero_residuals() {
        let samples = samples();
        let layout = ParamLayout {
            fix_skew: true,
            estimate_k3: false,
        };
        let camera = CameraModel::new(
            CameraIntrinsics::new(700.0, 690.0, 320.0, 240.0),
            Distortion {
                k1: -0.1,
                ..Distortion::default()
            },
        );
        let poses = [
            Pose::from_rvec(Vector3::new(0.1, 0.2, 0.0), Vector3::new(-0.03, -0.02, 0.4)),
            Pose::from_rvec(Vector3::new(-0.2, 0.1, 0.1), Vector3::new(-0.02, -0.03, 0.5)),
        ];
        let problem = CalibrationProblem::new(&samples, layout);
        let rms = problem.per_sample_rms(&layout.pack(&camera, &poses));
        assert!(rms.iter().all(|&e| e < 1e-9), "{rms:?}");
    }
}
