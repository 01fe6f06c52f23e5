use crate::planar_pose::pose_from_homography;
use crate::problem::{CalibrationProblem, ParamLayout};
use crate::zhang::intrinsics_from_homographies;
use crate::{
    CalibrationError, CalibrationParams, CalibrationResult, CalibrationSample,
    UnderdeterminedReason,
};
use arucalib_core::{
    estimate_homography, minimize, scaled_condition_number, CameraModel, LmTermination,
    NllsProblem,
};
use nalgebra::Point2;
use std::sync::atomic::AtomicBool;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Calibrate a camera from planar samples.
///
/// Runs Zhang's closed form on per-sample homographies, then refines
/// intrinsics, distortion and every pose jointly. `cancel` is polled before
/// every residual evaluation of the solver. The result is only returned when the problem is well
/// conditioned and the camera is physical.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(samples, params, cancel), fields(samples = samples.len()))
)]
pub fn calibrate(
    samples: &[CalibrationSample],
    params: &CalibrationParams,
    cancel: Option<&AtomicBool>,
) -> Result<CalibrationResult, CalibrationError> {
    let image_size = validate_samples(samples, params)?;

    let mut homographies = Vec::with_capacity(samples.len());
    for (index, s) in samples.iter().enumerate() {
        let src: Vec<Point2<f64>> = s.object_points.iter().map(|p| p.xy()).collect();
        let h = estimate_homography(&src, &s.image_points).ok_or_else(|| {
            CalibrationError::InvalidSample {
                index,
                reason: "degenerate point configuration (no homography)".to_string(),
            }
        })?;
        homographies.push(h.h);
    }

    let init = intrinsics_from_homographies(
        &homographies,
        image_size,
        params.fix_skew,
        params.min_singular_ratio,
    )?;
    log::debug!(
        "closed-form intrinsics: fx {:.2} fy {:.2} cx {:.2} cy {:.2} (singular ratio {:.2e})",
        init.intrinsics.fx,
        init.intrinsics.fy,
        init.intrinsics.cx,
        init.intrinsics.cy,
        init.singular_ratio
    );

    let k_inv = init
        .intrinsics
        .k_matrix()
        .try_inverse()
        .ok_or(UnderdeterminedReason::NonPhysical)?;
    let poses = homographies
        .iter()
        .map(|h| pose_from_homography(&k_inv, h))
        .collect::<Option<Vec<_>>>()
        .ok_or(UnderdeterminedReason::NonPhysical)?;

    let layout = ParamLayout {
        fix_skew: params.fix_skew,
        estimate_k3: params.estimate_k3,
    };
    let problem = CalibrationProblem::new(samples, layout);
    let x0 = layout.pack(&CameraModel::pinhole(init.intrinsics), &poses);
    let (x, report) = minimize(&problem, x0, &params.lm, cancel);
    if report.termination == LmTermination::Cancelled {
        log::info!("calibration cancelled after {} iterations", report.iterations);
        return Err(CalibrationError::Cancelled);
    }

    let jac = problem.jacobian(&x);
    let condition = scaled_condition_number(&jac.tr_mul(&jac));
    if !condition.is_finite() || condition > params.max_condition_number {
        return Err(UnderdeterminedReason::IllConditioned { condition }.into());
    }

    let camera = layout.camera(&x);
    if !camera.intrinsics.is_physical()
        || !camera.distortion.to_array().iter().all(|v| v.is_finite())
    {
        return Err(UnderdeterminedReason::NonPhysical.into());
    }

    let poses: Vec<_> = (0..samples.len()).map(|v| layout.pose(&x, v)).collect();
    let total_points: usize = samples.iter().map(CalibrationSample::len).sum();
    let rms_error = (2.0 * report.final_cost / total_points as f64).sqrt();
    let per_sample_rms = problem.per_sample_rms(&x);

    log::info!(
        "calibrated {} samples: rms {:.4} px after {} iterations ({:?}), condition {:.2e}",
        samples.len(),
        rms_error,
        report.iterations,
        report.termination,
        condition
    );

    if let Some(limit) = params.max_rms_px {
        if !(rms_error <= limit) {
            return Err(CalibrationError::Unreliable {
                rms: rms_error,
                limit,
            });
        }
    }

    Ok(CalibrationResult {
        camera,
        poses,
        rms_error,
        per_sample_rms,
        iterations: report.iterations,
        termination: report.termination,
        condition_number: condition,
    })
}

/// Check counts, planarity and image sizes; returns the common image size.
fn validate_samples(
    samples: &[CalibrationSample],
    params: &CalibrationParams,
) -> Result<(u32, u32), CalibrationError> {
    let required = params.min_samples.max(2);
    if samples.len() < required {
        return Err(UnderdeterminedReason::InsufficientSamples {
            got: samples.len(),
            required,
        }
        .into());
    }

    let min_points = params.min_points_per_sample.max(4);
    let image_size = samples[0].image_size;
    for (index, s) in samples.iter().enumerate() {
        let invalid = |reason: String| CalibrationError::InvalidSample { index, reason };
        if s.object_points.len() != s.image_points.len() {
            return Err(invalid(format!(
                "{} object points but {} image points",
                s.object_points.len(),
                s.image_points.len()
            )));
        }
        if s.len() < min_points {
            return Err(invalid(format!(
                "{} points, need at least {min_points}",
                s.len()
            )));
        }
        if s.image_size != image_size {
            return Err(invalid(format!(
                "image size {:?} differs from {:?}",
                s.image_size, image_size
            )));
        }
        if s.image_size.0 == 0 || s.image_size.1 == 0 {
            return Err(invalid("zero image size".to_string()));
        }

        let scale = s
            .object_points
            .iter()
            .map(|p| p.coords.amax())
            .fold(0.0f64, f64::max)
            .max(1.0);
        if s
            .object_points
            .iter()
            .any(|p| !p.coords.iter().all(|v| v.is_finite()) || p.z.abs() > 1e-9 * scale)
        {
            return Err(invalid("object points must be finite and lie on z = 0".to_string()));
        }
        if s
            .image_points
            .iter()
            .any(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(invalid("non-finite image point".to_string()));
        }
    }
    Ok(image_size)
}
