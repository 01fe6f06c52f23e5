//! Calibrate a simulated camera from views of a 9x6 grid and write a report.

use arucalib::calib::CalibrationParams;
use arucalib::io::CalibrationReport;
use arucalib::{calibrate, CalibrationSample, CameraIntrinsics, CameraModel, Distortion, Pose};
use nalgebra::{Point2, Point3, Rotation3, Vector3};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    arucalib::core::init_with_stage_levels(
        log::LevelFilter::Info,
        &[(arucalib::core::LogStage::Calib, log::LevelFilter::Debug)],
    )?;

    let camera = CameraModel::new(
        CameraIntrinsics::new(820.0, 815.0, 330.0, 245.0),
        Distortion {
            k1: -0.12,
            k2: 0.03,
            ..Distortion::default()
        },
    );
    let target: Vec<Point2<f64>> = (0..54)
        .map(|i| Point2::new(0.025 * (i % 9) as f64, 0.025 * (i / 9) as f64))
        .collect();
    let centre = Vector3::new(0.1, 0.0625, 0.0);

    let views = [
        (0.0, 0.0, 0.55),
        (0.3, 0.1, 0.5),
        (-0.1, 0.35, 0.6),
        (0.25, -0.3, 0.55),
    ];
    let mut samples = Vec::new();
    for (roll, pitch, z) in views {
        let rotation = Rotation3::from_euler_angles(roll, pitch, 0.05);
        let pose = Pose::new(rotation, Vector3::new(0.0, 0.0, z) - rotation * centre);
        let image = target
            .iter()
            .map(|p| camera.project(&pose.transform_point(&Point3::new(p.x, p.y, 0.0))))
            .collect::<Option<Vec<_>>>()
            .ok_or("target behind the camera")?;
        samples.push(CalibrationSample::from_planar(&target, image, (640, 480)));
    }

    let outcome = calibrate(&samples, &CalibrationParams::default(), None);
    match &outcome {
        Ok(result) => println!(
            "fx {:.2} fy {:.2} cx {:.2} cy {:.2}, rms {:.5} px",
            result.camera.intrinsics.fx,
            result.camera.intrinsics.fy,
            result.camera.intrinsics.cx,
            result.camera.intrinsics.cy,
            result.rms_error
        ),
        Err(err) => println!("calibration failed: {err}"),
    }
    CalibrationReport::new(&samples, &outcome).write_json("calibration_report.json")?;
    Ok(())
}
