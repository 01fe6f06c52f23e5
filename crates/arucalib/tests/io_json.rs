#![cfg(feature = "image")]

mod common;

use arucalib::aruco::builtins::ARUCALIB_4X4_50;
use arucalib::detect::detect_markers_in_image;
use arucalib::io::{CalibrationReport, DetectConfig, DetectReport};
use arucalib::{calibrate, CalibrationSample, CameraIntrinsics, CameraModel, Pose};
use arucalib::calib::CalibrationParams;
use common::{render_scene, Placement};
use nalgebra::{Point2, Rotation3, Vector3};

#[test]
fn detect_config_round_trips_and_builds_a_detector() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("detect.json");

    let mut cfg = DetectConfig {
        dictionary: ARUCALIB_4X4_50.to_string(),
        camera: Some(CameraModel::pinhole(CameraIntrinsics::new(
            500.0, 500.0, 80.0, 60.0,
        ))),
        marker_length: 0.03,
        ..DetectConfig::default()
    };
    cfg.detector.max_hamming = Some(0);
    cfg.write_json(&path).expect("write");

    let loaded = DetectConfig::load_json(&path).expect("load");
    assert_eq!(loaded, cfg);
    assert_eq!(loaded.output_path().to_str(), Some("marker_detect_report.json"));

    let detector = loaded.build_detector().expect("detector");
    assert_eq!(detector.dictionary().name(), ARUCALIB_4X4_50);
    assert_eq!(detector.max_hamming(), 0);
}

#[test]
fn detect_report_keeps_markers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.json");

    let cfg = DetectConfig {
        dictionary: ARUCALIB_4X4_50.to_string(),
        image_path: Some("scene.png".to_string()),
        ..DetectConfig::default()
    };
    let detector = cfg.build_detector().expect("detector");
    let code = detector.dictionary().code(5).expect("id 5");
    let img = render_scene(160, 120, &[Placement::axis_aligned(code, 4, 40.0, 20.0, 72.0)]);

    let outcome = detect_markers_in_image(&img, &detector);
    let report = DetectReport::new(&cfg, 160, 120, outcome);
    assert_eq!(report.markers.len(), 1);
    assert!(report.error.is_none());
    report.write_json(&path).expect("write");

    let loaded = DetectReport::load_json(&path).expect("load");
    assert_eq!(loaded.markers[0].id, 5);
    assert_eq!(loaded.image_path.as_deref(), Some("scene.png"));
    assert_eq!(loaded, report);
}

#[test]
fn calibration_report_round_trips() {
    let camera = CameraModel::pinhole(CameraIntrinsics::new(700.0, 700.0, 320.0, 240.0));
    let target: Vec<Point2<f64>> = (0..30)
        .map(|i| Point2::new(0.03 * (i % 6) as f64, 0.03 * (i / 6) as f64))
        .collect();
    let centre = Vector3::new(0.075, 0.06, 0.0);
    let samples: Vec<CalibrationSample> = [(0.3, 0.0), (0.0, 0.35), (-0.25, 0.2)]
        .iter()
        .map(|&(roll, pitch)| {
            let rotation = Rotation3::from_euler_angles(roll, pitch, 0.05);
            let pose = Pose::new(rotation, Vector3::new(0.0, 0.0, 0.6) - rotation * centre);
            let image = target
                .iter()
                .map(|p| {
                    camera
                        .project(&pose.transform_point(&nalgebra::Point3::new(p.x, p.y, 0.0)))
                        .expect("visible")
                })
                .collect();
            CalibrationSample::from_planar(&target, image, (640, 480))
        })
        .collect();

    let outcome = calibrate(&samples, &CalibrationParams::default(), None);
    let report = CalibrationReport::new(&samples, &outcome);
    assert_eq!((report.num_samples, report.num_points), (3, 90));
    let result = report.result.as_ref().expect("calibrated");
    assert!(result.rms_error < 0.01);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("calibration.json");
    report.write_json(&path).expect("write");
    let loaded = CalibrationReport::load_json(&path).expect("load");
    assert_eq!(loaded.num_points, 90);
    let k = loaded.result.expect("result").camera.intrinsics;
    assert!((k.fx - 700.0).abs() < 1.0);
}
