#![cfg(feature = "image")]

mod common;

use arucalib::aruco::builtins::{builtin_dictionary, ARUCALIB_5X5_50, ARUCALIB_6X6_50};
use arucalib::aruco::rotate_code_u64;
use arucalib::detect::{
    detect_markers_in_image, detect_markers_with_pose_in_image, frame_from_rgb_image,
};
use arucalib::{closest_marker, CameraIntrinsics, CameraModel, MarkerDetector, MarkerDetectorParams, Pose};
use common::{max_corner_error, render_scene, Placement};
use nalgebra::{Point2, Rotation3, Vector3};
use std::f64::consts::PI;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn detector_5x5() -> MarkerDetector {
    let dict = builtin_dictionary(ARUCALIB_5X5_50).expect("builtin");
    MarkerDetector::new(dict, MarkerDetectorParams::default()).expect("detector")
}

fn camera() -> CameraModel {
    CameraModel::pinhole(CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0))
}

/// Marker facing the camera (its +y up in the image), slightly tilted.
fn facing_pose(tilt: f64, translation: Vector3<f64>) -> Pose {
    Pose::new(Rotation3::from_euler_angles(PI + tilt, 0.2, 0.1), translation)
}

#[test]
fn rotated_marker_is_found_with_logical_corners() {
    init_logging();
    let detector = detector_5x5();
    let code = detector.dictionary().code(7).expect("id 7");
    let placement = Placement::axis_aligned(rotate_code_u64(code, 5, 1), 5, 50.0, 50.0, 100.0);
    let img = render_scene(200, 200, &[placement]);

    let markers = detect_markers_in_image(&img, &detector).expect("detect");
    assert_eq!(markers.len(), 1, "{markers:?}");
    let m = &markers[0];
    assert_eq!((m.id, m.rotation, m.hamming), (7, 1, 0));

    let expected: [Point2<f32>; 4] = std::array::from_fn(|k| placement.corners[(k + 1) % 4]);
    let err = max_corner_error(&m.corners, &expected);
    assert!(err < 1.0, "corner error {err}");
    assert!(m.pose.is_none());
}

#[test]
fn every_rotation_is_found() {
    let detector = detector_5x5();
    let code = detector.dictionary().code(21).expect("id 21");
    for rot in 0..4u8 {
        let placement =
            Placement::axis_aligned(rotate_code_u64(code, 5, rot), 5, 40.0, 60.0, 110.0);
        let img = render_scene(200, 220, &[placement]);

        let markers = detect_markers_in_image(&img, &detector).expect("detect");
        assert_eq!(markers.len(), 1, "rotation {rot}: {markers:?}");
        let m = &markers[0];
        assert_eq!((m.id, m.rotation, m.hamming), (21, rot, 0));

        let expected: [Point2<f32>; 4] =
            std::array::from_fn(|k| placement.corners[(k + rot as usize) % 4]);
        let err = max_corner_error(&m.corners, &expected);
        assert!(err < 1.0, "rotation {rot}: corner error {err}");
    }
}

/// Smallest Hamming distance from `observed` to any rotation of any code.
fn nearest_code_distance(codes: &[u64], bits: usize, observed: u64) -> u32 {
    codes
        .iter()
        .flat_map(|&c| (0..4).map(move |rot| rotate_code_u64(c, bits, rot)))
        .map(|c| (c ^ observed).count_ones())
        .min()
        .unwrap_or(u32::MAX)
}

#[test]
fn flipped_cells_are_corrected_up_to_the_bound() {
    let detector = detector_5x5();
    let dict = detector.dictionary();
    let bound = u32::from(detector.max_hamming());
    assert_eq!(bound, 3);
    let code = dict.code(12).expect("id 12");

    // Interior cells spread over the grid, one per row.
    let cells = [0usize, 6, 12, 18, 24];
    for flips in 0..=bound as usize {
        let mask = cells[..flips].iter().fold(0u64, |m, &b| m | 1 << b);
        let placement = Placement::axis_aligned(code ^ mask, 5, 50.0, 50.0, 100.0);
        let img = render_scene(200, 200, &[placement]);
        let markers = detect_markers_in_image(&img, &detector).expect("detect");
        assert_eq!(
            markers.iter().map(|m| (m.id, m.hamming)).collect::<Vec<_>>(),
            vec![(12, flips as u8)],
            "{flips} flipped cells"
        );
    }
}

#[test]
fn too_many_flipped_cells_are_rejected() {
    let detector = detector_5x5();
    let dict = detector.dictionary();
    let bound = u32::from(detector.max_hamming());
    let code = dict.code(12).expect("id 12");

    let patterns: [[usize; 4]; 4] = [
        [0, 6, 12, 18],
        [1, 8, 15, 22],
        [4, 8, 16, 20],
        [2, 7, 17, 23],
    ];
    let observed = patterns
        .iter()
        .map(|cells| code ^ cells.iter().fold(0u64, |m, &b| m | 1 << b))
        .find(|&obs| nearest_code_distance(dict.codes(), 5, obs) > bound)
        .expect("a four-cell pattern beyond the correction bound of every code");

    let placement = Placement::axis_aligned(observed, 5, 50.0, 50.0, 100.0);
    let img = render_scene(200, 200, &[placement]);
    let markers = detect_markers_in_image(&img, &detector).expect("detect");
    assert!(markers.is_empty(), "{markers:?}");
}

#[test]
fn blank_images_have_no_markers() {
    let detector = detector_5x5();
    for value in [0u8, 255] {
        let img = image::GrayImage::from_pixel(200, 200, image::Luma([value]));
        let markers = detect_markers_in_image(&img, &detector).expect("detect");
        assert!(markers.is_empty(), "value {value}: {markers:?}");
    }
}

#[test]
fn rgb_frames_match_gray_detection() {
    let detector = detector_5x5();
    let code = detector.dictionary().code(3).expect("id 3");
    let gray = render_scene(160, 120, &[Placement::axis_aligned(code, 5, 30.0, 20.0, 77.0)]);
    let rgb = image::RgbImage::from_fn(160, 120, |x, y| {
        let v = gray.get_pixel(x, y)[0];
        image::Rgb([v, v, v])
    });

    let from_rgb = detector.detect(&frame_from_rgb_image(&rgb)).expect("detect rgb");
    let from_gray = detect_markers_in_image(&gray, &detector).expect("detect gray");
    assert_eq!(from_rgb.len(), 1);
    assert_eq!(from_rgb, from_gray);
}

#[test]
fn pose_of_rendered_marker_matches_truth() {
    init_logging();
    let detector = detector_5x5();
    let camera = camera();
    let length = 0.05;
    let truth = facing_pose(0.3, Vector3::new(0.01, -0.005, 0.4));
    let code = detector.dictionary().code(11).expect("id 11");
    let img = render_scene(640, 480, &[Placement::projected(code, 5, &camera, &truth, length)]);

    let markers = detect_markers_with_pose_in_image(&img, &detector, &camera, length).expect("detect");
    assert_eq!(markers.len(), 1);
    let pose = markers[0].pose.expect("pose");
    assert!((pose.pose.translation - truth.translation).norm() < 5e-3, "{pose:?}");
    assert!(pose.pose.rotation.angle_to(&truth.rotation) < 0.02, "{pose:?}");
    assert!(pose.reprojection_error < 1.0);
}

#[test]
fn closest_marker_picks_the_nearest_pose() {
    init_logging();
    let dict = builtin_dictionary(ARUCALIB_6X6_50).expect("builtin");
    let detector = MarkerDetector::new(dict.clone(), MarkerDetectorParams::default()).expect("detector");
    let camera = camera();
    let length = 0.05;
    let near = facing_pose(0.1, Vector3::new(-0.08, 0.0, 0.35));
    let far = facing_pose(-0.1, Vector3::new(0.08, 0.0, 0.5));
    let img = render_scene(
        640,
        480,
        &[
            Placement::projected(dict.codes()[4], 6, &camera, &near, length),
            Placement::projected(dict.codes()[9], 6, &camera, &far, length),
        ],
    );

    let markers = detect_markers_with_pose_in_image(&img, &detector, &camera, length).expect("detect");
    assert_eq!(markers.iter().map(|m| m.id).collect::<Vec<_>>(), vec![4, 9]);

    let closest = closest_marker(&markers).expect("closest");
    assert_eq!(closest.id, 4);
    let d = closest.distance().expect("distance");
    assert!((d - near.distance()).abs() < 5e-3, "distance {d}");
}

#[test]
fn closest_marker_ignores_markers_without_pose() {
    let detector = detector_5x5();
    let code = detector.dictionary().code(2).expect("id 2");
    let img = render_scene(120, 120, &[Placement::axis_aligned(code, 5, 20.0, 20.0, 70.0)]);
    let markers = detect_markers_in_image(&img, &detector).expect("detect");
    assert_eq!(markers.len(), 1);
    assert!(closest_marker(&markers).is_none());
    assert!(closest_marker(&[]).is_none());
}
