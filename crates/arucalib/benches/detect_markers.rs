use arucalib::aruco::builtins::{builtin_dictionary, ARUCALIB_5X5_50};
use arucalib::detect::{detect_markers_in_image, detect_markers_with_pose_in_image};
use arucalib::{CameraIntrinsics, CameraModel, MarkerDetector, MarkerDetectorParams};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

#[path = "../tests/common/mod.rs"]
mod common;

use common::{render_scene, Placement};

/// 640x480 scene with a 3x2 grid of 5x5 markers, 90 px each.
fn fixture() -> (image::GrayImage, MarkerDetector) {
    let dict = builtin_dictionary(ARUCALIB_5X5_50).expect("builtin");
    let placements: Vec<Placement> = (0..6)
        .map(|i| {
            let x0 = 60.0 + 200.0 * (i % 3) as f32;
            let y0 = 80.0 + 200.0 * (i / 3) as f32;
            Placement::axis_aligned(dict.codes()[i * 7], 5, x0, y0, 90.0)
        })
        .collect();
    let img = render_scene(640, 480, &placements);
    let detector = MarkerDetector::new(dict, MarkerDetectorParams::default()).expect("detector");
    (img, detector)
}

fn bench_detect(c: &mut Criterion) {
    let (img, detector) = fixture();
    c.bench_function("detect_640x480_6_markers", |b| {
        b.iter(|| {
            let markers = detect_markers_in_image(black_box(&img), &detector).expect("detect");
            black_box(markers.len())
        })
    });

    let mut params = MarkerDetectorParams::default();
    params.refine_corners = false;
    let unrefined = MarkerDetector::new(detector.dictionary().clone(), params).expect("detector");
    c.bench_function("detect_640x480_6_markers_no_refine", |b| {
        b.iter(|| {
            let markers = detect_markers_in_image(black_box(&img), &unrefined).expect("detect");
            black_box(markers.len())
        })
    });
}

fn bench_detect_with_pose(c: &mut Criterion) {
    let (img, detector) = fixture();
    let camera = CameraModel::pinhole(CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0));
    c.bench_function("detect_with_pose_640x480_6_markers", |b| {
        b.iter(|| {
            let markers = detect_markers_with_pose_in_image(black_box(&img), &detector, &camera, 0.05)
                .expect("detect");
            black_box(markers.len())
        })
    });
}

criterion_group!(detection, bench_detect, bench_detect_with_pose);
criterion_main!(detection);
