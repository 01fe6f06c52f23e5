use arucalib::detect;
use arucalib::io::{DetectConfig, DetectReport};
use image::ImageReader;

#[cfg(feature = "tracing")]
use arucalib::core::init_tracing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    arucalib::core::init_with_level(log::LevelFilter::Info)?;

    let mut args = std::env::args().skip(1);
    let Some(image_path) = args.next() else {
        eprintln!("Usage: detect_markers <image_path> [config.json]");
        return Ok(());
    };
    let mut cfg = match args.next() {
        Some(path) => DetectConfig::load_json(path)?,
        None => DetectConfig::default(),
    };
    cfg.image_path = Some(image_path.clone());

    let img = ImageReader::open(&image_path)?.decode()?.to_luma8();
    let detector = cfg.build_detector()?;
    let outcome = match &cfg.camera {
        Some(camera) => {
            detect::detect_markers_with_pose_in_image(&img, &detector, camera, cfg.marker_length)
        }
        None => detect::detect_markers_in_image(&img, &detector),
    };

    let report = DetectReport::new(&cfg, img.width() as usize, img.height() as usize, outcome);
    for m in &report.markers {
        match m.distance() {
            Some(d) => println!("marker {:3} at {:?}, {:.3} away", m.id, m.center(), d),
            None => println!("marker {:3} at {:?}", m.id, m.center()),
        }
    }
    if let Some(closest) = arucalib::closest_marker(&report.markers) {
        println!("closest marker: {}", closest.id);
    }

    let out = cfg.output_path();
    report.write_json(&out)?;
    println!("report written to {}", out.display());
    Ok(())
}
