//! End-to-end marker detection.
//!
//! This module wires together binarization, contour tracing, quad filtering,
//! bit decoding, corner refinement and (optionally) pose estimation.

mod error;
mod params;
mod pipeline;
mod result;

pub use error::DetectError;
pub use params::MarkerDetectorParams;
pub use pipeline::MarkerDetector;
pub use result::DetectedMarker;
