//! Square fiducial marker detection.
//!
//! This crate focuses on:
//! - embedded built-in dictionaries and a dictionary type with a precomputed
//!   exact-match table,
//! - the detection pipeline: adaptive binarization, outer-contour tracing,
//!   quad filtering, bit-grid decoding with rotation search and bounded error
//!   correction, sub-pixel corner refinement,
//! - optional per-marker pose through `arucalib-pose`.
//!
//! ```no_run
//! use arucalib_aruco::{builtins, MarkerDetector, MarkerDetectorParams};
//! use arucalib_core::{Frame, PixelFormat};
//!
//! let dict = builtins::builtin_dictionary(builtins::ARUCALIB_5X5_50).expect("builtin");
//! let detector = MarkerDetector::new(dict, MarkerDetectorParams::default())?;
//! let pixels = vec![255u8; 640 * 480];
//! let frame = Frame::new(&pixels, 640, 480, PixelFormat::Gray8);
//! for m in detector.detect(&frame)? {
//!     println!("id {} at {:?}", m.id, m.center());
//! }
//! # Ok::<(), arucalib_aruco::DetectError>(())
//! ```

pub mod builtins;
mod contours;
mod decode;
mod detector;
mod dictionary;
mod matcher;
mod quad;
mod refine;
mod threshold;

pub use contours::{find_contours, Contour, ContourParams};
pub use decode::{DecodeParams, DecodedMarker, MarkerDecoder};
pub use detector::{DetectError, DetectedMarker, MarkerDetector, MarkerDetectorParams};
pub use dictionary::{Dictionary, DictionaryError};
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use quad::{find_quads, QuadCandidate, QuadParams};
pub use refine::{refine_corner, refine_corners, RefineParams};
pub use threshold::{binarize, BinaryImage, ThresholdMode, ThresholdParams};
