use super::{DetectError, DetectedMarker, MarkerDetectorParams};
use crate::{
    binarize, find_contours, find_quads, refine_corners, Dictionary, MarkerDecoder, Matcher,
};
use arucalib_core::{CameraModel, Frame, FrameError, GrayImageView};
use arucalib_pose::estimate_marker_pose;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Square-marker detector for one dictionary.
///
/// The detector holds no per-frame state, so a single instance can serve
/// several threads at once.
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    params: MarkerDetectorParams,
    decoder: MarkerDecoder,
}

impl MarkerDetector {
    /// Create a detector; fails only for unusable parameters.
    pub fn new(
        dictionary: Arc<Dictionary>,
        params: MarkerDetectorParams,
    ) -> Result<Self, DetectError> {
        params.validate()?;
        let max_hamming = params
            .max_hamming
            .unwrap_or(dictionary.max_correction_bits());
        let matcher = Matcher::new(dictionary, max_hamming);
        let decoder = MarkerDecoder::new(matcher, params.decode.clone());
        Ok(Self { params, decoder })
    }

    #[inline]
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        self.decoder.matcher().dictionary()
    }

    #[inline]
    pub fn params(&self) -> &MarkerDetectorParams {
        &self.params
    }

    /// Effective Hamming bound after clamping to the dictionary.
    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.decoder.matcher().max_hamming()
    }

    /// Detect markers in a frame of any supported pixel format.
    ///
    /// Markers are sorted by id, then by the position of corner 0.
    pub fn detect(&self, frame: &Frame<'_>) -> Result<Vec<DetectedMarker>, DetectError> {
        let gray = frame.to_gray()?;
        self.detect_gray(&gray.view())
    }

    /// Detect markers and estimate the pose of each.
    ///
    /// A marker whose pose is undetermined is still returned, with `pose: None`.
    pub fn detect_with_pose(
        &self,
        frame: &Frame<'_>,
        camera: &CameraModel,
        marker_length: f64,
    ) -> Result<Vec<DetectedMarker>, DetectError> {
        let mut markers = self.detect(frame)?;
        self.estimate_poses(&mut markers, camera, marker_length);
        Ok(markers)
    }

    /// Fill in `pose` for already detected markers.
    pub fn estimate_poses(
        &self,
        markers: &mut [DetectedMarker],
        camera: &CameraModel,
        marker_length: f64,
    ) {
        for m in markers.iter_mut() {
            m.pose = match estimate_marker_pose(&m.corners, marker_length, camera, &self.params.pose)
            {
                Ok(pose) => Some(pose),
                Err(err) => {
                    log::debug!("marker {}: pose undetermined ({err})", m.id);
                    None
                }
            };
        }
    }

    /// Detect markers in an 8-bit grayscale image.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn detect_gray(&self, image: &GrayImageView<'_>) -> Result<Vec<DetectedMarker>, DetectError> {
        if image.width == 0 || image.height == 0 {
            return Err(FrameError::EmptyFrame {
                width: image.width,
                height: image.height,
            }
            .into());
        }
        if image.is_degenerate() {
            return Err(FrameError::BufferTooSmall {
                expected: image.width.saturating_mul(image.height),
                got: image.data.len(),
            }
            .into());
        }

        let binary = binarize(image, &self.params.threshold);
        let contours = find_contours(&binary, &self.params.contours);
        let quads = find_quads(&contours, image.width, image.height, &self.params.quads);

        let mut markers: Vec<DetectedMarker> = quads
            .iter()
            .filter_map(|q| self.decoder.decode(image, &q.corners))
            .map(|d| {
                let corners = if self.params.refine_corners {
                    refine_corners(image, &d.corners, &self.params.refine)
                } else {
                    d.corners
                };
                DetectedMarker {
                    id: d.id,
                    corners,
                    hamming: d.hamming,
                    rotation: d.rotation,
                    border_score: d.border_score,
                    inverted: d.inverted,
                    pose: None,
                }
            })
            .collect();

        markers.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then(a.corners[0].y.total_cmp(&b.corners[0].y))
                .then(a.corners[0].x.total_cmp(&b.corners[0].x))
        });

        log::debug!(
            "detect: {} foreground px, {} contours, {} quads, {} markers",
            binary.count_set(),
            contours.len(),
            quads.len(),
            markers.len()
        );
        Ok(markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{builtin_dictionary, ARUCALIB_4X4_50};
    use crate::decode::render_marker;
    use crate::rotate_code_u64;
    use arucalib_core::GrayImage;

    fn detector(params: MarkerDetectorParams) -> MarkerDetector {
        let dict = builtin_dictionary(ARUCALIB_4X4_50).expect("builtin dict");
        MarkerDetector::new(dict, params).expect("detector")
    }

    /// Copy `src` into a larger white canvas at `(ox, oy)`.
    fn paste(canvas: &mut GrayImage, src: &GrayImage, ox: usize, oy: usize) {
        for y in 0..src.height {
            for x in 0..src.width {
                canvas.set(ox + x, oy + y, src.data[y * src.width + x]);
            }
        }
    }

    #[test]
    fn finds_two_markers_sorted_by_id() {
        let det = detector(MarkerDetectorParams::default());
        let dict = det.dictionary().clone();

        let mut canvas = GrayImage::filled(220, 120, 255);
        paste(&mut canvas, &render_marker(dict.codes()[12], 4, 12, 8), 10, 10);
        let turned = rotate_code_u64(dict.codes()[3], 4, 1);
        paste(&mut canvas, &render_marker(turned, 4, 12, 8), 110, 10);

        let markers = det.detect_gray(&canvas.view()).expect("detect");
        let ids: Vec<u32> = markers.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 12]);

        // Marker 12 spans pixels [18, 90) on both axes.
        let m12 = &markers[1];
        assert_eq!(m12.rotation, 0);
        assert!((m12.corners[0] - nalgebra::Point2::new(17.5, 17.5)).norm() < 0.5);
        assert!((m12.corners[2] - nalgebra::Point2::new(89.5, 89.5)).norm() < 0.5);

        // Marker 3 is turned a quarter: logical corner 0 sits top-right.
        let m3 = &markers[0];
        assert_eq!(m3.rotation, 1);
        assert!((m3.corners[0] - nalgebra::Point2::new(189.5, 17.5)).norm() < 0.5);
    }

    #[test]
    fn uniform_images_yield_nothing() {
        let det = detector(MarkerDetectorParams::default());
        for value in [0u8, 255] {
            let img = GrayImage::filled(120, 90, value);
            assert!(det.detect_gray(&img.view()).expect("detect").is_empty());
        }
    }

    #[test]
    fn empty_frames_are_errors() {
        let det = detector(MarkerDetectorParams::default());
        let view = GrayImageView {
            width: 0,
            height: 10,
            data: &[],
        };
        assert_eq!(
            det.detect_gray(&view),
            Err(DetectError::Frame(FrameError::EmptyFrame {
                width: 0,
                height: 10
            }))
        );
    }

    #[test]
    fn overflowing_view_size_is_an_error() {
        let det = detector(MarkerDetectorParams::default());
        let data = [0u8; 16];
        let view = GrayImageView {
            width: usize::MAX / 2,
            height: 4,
            data: &data,
        };
        assert_eq!(
            det.detect_gray(&view),
            Err(DetectError::Frame(FrameError::BufferTooSmall {
                expected: usize::MAX,
                got: 16
            }))
        );
    }

    #[test]
    fn invalid_params_are_rejected() {
        let dict = builtin_dictionary(ARUCALIB_4X4_50).expect("builtin dict");
        let mut params = MarkerDetectorParams::default();
        params.decode.samples_per_cell = 0;
        assert!(matches!(
            MarkerDetector::new(dict, params),
            Err(DetectError::InvalidParams { .. })
        ));
    }

    #[test]
    fn hamming_bound_is_clamped() {
        let det = detector(MarkerDetectorParams {
            max_hamming: Some(9),
            ..MarkerDetectorParams::default()
        });
        assert_eq!(det.max_hamming(), 1);
    }

    #[test]
    fn detector_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MarkerDetector>();

        let det = detector(MarkerDetectorParams::default());
        let code = det.dictionary().codes()[5];
        let img = render_marker(code, 4, 10, 10);
        let ids: Vec<Vec<u32>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    s.spawn(|| {
                        let markers = det.detect_gray(&img.view()).expect("detect");
                        markers.iter().map(|m| m.id).collect::<Vec<u32>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("thread")).collect()
        });
        assert!(ids.iter().all(|v| v == &[5]), "{ids:?}");
    }
}
