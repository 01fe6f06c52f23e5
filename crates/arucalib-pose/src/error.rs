/// Reasons a pose could not be determined.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("marker length must be positive and finite, got {0}")]
    InvalidMarkerLength(f64),
    #[error("need at least 4 point correspondences, got {0}")]
    TooFewPoints(usize),
    #[error("object and image point counts differ ({object} vs {image})")]
    MismatchedPoints { object: usize, image: usize },
    #[error("non-finite corner coordinates")]
    NonFiniteCorners,
    #[error("corners {first} and {second} coincide")]
    CoincidentCorners { first: usize, second: usize },
    #[error("corners are collinear")]
    CollinearCorners,
    #[error("plane-to-image homography is degenerate")]
    DegenerateHomography,
    #[error("no solution places the target in front of the camera")]
    BehindCamera,
}
