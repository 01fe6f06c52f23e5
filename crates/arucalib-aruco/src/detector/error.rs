use arucalib_core::FrameError;

/// Errors returned by the marker detector.
///
/// Only systemic input problems surface here; candidates that fail to
/// decode are dropped from the result instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("invalid detector parameters: {reason}")]
    InvalidParams { reason: String },
}
