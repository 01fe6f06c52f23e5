use serde::{Deserialize, Serialize};

/// The condition that made a calibration underdetermined.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnderdeterminedReason {
    #[error("insufficient samples: got {got}, need at least {required}")]
    InsufficientSamples { got: usize, required: usize },
    #[error("insufficient pose diversity (singular value ratio {singular_ratio:.3e})")]
    DegeneratePoses { singular_ratio: f64 },
    #[error("no physically valid camera fits the samples")]
    NonPhysical,
    #[error("ill-conditioned system (condition number {condition:.3e})")]
    IllConditioned { condition: f64 },
}

/// Calibration failures. No parameters are returned alongside any of these.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("calibration underdetermined: {0}")]
    Underdetermined(#[from] UnderdeterminedReason),
    #[error("sample {index}: {reason}")]
    InvalidSample { index: usize, reason: String },
    #[error("calibration cancelled")]
    Cancelled,
    #[error("reprojection error {rms:.3} px exceeds the limit of {limit:.3} px")]
    Unreliable { rms: f64, limit: f64 },
}
