use thiserror::Error;

/// Errors raised by the geometry routines.
///
/// Every failure is reported at the call that detected it; nothing is retried internally.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// A quaternion with (near) zero norm, or a matrix that is not a proper rotation.
    #[error("degenerate rotation: {0}")]
    DegenerateRotation(String),

    /// Too few point pairs to estimate a rigid transform.
    #[error("need at least {required} point correspondences, got {got}")]
    InsufficientCorrespondences { required: usize, got: usize },

    /// Collinear, coincident or otherwise ill-conditioned point configuration.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Triangulation only supports a reference and a secondary camera.
    #[error("triangulation needs exactly 2 cameras, got {0}")]
    UnsupportedCameraCount(usize),

    /// Two point sequences that should be paired have different lengths.
    #[error("size mismatch: {left} points vs {right} points")]
    SizeMismatch { left: usize, right: usize },

    /// Intrinsic matrix or distortion vector with the wrong shape or values.
    #[error("invalid camera parameters: {0}")]
    InvalidCameraParameters(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GeometryError>;
