//! Error types for ganodetect.

use thiserror::Error;

/// Result type for detection operations.
pub type Result<T> = std::result::Result<T, DetectError>;

/// Errors surfaced by the detection core.
///
/// A block with zero variance is not an error: its scores are defined as
/// neutral (0) and normalization continues. Empty classifications from an
/// empty-but-valid run are likewise a valid output, not a failure.
#[derive(Error, Debug)]
pub enum DetectError {
    /// A step that requires statistics was given zero readings. Never
    /// retried; the caller decides whether to skip or abort.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Invalid configuration (scan range, step, neighbor rule). Checked
    /// before any computation; no partial results exist.
    #[error("configuration error: {0}")]
    Configuration(String),
}
