//! Error types for the intersection core.

use thiserror::Error;

/// Outcomes of an intersection query that did not produce a curve.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionError {
    /// No coincidence point exists or was found from the given start:
    /// degenerate tangent, exhausted random sampling, or a Newton
    /// solution leaving both domains with no valid wrap.
    #[error("no common point found")]
    NotFound,

    /// The compute-time budget was exceeded.
    #[error("compute budget exceeded")]
    Timeout,
}

/// Result type for intersection operations.
pub type Result<T> = std::result::Result<T, IntersectionError>;
