//! Error types for the core data model.

use num_complex::Complex;
use thiserror::Error;

/// Errors raised while constructing or validating state-space data.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Matrix dimensions are mutually inconsistent.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A shift vector is empty or otherwise malformed.
    #[error("malformed shift vector: {0}")]
    MalformedShifts(&'static str),

    /// A complex shift has no conjugate partner in the vector.
    #[error("shift {shift} has no complex-conjugate partner")]
    UnpairedShift { shift: Complex<f64> },

    /// The descriptor matrix E is singular where invertibility is required.
    #[error("E is singular; cannot {0}")]
    SingularE(&'static str),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
