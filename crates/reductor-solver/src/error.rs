//! Error types for the reduction solvers.

use num_complex::Complex;
use thiserror::Error;

/// Errors that can occur during a reduction run.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid state-space or shift data.
    #[error(transparent)]
    Core(#[from] reductor_core::CoreError),

    /// (A − sE) is singular at a requested shift.
    #[error("matrix (A - sE) is singular at shift {shift}")]
    SingularShiftedMatrix { shift: Complex<f64> },

    /// Sparse matrix assembly or symbolic factorization failed.
    #[error("factorization failed: {0}")]
    Factorization(String),

    /// Mismatched dimensions between related inputs.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    Dimension {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A tangential direction at a real shift has a nonzero imaginary part.
    #[error("tangential direction for real shift {shift} must be real")]
    ComplexDirection { shift: Complex<f64> },

    /// A Krylov direction became (numerically) linearly dependent on the
    /// basis built so far.
    #[error("Krylov direction for column {column} is linearly dependent on the basis")]
    DependentDirection { column: usize },

    /// The H2 norm is requested for a system where it is not defined.
    #[error("H2 norm is only defined for stable systems without feedthrough")]
    H2Undefined,

    /// A dense Lyapunov solve failed.
    #[error("Lyapunov solve failed: {0}")]
    Lyapunov(&'static str),

    /// An eigenvalue or eigenvector computation failed.
    #[error("eigenvalue computation failed: {0}")]
    Eigen(&'static str),
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, Error>;
