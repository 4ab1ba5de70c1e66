//! Rational Krylov (Arnoldi) basis construction.
//!
//! Builds an orthonormal basis V — and, for Hermite two-sided interpolation,
//! the dual basis W — whose columns span moments of the transfer function at
//! the requested shifts. Shifts are processed in canonical conjugate-paired
//! order; a complex pair is solved once and split into real and imaginary
//! columns, so complex arithmetic never reaches the returned real basis.
//! Repeated shifts continue the moment chain at that point instead of
//! restarting from B.
//!
//! Alongside each basis the builder tracks the Sylvester right-hand data
//! (Rsylv, Lsylv) by applying every orthogonalization update to shadow
//! columns, so `sylvester::get_sylvester` can certify the projection without
//! re-running the recurrence.
//!
//! # Module Structure
//!
//! - [`ortho`] - inner products and modified Gram-Schmidt passes
//! - [`growth`] - the incremental column-at-a-time basis engine

pub mod growth;
pub mod ortho;

use nalgebra::DMatrix;
use num_complex::Complex;
use reductor_core::LinearSystem;

pub use growth::KrylovBasis;
pub use ortho::InnerProduct;

use crate::error::Result;

/// Final re-orthogonalization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reorth {
    /// Keep the single modified Gram-Schmidt pass per column.
    None,
    /// Repeat modified Gram-Schmidt over the finished basis. Keeps the
    /// Sylvester bookkeeping consistent; the default.
    Gs,
    /// QR-based re-orthogonalization. Produces the cleanest basis but
    /// replaces the columns, so the Sylvester bookkeeping is dropped.
    Qr,
}

/// What to build: which shifts, which tangential directions, and whether a
/// dual basis W is requested (Hermite interpolation).
#[derive(Debug, Clone)]
pub struct ArnoldiRequest {
    /// Expansion points; canonicalized internally. Conjugate partners may be
    /// listed in any order, the direction column of the member with
    /// nonnegative imaginary part is used for the pair.
    pub shifts: Vec<Complex<f64>>,
    /// Input tangential directions (m×q). None selects block Krylov.
    pub rt: Option<DMatrix<Complex<f64>>>,
    /// Output tangential directions (p×q), Hermite only.
    pub lt: Option<DMatrix<Complex<f64>>>,
    /// Build W alongside V from the same shifts.
    pub hermite: bool,
}

impl ArnoldiRequest {
    /// Input-side basis only (one-sided projection).
    pub fn input_sided(shifts: Vec<Complex<f64>>) -> Self {
        Self {
            shifts,
            rt: None,
            lt: None,
            hermite: false,
        }
    }

    /// V and W from the same shifts (two-sided Hermite interpolation).
    pub fn hermite(shifts: Vec<Complex<f64>>) -> Self {
        Self {
            shifts,
            rt: None,
            lt: None,
            hermite: true,
        }
    }

    pub fn with_input_directions(mut self, rt: DMatrix<Complex<f64>>) -> Self {
        self.rt = Some(rt);
        self
    }

    pub fn with_output_directions(mut self, lt: DMatrix<Complex<f64>>) -> Self {
        self.lt = Some(lt);
        self
    }
}

/// Arnoldi configuration.
#[derive(Debug, Clone)]
pub struct ArnoldiOptions {
    /// Final re-orthogonalization strategy.
    pub reorth: Reorth,
    /// Inner product override. None derives it from the system: E-weighted
    /// when E is symmetric positive definite, Euclidean otherwise.
    pub inner_product: Option<InnerProduct>,
    /// Tolerance for canonical conjugate pairing.
    pub cplxpair_tol: f64,
}

impl Default for ArnoldiOptions {
    fn default() -> Self {
        Self {
            reorth: Reorth::Gs,
            inner_product: None,
            cplxpair_tol: 1e-6,
        }
    }
}

/// Result of a basis construction.
#[derive(Debug, Clone)]
pub struct ArnoldiResult {
    /// Right (input-side) basis, n×q.
    pub v: DMatrix<f64>,
    /// Left (output-side) basis, Hermite only.
    pub w: Option<DMatrix<f64>>,
    /// Sylvester right-hand data (m×q). None after QR re-orthogonalization.
    pub rsylv: Option<DMatrix<f64>>,
    /// Dual Sylvester data (p×q), Hermite only.
    pub lsylv: Option<DMatrix<f64>>,
}

/// Build a rational Krylov basis for `sys` according to the request.
pub fn arnoldi(
    sys: &LinearSystem,
    req: &ArnoldiRequest,
    opts: &ArnoldiOptions,
) -> Result<ArnoldiResult> {
    let mut basis = KrylovBasis::new(sys, req.hermite, opts);
    basis.extend(&req.shifts, req.rt.as_ref(), req.lt.as_ref())?;
    basis.finish(opts.reorth)
}
